use std::sync::Arc;

use axum::{
    extract::OriginalUri,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer};

use cinesorte_common::CinesorteError;

use crate::auth::renew_session;
use crate::error::{render_faults, ApiError};
use crate::rest::{auth, catalog, interactions, lists, notifications, social};
use crate::AppState;

const BODY_LIMIT_BYTES: usize = 10 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let users = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/reset-password", post(auth::reset_password))
        .route("/me", get(auth::me).put(auth::update_me).delete(auth::delete_me))
        .route("/me/history", get(auth::profile_history))
        .route("/profile/{username}", get(auth::public_profile))
        .route("/search", get(auth::search))
        .route("/terms", post(auth::accept_terms))
        .route("/interact", post(interactions::record))
        .route("/interactions", get(interactions::list))
        .route("/diary", get(interactions::diary))
        .route("/lists", post(lists::save))
        .route("/lists/clone", post(lists::clone))
        .route("/lists/add", post(lists::add_media))
        // GET takes a username (or `me`), DELETE a list id.
        .route("/lists/{key}", get(lists::user_lists).delete(lists::delete))
        .route("/lists/{key}/media/{media_id}", delete(lists::remove_media));

    let social = Router::new()
        .route("/feed/global", get(social::global_feed))
        .route("/feed/following", get(social::following_feed))
        .route("/feed/collections", get(lists::collections_feed))
        .route("/share-list", post(lists::share))
        .route("/lists/{username}/{list_id}", get(lists::public_detail))
        .route("/follow", post(social::follow))
        .route("/unfollow/{user_id}", delete(social::unfollow))
        .route("/check-follow/{user_id}", get(social::check_follow))
        .route("/suggestions", get(social::suggestions))
        .route("/stats", get(social::own_stats))
        .route("/profile-stats/{user_id}", get(social::profile_stats))
        .route("/match/{user_id}", get(social::match_percentage))
        .route("/followers/{user_id}", get(social::followers))
        .route("/following/{user_id}", get(social::following))
        .route("/reviews", post(social::add_review))
        .route(
            "/reviews/{id}",
            get(social::media_reviews)
                .put(social::edit_review)
                .delete(social::delete_review),
        )
        .route("/reviews/{id}/like", post(social::toggle_like))
        .route("/reviews/{id}/history", get(social::review_history))
        .route("/user-reviews/{username}", get(social::user_reviews))
        .route("/comments", post(social::add_comment))
        .route(
            "/comments/{id}",
            get(social::comments)
                .put(social::edit_comment)
                .delete(social::delete_comment),
        )
        .route("/comments/{id}/history", get(social::comment_history));

    let notifications = Router::new()
        .route("/", get(notifications::list))
        .route("/count", get(notifications::count))
        .route("/{id}/read", put(notifications::mark_read));

    let tmdb = Router::new().route("/genres/{media_type}", get(catalog::genres));

    let cors = CorsLayer::new()
        .allow_origin(state.frontend_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    Router::new()
        .route("/", get(|| async { Json(json!({ "message": "Cinesorte Secure API" })) }))
        .route("/api/health", get(|| async { StatusCode::OK }))
        .nest("/api/users", users)
        .nest("/api/social", social)
        .nest("/api/notifications", notifications)
        .nest("/api/tmdb", tmdb)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), render_faults))
        .layer(middleware::from_fn_with_state(state.clone(), renew_session))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(cors)
        // Responses carry per-user data: never cache.
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        // Method and path only: no query string, no client address.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError(CinesorteError::not_found(format!(
        "Rota {} nao encontrada.",
        uri.path()
    )))
}

/// `{ "message": text }`, the acknowledgement body used across the API.
pub fn ack(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}
