// Feeds, the follow graph, reviews and comments under /api/social.
//
// Reads that the frontend shows to anonymous visitors take `MaybeUser`; the
// caller id only decides the per-review like flag.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use cinesorte_common::{CinesorteError, Comment, CommentRevision, MediaType, PublicProfile, ReviewRevision};
use cinesorte_engine::{NewComment, NewReview, ReviewEdit, ReviewView, Suggestion, UserStats};

use crate::auth::{AuthUser, MaybeUser};
use crate::error::{ApiResult, Payload};
use crate::rest::{parse_id, MediaId};
use crate::routes::ack;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowBody {
    target_user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    media_id: MediaId,
    media_type: String,
    rating: f64,
    text: Option<String>,
    media_title: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    is_elite_review: bool,
}

#[derive(Deserialize)]
pub struct ReviewEditBody {
    text: Option<String>,
    rating: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    review_id: String,
    text: String,
    parent_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentEditBody {
    text: String,
}

// --- Feeds ---

pub async fn global_feed(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(state.engine.global_feed(viewer.as_deref()).await?))
}

pub async fn following_feed(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(state.engine.following_feed(&user.uid).await?))
}

// --- Follow graph ---

pub async fn follow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<FollowBody>,
) -> ApiResult<Json<Value>> {
    state.engine.follow(&user.uid, &body.target_user_id).await?;
    Ok(ack("Seguindo."))
}

pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(target): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.unfollow(&user.uid, &target).await?;
    Ok(ack("Deixou de seguir."))
}

pub async fn check_follow(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(target): Path<String>,
) -> ApiResult<Json<Value>> {
    let following = state.engine.is_following(&user.uid, &target).await?;
    Ok(Json(json!({ "isFollowing": following })))
}

pub async fn suggestions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Suggestion>>> {
    Ok(Json(state.engine.suggestions(&user.uid).await?))
}

pub async fn own_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.engine.stats(&user.uid).await?))
}

pub async fn profile_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<UserStats>> {
    Ok(Json(state.engine.stats(&user_id).await?))
}

pub async fn match_percentage(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(other): Path<String>,
) -> ApiResult<Json<Value>> {
    let percentage = state.engine.match_percentage(&user.uid, &other).await?;
    Ok(Json(json!({ "percentage": percentage })))
}

pub async fn followers(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<PublicProfile>>> {
    Ok(Json(state.engine.followers(&user_id).await?))
}

pub async fn following(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<PublicProfile>>> {
    Ok(Json(state.engine.following(&user_id).await?))
}

// --- Reviews ---

pub async fn add_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<ReviewBody>,
) -> ApiResult<Response> {
    let media_type = MediaType::parse(&body.media_type)
        .ok_or_else(|| CinesorteError::validation("Dados inválidos."))?;
    let new = NewReview {
        media_id: body.media_id.into_string(),
        media_type,
        rating: body.rating,
        text: body.text,
        media_title: body.media_title,
        poster_path: body.poster_path,
        backdrop_path: body.backdrop_path,
        is_elite_review: body.is_elite_review,
    };
    state.engine.add_review(&user.uid, new).await?;
    Ok((StatusCode::CREATED, ack("Review salva.")).into_response())
}

/// `id` is the catalog media id here, not a review id.
pub async fn media_reviews(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(media_id): Path<String>,
) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(
        state
            .engine
            .media_reviews(&media_id, viewer.as_deref())
            .await?,
    ))
}

pub async fn edit_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Payload(body): Payload<ReviewEditBody>,
) -> ApiResult<Json<Value>> {
    let edit = ReviewEdit {
        text: body.text,
        rating: body.rating,
    };
    let review = state.engine.edit_review(&user.uid, parse_id(&id)?, edit).await?;
    Ok(Json(json!({ "message": "Review atualizada.", "review": review })))
}

pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.delete_review(&user.uid, parse_id(&id)?).await?;
    Ok(ack("Review deletada."))
}

pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.toggle_review_like(&user.uid, parse_id(&id)?).await?;
    Ok(ack("Sucesso"))
}

pub async fn review_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ReviewRevision>>> {
    Ok(Json(state.engine.review_history(&user.uid, parse_id(&id)?).await?))
}

pub async fn user_reviews(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<ReviewView>>> {
    Ok(Json(
        state
            .engine
            .user_reviews(&username, viewer.as_deref())
            .await?,
    ))
}

// --- Comments ---

pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<CommentBody>,
) -> ApiResult<Response> {
    let parent_id = match body.parent_id.as_deref().filter(|p| !p.is_empty()) {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };
    let new = NewComment {
        review_id: parse_id(&body.review_id)?,
        text: body.text,
        parent_id,
    };
    let comment = state.engine.add_comment(&user.uid, new).await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

/// `id` is the review the comments belong to.
pub async fn comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Comment>>> {
    Ok(Json(state.engine.comments(parse_id(&id)?).await?))
}

pub async fn edit_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    Payload(body): Payload<CommentEditBody>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(
        state
            .engine
            .edit_comment(&user.uid, parse_id(&id)?, body.text)
            .await?,
    ))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.delete_comment(&user.uid, parse_id(&id)?).await?;
    Ok(ack("Deletado."))
}

pub async fn comment_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CommentRevision>>> {
    Ok(Json(
        state
            .engine
            .comment_history(&user.uid, parse_id(&id)?)
            .await?,
    ))
}
