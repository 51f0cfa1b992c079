// Account and profile endpoints under /api/users.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use cinesorte_common::{CinesorteError, ProfileAudit, PublicProfile, UserProfile};
use cinesorte_engine::{ProfileUpdate, Registration, UserSummary};

use crate::auth::{AuthUser, ClientIp};
use crate::error::{ApiResult, Payload};
use crate::jwt::{clear_session_cookie, session_cookie};
use crate::rest::user_agent;
use crate::routes::ack;
use crate::AppState;

#[derive(Deserialize)]
pub struct RegisterBody {
    name: String,
    nickname: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct ResetBody {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileBody {
    username: Option<String>,
    bio: Option<String>,
    #[serde(rename = "photoURL")]
    photo_url: Option<String>,
    #[serde(rename = "backgroundURL")]
    background_url: Option<String>,
}

#[derive(Deserialize)]
pub struct TermsBody {
    version: String,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    query: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Payload(body): Payload<RegisterBody>,
) -> ApiResult<Response> {
    if !state.register_limiter.check(ip).await {
        warn!(%ip, "Register limiter tripped");
        if state.app_env.is_production() {
            state
                .engine
                .alerts()
                .send(&format!("REGISTER RATE LIMIT: IP {ip} bloqueado."))
                .await;
        }
        return Err(CinesorteError::RateLimited(
            "Muitas tentativas de registro. Tente novamente mais tarde.".into(),
        )
        .into());
    }

    let user = state
        .engine
        .register(Registration {
            name: body.name,
            nickname: body.nickname,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "username": user.username,
            "message": "Usuário criado. Verifique seu email.",
        })),
    )
        .into_response())
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Payload(body): Payload<LoginBody>,
) -> ApiResult<Response> {
    if !state.login_limiter.check(ip).await {
        warn!(%ip, "Login limiter tripped");
        if state.app_env.is_production() {
            state
                .engine
                .alerts()
                .send(&format!("BRUTE FORCE: IP {ip} bloqueado."))
                .await;
        }
        return Err(CinesorteError::RateLimited("IP bloqueado por 15 minutos.".into()).into());
    }

    let outcome = state.engine.login(&body.email, &body.password).await?;
    let profile = outcome.profile.as_ref();
    let token = state.sessions.issue(
        &outcome.uid,
        profile.map(|p| p.username.as_str()),
        outcome.email_verified,
    )?;

    let body = json!({
        "uid": outcome.uid,
        "username": profile.map(|p| p.username.as_str()),
        "photoURL": profile.and_then(|p| p.photo_url.as_deref()),
        "name": profile.map(|p| p.name.as_str()),
        "termsVersion": profile.and_then(|p| p.terms_version.as_deref()),
    });
    Ok((
        [(header::SET_COOKIE, session_cookie(&token))],
        Json(body),
    )
        .into_response())
}

pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        ack("Logout realizado."),
    )
        .into_response()
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Payload(body): Payload<ResetBody>,
) -> Response {
    if body.email.trim().is_empty() {
        return ack("Iniciado.").into_response();
    }
    state.engine.request_password_reset(&body.email).await;
    ack("Solicitação recebida.").into_response()
}

pub async fn me(user: AuthUser) -> Json<UserProfile> {
    Json(user.profile)
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Payload(body): Payload<ProfileBody>,
) -> ApiResult<Response> {
    let update = ProfileUpdate {
        username: body.username,
        bio: body.bio,
        photo_url: body.photo_url,
        background_url: body.background_url,
    };
    state
        .engine
        .update_profile(&user.uid, update, user_agent(&headers))
        .await?;
    Ok(ack("Perfil atualizado.").into_response())
}

pub async fn delete_me(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Response> {
    state.engine.delete_account(&user.uid).await?;
    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        ack("Excluído com sucesso."),
    )
        .into_response())
}

pub async fn profile_history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<ProfileAudit>>> {
    Ok(Json(state.engine.profile_history(&user.uid).await?))
}

pub async fn public_profile(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(username): Path<String>,
) -> ApiResult<Json<PublicProfile>> {
    Ok(Json(state.engine.public_profile(&username).await?))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    Ok(Json(state.engine.search_users(&params.query).await?))
}

pub async fn accept_terms(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Payload(body): Payload<TermsBody>,
) -> ApiResult<Response> {
    state
        .engine
        .accept_terms(&user.uid, &body.version, user_agent(&headers))
        .await?;
    Ok(ack("Termos aceitos.").into_response())
}
