use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::warn;

use cinesorte_common::{CinesorteError, UserProfile};

use crate::error::ApiError;
use crate::jwt::{
    clear_session_cookie, parse_auth_cookie, session_cookie, SessionClaims, RENEW_WITHIN_SECS,
};
use crate::AppState;

enum Session {
    Missing,
    Invalid,
    Valid(SessionClaims),
}

fn session(parts: &Parts, state: &AppState) -> Session {
    session_from(&parts.headers, state)
}

fn session_from(headers: &axum::http::HeaderMap, state: &AppState) -> Session {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let Some(token) = parse_auth_cookie(cookie_header) else {
        return Session::Missing;
    };
    match state.sessions.verify(token) {
        Ok(claims) => Session::Valid(claims),
        Err(_) => Session::Invalid,
    }
}

/// Caller address from the connection, or unspecified when served without one.
pub fn client_ip(parts: &Parts) -> IpAddr {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub struct ClientIp(pub IpAddr);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts)))
    }
}

/// A signed-in caller with a verified email and an existing profile.
pub struct AuthUser {
    pub uid: String,
    pub profile: UserProfile,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let claims = match session(parts, state) {
            Session::Missing => {
                return Err(reject(CinesorteError::Unauthorized(
                    "Acesso negado. Faça login.".into(),
                )))
            }
            Session::Invalid => {
                let mut response = reject(CinesorteError::Unauthorized("Sessão inválida.".into()));
                if let Ok(value) = clear_session_cookie().parse() {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                }
                return Err(response);
            }
            Session::Valid(claims) => claims,
        };

        if !claims.verified {
            return Err(reject(CinesorteError::forbidden("Verifique seu email.")));
        }

        let profile = state.engine.me(&claims.uid).await.map_err(reject)?;

        let ip = client_ip(parts);
        if let Some(count) = state.activity.record(&profile.username, Instant::now()).await {
            warn!(username = %profile.username, count, "Request burst from one user");
            state
                .engine
                .alerts()
                .send(&format!(
                    "SUSPEITA DE SPAM\n\nUser: @{}\nReq/min: {count}\nIP: {ip}",
                    profile.username
                ))
                .await;
        }

        Ok(AuthUser {
            uid: claims.uid,
            profile,
        })
    }
}

/// Caller uid when a valid session cookie is present. Never rejects.
pub struct MaybeUser(pub Option<String>);

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let uid = match session(parts, state) {
            Session::Valid(claims) => Some(claims.uid),
            Session::Missing | Session::Invalid => None,
        };
        Ok(MaybeUser(uid))
    }
}

/// Re-issues the session cookie when a valid session is close to expiry.
/// Responses that already set a cookie (login, logout, account removal) keep theirs.
pub async fn renew_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let claims = match session_from(request.headers(), &state) {
        Session::Valid(claims) => Some(claims),
        Session::Missing | Session::Invalid => None,
    };
    let mut response = next.run(request).await;
    let Some(claims) = claims else {
        return response;
    };
    if !response.status().is_success() || response.headers().contains_key(header::SET_COOKIE) {
        return response;
    }

    let now = Utc::now();
    if claims.remaining(now) > chrono::Duration::seconds(RENEW_WITHIN_SECS) {
        return response;
    }
    let username = state.engine.me(&claims.uid).await.ok().map(|p| p.username);
    match state.sessions.renewal(&claims, username.as_deref(), now) {
        Ok(Some(token)) => {
            if let Ok(value) = HeaderValue::from_str(&session_cookie(&token)) {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Session renewal failed"),
    }
    response
}

fn reject(err: CinesorteError) -> Response {
    ApiError(err).into_response()
}
