//! HTTP surface of Cinesorte: routing, sessions, rate limits and error
//! rendering over the engine.

pub mod auth;
pub mod error;
pub mod jwt;
pub mod rate_limit;
pub mod rest;
pub mod routes;

use axum::http::HeaderValue;

use cinesorte_common::{AppEnv, Config};
use cinesorte_engine::Cinesorte;

use crate::jwt::SessionService;
use crate::rate_limit::{ActivityTracker, RateLimiter};

pub use routes::router;

pub struct AppState {
    pub engine: Cinesorte,
    pub sessions: SessionService,
    pub app_env: AppEnv,
    pub frontend_origin: HeaderValue,
    pub login_limiter: RateLimiter,
    pub register_limiter: RateLimiter,
    pub catalog_limiter: RateLimiter,
    pub activity: ActivityTracker,
}

impl AppState {
    pub fn new(
        engine: Cinesorte,
        session_secret: &str,
        app_env: AppEnv,
        frontend_url: &str,
    ) -> anyhow::Result<Self> {
        let frontend_origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))?;
        Ok(Self {
            engine,
            sessions: SessionService::new(session_secret),
            app_env,
            frontend_origin,
            login_limiter: RateLimiter::login(),
            register_limiter: RateLimiter::register(),
            catalog_limiter: RateLimiter::catalog(),
            activity: ActivityTracker::default(),
        })
    }

    pub fn from_config(engine: Cinesorte, config: &Config) -> anyhow::Result<Self> {
        Self::new(
            engine,
            &config.session_secret,
            config.app_env,
            config.normalized_frontend_url(),
        )
    }
}
