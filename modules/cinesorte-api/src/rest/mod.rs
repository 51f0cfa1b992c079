pub mod auth;
pub mod catalog;
pub mod interactions;
pub mod lists;
pub mod notifications;
pub mod social;

use axum::http::{header, HeaderMap};
use serde::Deserialize;
use uuid::Uuid;

use cinesorte_common::CinesorteError;

use crate::error::ApiError;

/// The caller's User-Agent, if it sent a readable one.
pub(crate) fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok())
}

/// Document ids arrive as path segments; a malformed one is a bad request.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError(CinesorteError::validation("Dados inválidos.")))
}

/// Catalog ids are sent as numbers by some clients and strings by others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MediaId {
    Number(i64),
    Text(String),
}

impl MediaId {
    pub fn into_string(self) -> String {
        match self {
            MediaId::Number(n) => n.to_string(),
            MediaId::Text(s) => s,
        }
    }
}
