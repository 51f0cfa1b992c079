//! HTTP rendering of [`CinesorteError`].
//!
//! Every failure leaves as `{ "status": "fail" | "error", "message": ... }`.
//! Server faults are rendered with a generic message and tagged with a
//! [`ServerFault`] extension; the `render_faults` middleware decides whether the
//! caller sees the detail (outside production) or operators get an alert
//! (production).

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, warn};

use cinesorte_common::CinesorteError;

use crate::AppState;

pub const GENERIC_FAILURE: &str = "Algo deu errado.";

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub CinesorteError);

impl<E: Into<CinesorteError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Detail of a 5xx response, kept out of the body until `render_faults` sees it.
#[derive(Debug, Clone)]
pub struct ServerFault {
    pub message: String,
    pub debug: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_client_error() {
            let body = json!({ "status": "fail", "message": self.0.to_string() });
            return (status, Json(body)).into_response();
        }

        error!(error = %self.0, "Request failed");
        let mut response = (
            status,
            Json(json!({ "status": "error", "message": GENERIC_FAILURE })),
        )
            .into_response();
        response.extensions_mut().insert(ServerFault {
            message: self.0.to_string(),
            debug: format!("{:?}", self.0),
        });
        response
    }
}

/// Outside production, expose the fault detail. In production, keep the generic
/// body and alert operators.
pub async fn render_faults(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(fault) = response.extensions_mut().remove::<ServerFault>() else {
        return response;
    };
    let status = response.status();

    if state.app_env.is_production() {
        state
            .engine
            .alerts()
            .send(&format!(
                "ERRO CRITICO ({})\n\nMensagem: {}\nRota: {path}\nMetodo: {method}",
                status.as_u16(),
                fault.message
            ))
            .await;
        return response;
    }

    let body = json!({
        "status": "error",
        "message": fault.message,
        "error": fault.debug,
    });
    (status, Json(body)).into_response()
}

/// `Json` whose rejections render like every other validation failure.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => {
                warn!(error = %rejection, "Rejected request body");
                Err(ApiError(payload_error(&rejection)))
            }
        }
    }
}

fn payload_error(rejection: &JsonRejection) -> CinesorteError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            CinesorteError::validation("Content-Type deve ser application/json.")
        }
        _ => CinesorteError::validation("Dados inválidos."),
    }
}
