use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use cinesorte_common::Notification;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::rest::parse_id;
use crate::routes::ack;
use crate::AppState;

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.engine.notifications(&user.uid).await?))
}

pub async fn count(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<Value>> {
    let count = state.engine.unread_count(&user.uid).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.engine.mark_read(&user.uid, parse_id(&id)?).await?;
    Ok(ack("Lida."))
}
