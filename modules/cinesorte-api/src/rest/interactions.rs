use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;

use cinesorte_common::{CinesorteError, Interaction, MediaType};
use cinesorte_engine::{InteractionAction, RecordInteraction};

use crate::auth::AuthUser;
use crate::error::{ApiResult, Payload};
use crate::rest::MediaId;
use crate::routes::ack;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractBody {
    media_id: Option<MediaId>,
    media_type: Option<String>,
    action: Option<String>,
    media_title: Option<String>,
    poster_path: Option<String>,
}

impl InteractBody {
    fn into_request(self) -> Result<RecordInteraction, CinesorteError> {
        let invalid = || CinesorteError::validation("Dados inválidos.");
        let media_id = self.media_id.ok_or_else(invalid)?.into_string();
        let action = self
            .action
            .as_deref()
            .and_then(InteractionAction::parse)
            .ok_or_else(invalid)?;
        let media_type = match self.media_type.as_deref() {
            None => None,
            Some(raw) => Some(MediaType::parse(raw).ok_or_else(invalid)?),
        };
        Ok(RecordInteraction {
            media_id,
            media_type,
            action,
            media_title: self.media_title,
            poster_path: self.poster_path,
        })
    }
}

#[derive(Deserialize)]
pub struct DiaryQuery {
    year: Option<i32>,
}

pub async fn record(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Payload(body): Payload<InteractBody>,
) -> ApiResult<Json<Value>> {
    let request = body.into_request()?;
    state.engine.record_interaction(&user.uid, request).await?;
    Ok(ack("Sucesso."))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Interaction>>> {
    Ok(Json(state.engine.interactions(&user.uid).await?))
}

pub async fn diary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<DiaryQuery>,
) -> ApiResult<Json<BTreeMap<u32, Vec<Interaction>>>> {
    let year = params.year.unwrap_or_else(|| Utc::now().year());
    Ok(Json(state.engine.watch_diary(&user.uid, year).await?))
}
