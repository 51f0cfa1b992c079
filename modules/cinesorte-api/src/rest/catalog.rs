use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::warn;

use cinesorte_common::CinesorteError;
use tmdb_client::Genre;

use crate::auth::ClientIp;
use crate::error::ApiResult;
use crate::AppState;

/// Genre list for `movie` or `tv`, throttled per client address.
pub async fn genres(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    Path(media_type): Path<String>,
) -> ApiResult<Json<Vec<Genre>>> {
    if !state.catalog_limiter.check(ip).await {
        warn!(%ip, "Catalog limiter tripped");
        return Err(CinesorteError::RateLimited("Muitas requisicoes.".into()).into());
    }
    Ok(Json(state.engine.genre_list(&media_type).await?))
}
