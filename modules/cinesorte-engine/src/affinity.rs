// Genre affinity: signed per-genre weights accumulated from likes, watches
// and reviews. Applied after the triggering commit; any failure is logged
// and dropped.

use async_trait::async_trait;
use tracing::{debug, warn};

use cinesorte_common::{CinesorteError, MediaType, Result};
use tmdb_client::{Genre, TmdbClient};

use crate::Cinesorte;

pub const LIKE_WEIGHT: i64 = 3;
pub const WATCHED_WEIGHT: i64 = 1;
pub const REVIEW_WEIGHT: i64 = 2;

/// Read-only view of the external media catalog.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Genre ids attached to one movie or show.
    async fn genre_ids(&self, media_type: MediaType, media_id: &str) -> anyhow::Result<Vec<i64>>;

    /// Full genre list for a media type.
    async fn genres(&self, media_type: MediaType) -> anyhow::Result<Vec<Genre>>;
}

#[async_trait]
impl MediaCatalog for TmdbClient {
    async fn genre_ids(&self, media_type: MediaType, media_id: &str) -> anyhow::Result<Vec<i64>> {
        Ok(self.media_genre_ids(media_type.as_str(), media_id).await?)
    }

    async fn genres(&self, media_type: MediaType) -> anyhow::Result<Vec<Genre>> {
        Ok(TmdbClient::genres(self, media_type.as_str()).await?)
    }
}

impl Cinesorte {
    /// Add `weight` to every genre of the media. Zero weights, media without
    /// genres and catalog or store failures all end here without an error.
    pub(crate) async fn apply_genre_weight(
        &self,
        uid: &str,
        media_type: Option<MediaType>,
        media_id: &str,
        weight: i64,
    ) {
        let Some(media_type) = media_type.filter(MediaType::has_genres) else {
            return;
        };
        if weight == 0 {
            return;
        }

        let genre_ids = match self.catalog.genre_ids(media_type, media_id).await {
            Ok(ids) if ids.is_empty() => return,
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, media_id, %media_type, "Genre lookup failed, skipping affinity");
                return;
            }
        };

        match self.store.increment_genre_counts(uid, &genre_ids, weight).await {
            Ok(()) => debug!(uid, weight, genres = genre_ids.len(), "Genre affinity applied"),
            Err(e) => warn!(error = %e, uid, "Failed to apply genre affinity"),
        }
    }

    /// Catalog genre list, for `movie` or `tv` only.
    pub async fn genre_list(&self, media_type: &str) -> Result<Vec<Genre>> {
        let media_type = MediaType::parse(media_type)
            .filter(MediaType::has_genres)
            .ok_or_else(|| CinesorteError::validation("Tipo de mídia inválido."))?;
        self.catalog
            .genres(media_type)
            .await
            .map_err(|e| CinesorteError::Upstream(e.to_string()))
    }
}
