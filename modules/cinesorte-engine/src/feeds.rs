// Review feeds. Every item carries whether the viewer liked it, resolved with
// one existence check per review. Checks run concurrently and keep the list order.

use futures::future::try_join_all;
use serde::Serialize;
use uuid::Uuid;

use cinesorte_common::{CinesorteError, Comment, Result, Review};
use cinesorte_store::ReviewFilter;

use crate::Cinesorte;

pub const GLOBAL_FEED_LIMIT: usize = 20;
pub const FOLLOWING_FEED_AUTHORS: usize = 10;
pub const FOLLOWING_FEED_LIMIT: usize = 10;
pub const MEDIA_REVIEWS_LIMIT: usize = 100;
pub const USER_REVIEWS_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    pub is_liked_by_current_user: bool,
}

impl Cinesorte {
    pub async fn global_feed(&self, viewer: Option<&str>) -> Result<Vec<ReviewView>> {
        let reviews = self
            .store
            .list_reviews(ReviewFilter::All, GLOBAL_FEED_LIMIT)
            .await?;
        self.with_like_flags(reviews, viewer).await
    }

    /// Latest reviews by the first accounts the viewer follows.
    pub async fn following_feed(&self, uid: &str) -> Result<Vec<ReviewView>> {
        let authors: Vec<String> = self
            .store
            .list_following(uid, FOLLOWING_FEED_AUTHORS)
            .await?
            .into_iter()
            .map(|e| e.user_id)
            .filter(|id| id != uid)
            .collect();
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let reviews = self
            .store
            .list_reviews(ReviewFilter::ByUsers(authors), FOLLOWING_FEED_LIMIT)
            .await?;
        self.with_like_flags(reviews, Some(uid)).await
    }

    pub async fn media_reviews(&self, media_id: &str, viewer: Option<&str>) -> Result<Vec<ReviewView>> {
        let reviews = self
            .store
            .list_reviews(ReviewFilter::ByMedia(media_id.to_string()), MEDIA_REVIEWS_LIMIT)
            .await?;
        self.with_like_flags(reviews, viewer).await
    }

    pub async fn user_reviews(&self, username: &str, viewer: Option<&str>) -> Result<Vec<ReviewView>> {
        let author = self
            .store
            .get_user_by_username(&username.to_lowercase())
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let reviews = self
            .store
            .list_reviews(ReviewFilter::ByUser(author.id), USER_REVIEWS_LIMIT)
            .await?;
        self.with_like_flags(reviews, viewer).await
    }

    /// Comments on a review, oldest first.
    pub async fn comments(&self, review_id: Uuid) -> Result<Vec<Comment>> {
        self.store.list_comments(review_id).await
    }

    async fn with_like_flags(&self, reviews: Vec<Review>, viewer: Option<&str>) -> Result<Vec<ReviewView>> {
        let Some(viewer) = viewer else {
            return Ok(reviews
                .into_iter()
                .map(|review| ReviewView {
                    review,
                    is_liked_by_current_user: false,
                })
                .collect());
        };

        let flags = try_join_all(
            reviews
                .iter()
                .map(|r| self.store.is_review_liked(r.id, viewer)),
        )
        .await?;

        Ok(reviews
            .into_iter()
            .zip(flags)
            .map(|(review, liked)| ReviewView {
                review,
                is_liked_by_current_user: liked,
            })
            .collect())
    }
}
