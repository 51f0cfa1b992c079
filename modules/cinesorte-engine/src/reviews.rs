// Reviews, likes and comments.
//
// Publishing a review is one transaction over the author aggregate and the
// new review. Like and comment counters on a review move only together with
// their child records. Edits snapshot the previous version first; deleting a
// review takes its likes, comments and every snapshot with it.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use cinesorte_common::{
    bare_media_id, CinesorteError, Comment, CommentRevision, MediaType, Result, Review,
    ReviewRevision, UserProfile, DEFAULT_LEVEL_TITLE, UNKNOWN_MEDIA_TITLE,
};
use cinesorte_store::{Effects, LikeToggle, ReviewCommit};

use crate::affinity::REVIEW_WEIGHT;
use crate::notifications;
use crate::progression::{level_title, XpCurve};
use crate::trophies::{self, Criterion};
use crate::validation;
use crate::Cinesorte;

pub const REVIEW_XP: i64 = 20;

const NO_PERMISSION: &str = "Sem permissão.";

#[derive(Debug, Clone)]
pub struct NewReview {
    pub media_id: String,
    pub media_type: MediaType,
    pub rating: f64,
    pub text: Option<String>,
    pub media_title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub is_elite_review: bool,
}

impl NewReview {
    pub fn validate(&self) -> Result<()> {
        if self.media_id.trim().is_empty() {
            return Err(CinesorteError::validation("Dados inválidos."));
        }
        validation::validate_rating(self.rating)?;
        validation::validate_review_text(self.text.as_deref().unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub review_id: Uuid,
    pub text: String,
    pub parent_id: Option<Uuid>,
}

/// Fields left `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct ReviewEdit {
    pub text: Option<String>,
    pub rating: Option<f64>,
}

fn filled(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

/// The author aggregate and review written when `user` publishes `new`.
pub fn compose_review(
    curve: &XpCurve,
    user: &UserProfile,
    new: &NewReview,
    id: Uuid,
    now: DateTime<Utc>,
) -> ReviewCommit {
    let mut next = user.clone();
    next.reviews_count += 1;
    let leveled_up_to = curve.award_user(&mut next, REVIEW_XP);
    next.level_title = level_title(next.reviews_count).to_string();
    let checks = [
        (Criterion::Reviews, next.reviews_count),
        (Criterion::TotalXp, next.total_xp),
    ];
    let new_trophies = trophies::unlock(&mut next, &checks, now);
    next.updated_at = now;

    let review = Review {
        id,
        user_id: next.id.clone(),
        media_id: new.media_id.clone(),
        media_type: new.media_type,
        media_title: filled(&new.media_title).unwrap_or_else(|| UNKNOWN_MEDIA_TITLE.to_string()),
        poster_path: filled(&new.poster_path),
        backdrop_path: filled(&new.backdrop_path),
        rating: new.rating,
        text: new.text.clone().unwrap_or_default(),
        likes_count: 0,
        comments_count: 0,
        username: next.username.clone(),
        user_photo: next.photo_url.clone(),
        level_title: next.level_title.clone(),
        is_elite_review: new.is_elite_review,
        is_edited: false,
        created_at: now,
        updated_at: now,
    };

    ReviewCommit {
        user: next,
        review,
        effects: Effects {
            leveled_up_to,
            new_trophies,
        },
    }
}

impl Cinesorte {
    pub async fn add_review(&self, uid: &str, new: NewReview) -> Result<Review> {
        new.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let curve = self.curve;
        let commit = self
            .store
            .create_review(uid, &|user: &UserProfile| -> Result<ReviewCommit> {
                Ok(compose_review(&curve, user, &new, id, now))
            })
            .await?;

        info!(
            uid,
            review_id = %commit.review.id,
            media_id = %new.media_id,
            reviews = commit.user.reviews_count,
            "Review published"
        );

        self.apply_genre_weight(
            uid,
            Some(new.media_type),
            bare_media_id(&new.media_id),
            REVIEW_WEIGHT,
        )
        .await;

        if let Some(level) = commit.effects.leveled_up_to {
            self.notify(notifications::level_up(uid, level, &commit.user.level_title))
                .await;
        }

        Ok(commit.review)
    }

    /// Flip the caller's like. The author hears about likes, never about unlikes
    /// or their own likes.
    pub async fn toggle_review_like(&self, uid: &str, review_id: Uuid) -> Result<LikeToggle> {
        let toggle = self.store.toggle_review_like(review_id, uid).await?;

        if toggle.liked && toggle.review.user_id != uid {
            let actor = self.store.get_user(uid).await.ok().flatten();
            self.notify(notifications::review_liked(&toggle.review, actor.as_ref()))
                .await;
        }
        Ok(toggle)
    }

    pub async fn add_comment(&self, uid: &str, new: NewComment) -> Result<Comment> {
        validation::validate_comment_text(&new.text)?;

        let review = self
            .store
            .get_review(new.review_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Review não encontrada."))?;
        let author = self.store.get_user(uid).await?;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            review_id: review.id,
            user_id: uid.to_string(),
            username: author
                .as_ref()
                .map(|u| u.username.clone())
                .unwrap_or_else(|| "Usuário".to_string()),
            user_photo: author.as_ref().and_then(|u| u.photo_url.clone()),
            level_title: author
                .as_ref()
                .map(|u| u.level_title.clone())
                .unwrap_or_else(|| DEFAULT_LEVEL_TITLE.to_string()),
            text: new.text,
            parent_id: new.parent_id,
            is_edited: false,
            created_at: now,
            updated_at: now,
        };
        let parent = self.store.add_comment(&comment).await?;

        if parent.user_id != uid {
            self.notify(notifications::review_commented(&parent, &comment, author.as_ref()))
                .await;
        }
        Ok(comment)
    }

    pub async fn edit_review(&self, uid: &str, review_id: Uuid, edit: ReviewEdit) -> Result<Review> {
        if let Some(text) = &edit.text {
            validation::validate_review_text(text)?;
        }
        if let Some(rating) = edit.rating {
            validation::validate_rating(rating)?;
        }

        let current = self.owned_review(uid, review_id, "Review não encontrada.").await?;
        let revision = ReviewRevision {
            id: Uuid::new_v4(),
            review_id,
            previous_text: current.text.clone(),
            previous_rating: current.rating,
            edited_at: Utc::now(),
        };
        let text = edit.text.unwrap_or(current.text);
        let rating = edit.rating.unwrap_or(current.rating);
        self.store.update_review(review_id, &text, rating, &revision).await
    }

    pub async fn delete_review(&self, uid: &str, review_id: Uuid) -> Result<()> {
        self.owned_review(uid, review_id, "Não encontrada.").await?;
        self.store.delete_review(review_id).await?;
        info!(uid, %review_id, "Review deleted");
        Ok(())
    }

    pub async fn review_history(&self, uid: &str, review_id: Uuid) -> Result<Vec<ReviewRevision>> {
        self.owned_review(uid, review_id, "Review não encontrada.").await?;
        self.store.review_history(review_id).await
    }

    pub async fn edit_comment(&self, uid: &str, comment_id: Uuid, text: String) -> Result<Comment> {
        validation::validate_comment_text(&text)?;

        let current = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Comentário não encontrado."))?;
        if current.user_id != uid {
            return Err(CinesorteError::forbidden(NO_PERMISSION));
        }
        let revision = CommentRevision {
            id: Uuid::new_v4(),
            comment_id,
            review_id: current.review_id,
            previous_text: current.text,
            edited_at: Utc::now(),
        };
        self.store.update_comment(comment_id, &text, &revision).await
    }

    pub async fn delete_comment(&self, uid: &str, comment_id: Uuid) -> Result<()> {
        let current = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Não encontrado."))?;
        if current.user_id != uid {
            return Err(CinesorteError::forbidden("Proibido."));
        }
        self.store.delete_comment(comment_id).await
    }

    pub async fn comment_history(&self, uid: &str, comment_id: Uuid) -> Result<Vec<CommentRevision>> {
        let current = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Comentário não encontrado."))?;
        if current.user_id != uid {
            return Err(CinesorteError::forbidden(NO_PERMISSION));
        }
        self.store.comment_history(comment_id).await
    }

    async fn owned_review(&self, uid: &str, review_id: Uuid, missing: &str) -> Result<Review> {
        let review = self
            .store
            .get_review(review_id)
            .await?
            .ok_or_else(|| CinesorteError::not_found(missing))?;
        if review.user_id != uid {
            return Err(CinesorteError::forbidden(NO_PERMISSION));
        }
        Ok(review)
    }
}
