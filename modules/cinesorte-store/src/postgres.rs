// Postgres implementation of SocialStore.
//
// Multi-document mutations run in SERIALIZABLE transactions that lock their
// read set with SELECT ... FOR UPDATE. Serialization failures and deadlocks
// are retried a bounded number of times before surfacing as Contention.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use cinesorte_common::{
    CinesorteError, Comment, CommentRevision, CuratedList, FollowEdge, Interaction, ListItem,
    ListOrigin, ListShare, MediaType, Notification, NotificationKind, NotificationSender,
    ProfileAudit, Result, Review, ReviewRevision, Role, Trophy, UserProfile,
};

use crate::traits::{
    FollowCommit, FollowFn, InteractionCommit, InteractionFn, LikeToggle, ListDetails,
    OwnedCollection, ProfileCommit, ProfileFn, ReviewCommit, ReviewFilter, ReviewFn, SocialStore,
};

const MAX_TX_ATTEMPTS: u32 = 5;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CinesorteError::Database(e.to_string()))?;
        Ok(())
    }

    async fn begin_serializable(&self) -> sqlx::Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn try_update_interaction(
        &self,
        uid: &str,
        media_id: &str,
        f: &InteractionFn<'_>,
    ) -> std::result::Result<InteractionCommit, TxError> {
        let mut tx = self.begin_serializable().await?;

        let user = lock_user(&mut *tx, uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let existing = sqlx::query_as::<_, InteractionRow>(
            "SELECT * FROM interactions WHERE user_id = $1 AND media_id = $2 FOR UPDATE",
        )
        .bind(uid)
        .bind(media_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Interaction::from);

        let commit = f(&user, existing.as_ref())?;

        write_user(&mut *tx, &commit.user).await?;
        upsert_interaction(&mut *tx, &commit.interaction).await?;
        tx.commit().await?;
        Ok(commit)
    }

    async fn try_create_review(
        &self,
        uid: &str,
        f: &ReviewFn<'_>,
    ) -> std::result::Result<ReviewCommit, TxError> {
        let mut tx = self.begin_serializable().await?;

        let user = lock_user(&mut *tx, uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let commit = f(&user)?;

        write_user(&mut *tx, &commit.user).await?;
        insert_review(&mut *tx, &commit.review).await?;
        tx.commit().await?;
        Ok(commit)
    }

    async fn try_update_profile(
        &self,
        uid: &str,
        f: &ProfileFn<'_>,
    ) -> std::result::Result<ProfileCommit, TxError> {
        let mut tx = self.begin_serializable().await?;

        let user = lock_user(&mut *tx, uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let commit = f(&user)?;

        if let Some(audit) = &commit.audit {
            write_user(&mut *tx, &commit.user).await?;
            sqlx::query(
                r#"
                INSERT INTO profile_history (id, user_id, changes, user_agent, changed_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(audit.id)
            .bind(&audit.user_id)
            .bind(&audit.changes)
            .bind(&audit.user_agent)
            .bind(audit.changed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(commit)
    }

    async fn try_follow(
        &self,
        follower: &str,
        target: &str,
        since: DateTime<Utc>,
        f: &FollowFn<'_>,
    ) -> std::result::Result<FollowCommit, TxError> {
        let mut tx = self.begin_serializable().await?;

        // Lock both aggregates in id order so concurrent follows cannot deadlock.
        let ids = vec![follower.to_string(), target.to_string()];
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
        let mut follower_user = None;
        let mut target_user = None;
        for user in rows.into_iter().map(UserProfile::from) {
            if user.id == follower {
                follower_user = Some(user);
            } else if user.id == target {
                target_user = Some(user);
            }
        }
        let (Some(mut follower_user), Some(mut target_user)) = (follower_user, target_user) else {
            return Err(CinesorteError::not_found("Usuário não encontrado.").into());
        };

        let exists: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM user_following WHERE user_id = $1 AND followee_id = $2",
        )
        .bind(follower)
        .bind(target)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_some() {
            return Err(CinesorteError::conflict("Você já segue este usuário.").into());
        }

        follower_user.following_count += 1;
        follower_user.updated_at = since;
        target_user.followers_count += 1;
        target_user.updated_at = since;

        let new_trophies: Vec<Trophy> = f(&target_user)
            .into_iter()
            .filter(|t| !target_user.has_trophy(&t.id))
            .collect();
        target_user.merge_trophies(&new_trophies);

        write_user(&mut *tx, &follower_user).await?;
        write_user(&mut *tx, &target_user).await?;
        sqlx::query("INSERT INTO user_following (user_id, followee_id, since) VALUES ($1, $2, $3)")
            .bind(follower)
            .bind(target)
            .bind(since)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO user_followers (user_id, follower_id, since) VALUES ($1, $2, $3)")
            .bind(target)
            .bind(follower)
            .bind(since)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(FollowCommit {
            follower: follower_user,
            target: target_user,
            new_trophies,
        })
    }

    async fn try_toggle_review_like(
        &self,
        review_id: Uuid,
        uid: &str,
    ) -> std::result::Result<LikeToggle, TxError> {
        let mut tx = self.begin_serializable().await?;

        let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM reviews WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(CinesorteError::not_found("Review não encontrada.").into());
        }

        let removed = sqlx::query("DELETE FROM review_likes WHERE review_id = $1 AND user_id = $2")
            .bind(review_id)
            .bind(uid)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let (liked, delta) = if removed > 0 {
            (false, -1i64)
        } else {
            sqlx::query("INSERT INTO review_likes (review_id, user_id) VALUES ($1, $2)")
                .bind(review_id)
                .bind(uid)
                .execute(&mut *tx)
                .await?;
            (true, 1i64)
        };

        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            UPDATE reviews SET likes_count = GREATEST(likes_count + $2, 0)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(review_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(LikeToggle {
            liked,
            review: Review::try_from(row)?,
        })
    }
}

#[async_trait]
impl SocialStore for PgStore {
    // --- Users ---

    async fn insert_user(&self, user: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, name, username, email, role, bio, photo_url, background_url,
                 xp, total_xp, level, level_title,
                 reviews_count, watched_count, followers_count, following_count,
                 genre_counts, trophies, terms_version, terms_accepted_at,
                 last_username_change, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.bio)
        .bind(&user.photo_url)
        .bind(&user.background_url)
        .bind(user.xp)
        .bind(user.total_xp)
        .bind(user.level)
        .bind(&user.level_title)
        .bind(user.reviews_count)
        .bind(user.watched_count)
        .bind(user.followers_count)
        .bind(user.following_count)
        .bind(Json(&user.genre_counts))
        .bind(Json(&user.trophies))
        .bind(&user.terms_version)
        .bind(user.terms_accepted_at)
        .bind(user.last_username_change)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(UserProfile::from))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username.to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(UserProfile::from))
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<UserProfile>> {
        let pattern = format!("{}%", escape_like(&prefix.to_lowercase()));
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT * FROM users
            WHERE username LIKE $1
            ORDER BY username ASC
            LIMIT $2
            "#,
        )
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    async fn update_profile(&self, uid: &str, f: &ProfileFn<'_>) -> Result<ProfileCommit> {
        retry_on_conflict("update_profile", || self.try_update_profile(uid, f))
            .await
    }

    async fn profile_history(&self, uid: &str) -> Result<Vec<ProfileAudit>> {
        let rows = sqlx::query_as::<_, ProfileAuditRow>(
            "SELECT * FROM profile_history WHERE user_id = $1 ORDER BY changed_at DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ProfileAudit::from).collect())
    }

    async fn increment_genre_counts(
        &self,
        uid: &str,
        genre_ids: &[i64],
        weight: i64,
    ) -> Result<()> {
        if genre_ids.is_empty() || weight == 0 {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE users SET
                genre_counts = genre_counts || (
                    SELECT COALESCE(
                        jsonb_object_agg(g::text, COALESCE((genre_counts ->> g::text)::bigint, 0) + $3),
                        '{}'::jsonb
                    )
                    FROM unnest($2::bigint[]) AS t(g)
                ),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(uid)
        .bind(genre_ids)
        .bind(weight)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_owned_page(
        &self,
        collection: OwnedCollection,
        uid: &str,
        limit: usize,
    ) -> Result<usize> {
        let limit = limit as i64;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let deleted = match collection {
            OwnedCollection::Reviews => sqlx::query(
                "DELETE FROM reviews WHERE id IN (SELECT id FROM reviews WHERE user_id = $1 LIMIT $2)",
            )
            .bind(uid)
            .bind(limit)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize,

            OwnedCollection::Comments => {
                let parents: Vec<Uuid> = sqlx::query_scalar(
                    r#"
                    DELETE FROM comments
                    WHERE id IN (SELECT id FROM comments WHERE user_id = $1 LIMIT $2)
                    RETURNING review_id
                    "#,
                )
                .bind(uid)
                .bind(limit)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
                sqlx::query(
                    r#"
                    UPDATE reviews r SET comments_count = GREATEST(r.comments_count - d.n, 0)
                    FROM (
                        SELECT review_id, COUNT(*) AS n
                        FROM unnest($1::uuid[]) AS t(review_id)
                        GROUP BY review_id
                    ) d
                    WHERE r.id = d.review_id
                    "#,
                )
                .bind(&parents)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                parents.len()
            }

            OwnedCollection::Interactions => sqlx::query(
                r#"
                DELETE FROM interactions
                WHERE (user_id, media_id) IN (
                    SELECT user_id, media_id FROM interactions WHERE user_id = $1 LIMIT $2
                )
                "#,
            )
            .bind(uid)
            .bind(limit)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize,

            OwnedCollection::Notifications => sqlx::query(
                r#"
                DELETE FROM notifications
                WHERE id IN (SELECT id FROM notifications WHERE recipient_id = $1 LIMIT $2)
                "#,
            )
            .bind(uid)
            .bind(limit)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize,

            OwnedCollection::Following => {
                let followees: Vec<String> = sqlx::query_scalar(
                    r#"
                    DELETE FROM user_following
                    WHERE user_id = $1 AND followee_id IN (
                        SELECT followee_id FROM user_following WHERE user_id = $1 LIMIT $2
                    )
                    RETURNING followee_id
                    "#,
                )
                .bind(uid)
                .bind(limit)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
                sqlx::query("DELETE FROM user_followers WHERE follower_id = $1 AND user_id = ANY($2)")
                    .bind(uid)
                    .bind(&followees)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                sqlx::query(
                    "UPDATE users SET followers_count = GREATEST(followers_count - 1, 0) WHERE id = ANY($1)",
                )
                .bind(&followees)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                followees.len()
            }

            OwnedCollection::Followers => {
                let followers: Vec<String> = sqlx::query_scalar(
                    r#"
                    DELETE FROM user_followers
                    WHERE user_id = $1 AND follower_id IN (
                        SELECT follower_id FROM user_followers WHERE user_id = $1 LIMIT $2
                    )
                    RETURNING follower_id
                    "#,
                )
                .bind(uid)
                .bind(limit)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
                sqlx::query("DELETE FROM user_following WHERE followee_id = $1 AND user_id = ANY($2)")
                    .bind(uid)
                    .bind(&followers)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                sqlx::query(
                    "UPDATE users SET following_count = GREATEST(following_count - 1, 0) WHERE id = ANY($1)",
                )
                .bind(&followers)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
                followers.len()
            }

            OwnedCollection::ProfileHistory => sqlx::query(
                r#"
                DELETE FROM profile_history
                WHERE id IN (SELECT id FROM profile_history WHERE user_id = $1 LIMIT $2)
                "#,
            )
            .bind(uid)
            .bind(limit)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize,

            OwnedCollection::Lists => sqlx::query(
                r#"
                DELETE FROM lists
                WHERE user_id = $1 AND id IN (SELECT id FROM lists WHERE user_id = $1 LIMIT $2)
                "#,
            )
            .bind(uid)
            .bind(limit)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize,

            OwnedCollection::ListShares => sqlx::query(
                r#"
                DELETE FROM list_shares
                WHERE id IN (SELECT id FROM list_shares WHERE user_id = $1 LIMIT $2)
                "#,
            )
            .bind(uid)
            .bind(limit)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize,
        };

        tx.commit().await.map_err(db_err)?;
        Ok(deleted)
    }

    // --- Interactions ---

    async fn update_interaction(
        &self,
        uid: &str,
        media_id: &str,
        f: &InteractionFn<'_>,
    ) -> Result<InteractionCommit> {
        retry_on_conflict("update_interaction", || {
            self.try_update_interaction(uid, media_id, f)
        })
        .await
    }

    async fn get_interaction(&self, uid: &str, media_id: &str) -> Result<Option<Interaction>> {
        let row = sqlx::query_as::<_, InteractionRow>(
            "SELECT * FROM interactions WHERE user_id = $1 AND media_id = $2",
        )
        .bind(uid)
        .bind(media_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Interaction::from))
    }

    async fn list_interactions(&self, uid: &str) -> Result<Vec<Interaction>> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            "SELECT * FROM interactions WHERE user_id = $1 ORDER BY last_interaction DESC",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Interaction::from).collect())
    }

    async fn list_watched_between(
        &self,
        uid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Interaction>> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            r#"
            SELECT * FROM interactions
            WHERE user_id = $1
              AND watched
              AND watched_at >= $2
              AND watched_at < $3
            ORDER BY watched_at DESC
            "#,
        )
        .bind(uid)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Interaction::from).collect())
    }

    // --- Reviews ---

    async fn create_review(&self, uid: &str, f: &ReviewFn<'_>) -> Result<ReviewCommit> {
        retry_on_conflict("create_review", || self.try_create_review(uid, f))
            .await
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Review::try_from).transpose()
    }

    async fn list_reviews(&self, filter: ReviewFilter, limit: usize) -> Result<Vec<Review>> {
        let limit = limit as i64;
        let rows = match filter {
            ReviewFilter::All => {
                sqlx::query_as::<_, ReviewRow>(
                    "SELECT * FROM reviews ORDER BY created_at DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            ReviewFilter::ByMedia(media_id) => {
                sqlx::query_as::<_, ReviewRow>(
                    "SELECT * FROM reviews WHERE media_id = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(media_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            ReviewFilter::ByUser(uid) => {
                sqlx::query_as::<_, ReviewRow>(
                    "SELECT * FROM reviews WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(uid)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            ReviewFilter::ByUsers(uids) => {
                if uids.is_empty() {
                    return Ok(Vec::new());
                }
                sqlx::query_as::<_, ReviewRow>(
                    "SELECT * FROM reviews WHERE user_id = ANY($1) ORDER BY created_at DESC LIMIT $2",
                )
                .bind(uids)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_err)?;

        rows.into_iter().map(Review::try_from).collect()
    }

    async fn update_review(
        &self,
        id: Uuid,
        text: &str,
        rating: f64,
        revision: &ReviewRevision,
    ) -> Result<Review> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row = sqlx::query_as::<_, ReviewRow>(
            r#"
            UPDATE reviews SET text = $2, rating = $3, is_edited = true, updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(rating)
        .bind(revision.edited_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| CinesorteError::not_found("Review não encontrada."))?;

        sqlx::query(
            r#"
            INSERT INTO review_revisions (id, review_id, previous_text, previous_rating, edited_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(revision.id)
        .bind(id)
        .bind(&revision.previous_text)
        .bind(revision.previous_rating)
        .bind(revision.edited_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Review::try_from(row)
    }

    async fn delete_review(&self, id: Uuid) -> Result<()> {
        // Likes, comments and both revision tables cascade from the review row.
        let affected = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        if affected == 0 {
            return Err(CinesorteError::not_found("Review não encontrada."));
        }
        Ok(())
    }

    async fn review_history(&self, id: Uuid) -> Result<Vec<ReviewRevision>> {
        let rows = sqlx::query_as::<_, ReviewRevisionRow>(
            "SELECT * FROM review_revisions WHERE review_id = $1 ORDER BY edited_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ReviewRevision::from).collect())
    }

    async fn toggle_review_like(&self, review_id: Uuid, uid: &str) -> Result<LikeToggle> {
        retry_on_conflict("toggle_review_like", || {
            self.try_toggle_review_like(review_id, uid)
        })
        .await
    }

    async fn is_review_liked(&self, review_id: Uuid, uid: &str) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM review_likes WHERE review_id = $1 AND user_id = $2",
        )
        .bind(review_id)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(found.is_some())
    }

    // --- Comments ---

    async fn add_comment(&self, comment: &Comment) -> Result<Review> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let parent = sqlx::query_as::<_, ReviewRow>(
            r#"
            UPDATE reviews SET comments_count = comments_count + 1
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(comment.review_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| CinesorteError::not_found("Review não encontrada."))?;

        sqlx::query(
            r#"
            INSERT INTO comments
                (id, review_id, user_id, username, user_photo, level_title, text,
                 parent_id, is_edited, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(comment.id)
        .bind(comment.review_id)
        .bind(&comment.user_id)
        .bind(&comment.username)
        .bind(&comment.user_photo)
        .bind(&comment.level_title)
        .bind(&comment.text)
        .bind(comment.parent_id)
        .bind(comment.is_edited)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Review::try_from(parent)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, CommentRow>("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Comment::from))
    }

    async fn list_comments(&self, review_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT * FROM comments WHERE review_id = $1 ORDER BY created_at ASC",
        )
        .bind(review_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn update_comment(
        &self,
        id: Uuid,
        text: &str,
        revision: &CommentRevision,
    ) -> Result<Comment> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            UPDATE comments SET text = $2, is_edited = true, updated_at = $3
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(text)
        .bind(revision.edited_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or_else(|| CinesorteError::not_found("Comentário não encontrado."))?;

        sqlx::query(
            r#"
            INSERT INTO comment_revisions (id, comment_id, review_id, previous_text, edited_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(revision.id)
        .bind(id)
        .bind(revision.review_id)
        .bind(&revision.previous_text)
        .bind(revision.edited_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(Comment::from(row))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let review_id: Uuid =
            sqlx::query_scalar("DELETE FROM comments WHERE id = $1 RETURNING review_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?
                .ok_or_else(|| CinesorteError::not_found("Comentário não encontrado."))?;
        sqlx::query(
            "UPDATE reviews SET comments_count = GREATEST(comments_count - 1, 0) WHERE id = $1",
        )
        .bind(review_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn comment_history(&self, id: Uuid) -> Result<Vec<CommentRevision>> {
        let rows = sqlx::query_as::<_, CommentRevisionRow>(
            "SELECT * FROM comment_revisions WHERE comment_id = $1 ORDER BY edited_at DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(CommentRevision::from).collect())
    }

    // --- Follow graph ---

    async fn follow(
        &self,
        follower: &str,
        target: &str,
        since: DateTime<Utc>,
        f: &FollowFn<'_>,
    ) -> Result<FollowCommit> {
        if follower == target {
            return Err(CinesorteError::validation("Você não pode seguir a si mesmo."));
        }
        retry_on_conflict("follow", || self.try_follow(follower, target, since, f))
            .await
    }

    async fn unfollow(&self, follower: &str, target: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let removed = sqlx::query("DELETE FROM user_following WHERE user_id = $1 AND followee_id = $2")
            .bind(follower)
            .bind(target)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();
        sqlx::query("DELETE FROM user_followers WHERE user_id = $1 AND follower_id = $2")
            .bind(target)
            .bind(follower)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if removed > 0 {
            sqlx::query(
                "UPDATE users SET following_count = GREATEST(following_count - 1, 0), updated_at = now() WHERE id = $1",
            )
            .bind(follower)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
            sqlx::query(
                "UPDATE users SET followers_count = GREATEST(followers_count - 1, 0), updated_at = now() WHERE id = $1",
            )
            .bind(target)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(removed > 0)
    }

    async fn is_following(&self, follower: &str, target: &str) -> Result<bool> {
        let found: Option<i32> = sqlx::query_scalar(
            "SELECT 1 FROM user_following WHERE user_id = $1 AND followee_id = $2",
        )
        .bind(follower)
        .bind(target)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(found.is_some())
    }

    async fn list_following(&self, uid: &str, limit: usize) -> Result<Vec<FollowEdge>> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT followee_id, since FROM user_following
            WHERE user_id = $1
            ORDER BY since DESC
            LIMIT $2
            "#,
        )
        .bind(uid)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(user_id, since)| FollowEdge { user_id, since })
            .collect())
    }

    async fn list_followers(&self, uid: &str, limit: usize) -> Result<Vec<FollowEdge>> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT follower_id, since FROM user_followers
            WHERE user_id = $1
            ORDER BY since DESC
            LIMIT $2
            "#,
        )
        .bind(uid)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(user_id, since)| FollowEdge { user_id, since })
            .collect())
    }

    async fn count_following(&self, uid: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_following WHERE user_id = $1")
            .bind(uid)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn count_followers(&self, uid: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_followers WHERE user_id = $1")
            .bind(uid)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    // --- Curated lists ---

    async fn insert_list(&self, list: &CuratedList) -> Result<()> {
        insert_list_row(&self.pool, list).await.map_err(db_err)
    }

    async fn get_list(&self, uid: &str, list_id: &str) -> Result<Option<CuratedList>> {
        let row = sqlx::query_as::<_, ListRow>("SELECT * FROM lists WHERE user_id = $1 AND id = $2")
            .bind(uid)
            .bind(list_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(CuratedList::from))
    }

    async fn list_lists(&self, uid: &str, public_only: bool) -> Result<Vec<CuratedList>> {
        let rows = sqlx::query_as::<_, ListRow>(
            r#"
            SELECT * FROM lists
            WHERE user_id = $1 AND (is_public OR NOT $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(uid)
        .bind(public_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(CuratedList::from).collect())
    }

    async fn update_list_details(
        &self,
        uid: &str,
        list_id: &str,
        details: &ListDetails,
    ) -> Result<CuratedList> {
        let row = sqlx::query_as::<_, ListRow>(
            r#"
            UPDATE lists SET name = $3, description = $4, is_public = $5, updated_at = $6
            WHERE user_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(uid)
        .bind(list_id)
        .bind(&details.name)
        .bind(&details.description)
        .bind(details.is_public)
        .bind(details.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(list_missing)?;
        Ok(CuratedList::from(row))
    }

    async fn clone_list(&self, owner: &str, source_id: &str, copy: &CuratedList) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let bumped = sqlx::query(
            "UPDATE lists SET saves_count = saves_count + 1 WHERE user_id = $1 AND id = $2",
        )
        .bind(owner)
        .bind(source_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();
        if bumped == 0 {
            return Err(list_missing());
        }
        insert_list_row(&mut *tx, copy).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn add_list_item(&self, uid: &str, list_id: &str, item: &ListItem) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut items = lock_list_items(&mut tx, uid, list_id).await?;
        if items.iter().any(|i| i.id == item.id) {
            return Ok(false);
        }
        items.push(item.clone());
        write_list_items(&mut tx, uid, list_id, &items, item.added_at).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }

    async fn remove_list_item(
        &self,
        uid: &str,
        list_id: &str,
        media_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut items = lock_list_items(&mut tx, uid, list_id).await?;
        let before = items.len();
        items.retain(|i| i.id != media_id);
        let removed = items.len() < before;
        write_list_items(&mut tx, uid, list_id, &items, now).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(removed)
    }

    async fn delete_list(&self, uid: &str, list_id: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM lists WHERE user_id = $1 AND id = $2")
            .bind(uid)
            .bind(list_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn insert_list_share(&self, share: &ListShare) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO list_shares
                (id, user_id, username, user_photo, level_title, list_id, list_name,
                 content, likes_count, comments_count, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(share.id)
        .bind(&share.user_id)
        .bind(&share.username)
        .bind(&share.user_photo)
        .bind(&share.level_title)
        .bind(&share.list_id)
        .bind(&share.list_name)
        .bind(&share.content)
        .bind(share.likes_count)
        .bind(share.comments_count)
        .bind(share.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_shares(&self, limit: usize) -> Result<Vec<ListShare>> {
        let rows = sqlx::query_as::<_, ListShareRow>(
            "SELECT * FROM list_shares ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(ListShare::from).collect())
    }

    // --- Notifications ---

    async fn insert_notification(&self, n: &Notification) -> Result<()> {
        let sender = n.sender.as_ref();
        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, recipient_id, sender_id, sender_name, sender_photo, kind,
                 title, message, icon, media_id, media_type, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(n.id)
        .bind(&n.recipient_id)
        .bind(sender.map(|s| s.id.as_str()))
        .bind(sender.map(|s| s.name.as_str()))
        .bind(sender.and_then(|s| s.photo.as_deref()))
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.icon)
        .bind(&n.media_id)
        .bind(n.media_type.map(|m| m.as_str()))
        .bind(n.read)
        .bind(n.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_notifications(&self, recipient: &str, limit: usize) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(recipient)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn count_unread(&self, recipient: &str) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT read",
        )
        .bind(recipient)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient: &str) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE notifications SET read = true WHERE id = $1 AND recipient_id = $2 AND NOT read",
        )
        .bind(id)
        .bind(recipient)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .rows_affected();
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Transaction plumbing
// ---------------------------------------------------------------------------

/// Failure inside a retryable transaction: either the database or the caller's closure.
enum TxError {
    /// Serialization failure or deadlock: the whole transaction may be re-run.
    Conflict(String),
    Sql(sqlx::Error),
    Domain(CinesorteError),
}

impl From<sqlx::Error> for TxError {
    fn from(err: sqlx::Error) -> Self {
        if is_serialization_failure(&err) {
            TxError::Conflict(err.to_string())
        } else {
            TxError::Sql(err)
        }
    }
}

impl From<CinesorteError> for TxError {
    fn from(err: CinesorteError) -> Self {
        TxError::Domain(err)
    }
}

impl From<TxError> for CinesorteError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Conflict(msg) => CinesorteError::Contention(msg),
            TxError::Sql(e) => db_err(e),
            TxError::Domain(e) => e,
        }
    }
}

/// Re-run `attempt` while it fails with a conflict, backing off a little more
/// each time. After `MAX_TX_ATTEMPTS` conflicts the operation is Contention.
async fn retry_on_conflict<T, F, Fut>(op: &'static str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, TxError>>,
{
    let mut n = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(TxError::Conflict(reason)) => {
                if n >= MAX_TX_ATTEMPTS {
                    warn!(op, attempts = n, %reason, "Transaction gave up after repeated conflicts");
                    return Err(CinesorteError::Contention(op.to_string()));
                }
                debug!(op, attempt = n, "Transaction conflict, retrying");
                tokio::time::sleep(Duration::from_millis(25 * u64::from(n))).await;
                n += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "40001" || code == "40P01")
}

fn db_err(err: sqlx::Error) -> CinesorteError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return CinesorteError::conflict("Registro já existe.");
        }
    }
    CinesorteError::Database(err.to_string())
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn list_missing() -> CinesorteError {
    CinesorteError::not_found("Lista não encontrada.")
}

async fn insert_list_row<'e, E>(executor: E, list: &CuratedList) -> sqlx::Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO lists
            (user_id, id, name, description, items, is_public, saves_count,
             cloned_from, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&list.user_id)
    .bind(&list.id)
    .bind(&list.name)
    .bind(&list.description)
    .bind(Json(&list.items))
    .bind(list.is_public)
    .bind(list.saves_count)
    .bind(list.cloned_from.as_ref().map(Json))
    .bind(list.created_at)
    .bind(list.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

async fn lock_list_items(
    tx: &mut Transaction<'_, Postgres>,
    uid: &str,
    list_id: &str,
) -> Result<Vec<ListItem>> {
    let items: Json<Vec<ListItem>> =
        sqlx::query_scalar("SELECT items FROM lists WHERE user_id = $1 AND id = $2 FOR UPDATE")
            .bind(uid)
            .bind(list_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_err)?
            .ok_or_else(list_missing)?;
    Ok(items.0)
}

async fn write_list_items(
    tx: &mut Transaction<'_, Postgres>,
    uid: &str,
    list_id: &str,
    items: &[ListItem],
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE lists SET items = $3, updated_at = $4 WHERE user_id = $1 AND id = $2")
        .bind(uid)
        .bind(list_id)
        .bind(Json(items))
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn lock_user(conn: &mut PgConnection, uid: &str) -> sqlx::Result<Option<UserProfile>> {
    let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(uid)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(UserProfile::from))
}

async fn write_user(conn: &mut PgConnection, user: &UserProfile) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users SET
            name = $2, username = $3, email = $4, role = $5, bio = $6,
            photo_url = $7, background_url = $8,
            xp = $9, total_xp = $10, level = $11, level_title = $12,
            reviews_count = $13, watched_count = $14,
            followers_count = $15, following_count = $16,
            genre_counts = $17, trophies = $18,
            terms_version = $19, terms_accepted_at = $20,
            last_username_change = $21, updated_at = $22
        WHERE id = $1
        "#,
    )
    .bind(&user.id)
    .bind(&user.name)
    .bind(&user.username)
    .bind(&user.email)
    .bind(user.role.as_str())
    .bind(&user.bio)
    .bind(&user.photo_url)
    .bind(&user.background_url)
    .bind(user.xp)
    .bind(user.total_xp)
    .bind(user.level)
    .bind(&user.level_title)
    .bind(user.reviews_count)
    .bind(user.watched_count)
    .bind(user.followers_count)
    .bind(user.following_count)
    .bind(Json(&user.genre_counts))
    .bind(Json(&user.trophies))
    .bind(&user.terms_version)
    .bind(user.terms_accepted_at)
    .bind(user.last_username_change)
    .bind(user.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn upsert_interaction(conn: &mut PgConnection, i: &Interaction) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO interactions
            (user_id, media_id, media_type, media_title, poster_path,
             liked, disliked, watched, favorite, watched_at, last_interaction)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (user_id, media_id) DO UPDATE SET
            media_type = EXCLUDED.media_type,
            media_title = EXCLUDED.media_title,
            poster_path = EXCLUDED.poster_path,
            liked = EXCLUDED.liked,
            disliked = EXCLUDED.disliked,
            watched = EXCLUDED.watched,
            favorite = EXCLUDED.favorite,
            watched_at = EXCLUDED.watched_at,
            last_interaction = EXCLUDED.last_interaction
        "#,
    )
    .bind(&i.user_id)
    .bind(&i.media_id)
    .bind(i.media_type.map(|m| m.as_str()))
    .bind(&i.media_title)
    .bind(&i.poster_path)
    .bind(i.liked)
    .bind(i.disliked)
    .bind(i.watched)
    .bind(i.favorite)
    .bind(i.watched_at)
    .bind(i.last_interaction)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_review(conn: &mut PgConnection, r: &Review) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reviews
            (id, user_id, media_id, media_type, media_title, poster_path, backdrop_path,
             rating, text, likes_count, comments_count, username, user_photo, level_title,
             is_elite_review, is_edited, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(r.id)
    .bind(&r.user_id)
    .bind(&r.media_id)
    .bind(r.media_type.as_str())
    .bind(&r.media_title)
    .bind(&r.poster_path)
    .bind(&r.backdrop_path)
    .bind(r.rating)
    .bind(&r.text)
    .bind(r.likes_count)
    .bind(r.comments_count)
    .bind(&r.username)
    .bind(&r.user_photo)
    .bind(&r.level_title)
    .bind(r.is_elite_review)
    .bind(r.is_edited)
    .bind(r.created_at)
    .bind(r.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    username: String,
    email: String,
    role: String,
    bio: Option<String>,
    photo_url: Option<String>,
    background_url: Option<String>,
    xp: i64,
    total_xp: i64,
    level: i32,
    level_title: String,
    reviews_count: i64,
    watched_count: i64,
    followers_count: i64,
    following_count: i64,
    genre_counts: Json<BTreeMap<i64, i64>>,
    trophies: Json<Vec<Trophy>>,
    terms_version: Option<String>,
    terms_accepted_at: Option<DateTime<Utc>>,
    last_username_change: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            username: r.username,
            email: r.email,
            role: Role::parse(&r.role),
            bio: r.bio,
            photo_url: r.photo_url,
            background_url: r.background_url,
            xp: r.xp,
            total_xp: r.total_xp,
            level: r.level,
            level_title: r.level_title,
            reviews_count: r.reviews_count,
            watched_count: r.watched_count,
            followers_count: r.followers_count,
            following_count: r.following_count,
            genre_counts: r.genre_counts.0,
            trophies: r.trophies.0,
            terms_version: r.terms_version,
            terms_accepted_at: r.terms_accepted_at,
            last_username_change: r.last_username_change,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileAuditRow {
    id: Uuid,
    user_id: String,
    changes: serde_json::Value,
    user_agent: Option<String>,
    changed_at: DateTime<Utc>,
}

impl From<ProfileAuditRow> for ProfileAudit {
    fn from(r: ProfileAuditRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            changes: r.changes,
            user_agent: r.user_agent,
            changed_at: r.changed_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InteractionRow {
    user_id: String,
    media_id: String,
    media_type: Option<String>,
    media_title: String,
    poster_path: Option<String>,
    liked: bool,
    disliked: bool,
    watched: bool,
    favorite: bool,
    watched_at: Option<DateTime<Utc>>,
    last_interaction: DateTime<Utc>,
}

impl From<InteractionRow> for Interaction {
    fn from(r: InteractionRow) -> Self {
        Self {
            user_id: r.user_id,
            media_id: r.media_id,
            media_type: r.media_type.as_deref().and_then(MediaType::parse),
            media_title: r.media_title,
            poster_path: r.poster_path,
            liked: r.liked,
            disliked: r.disliked,
            watched: r.watched,
            favorite: r.favorite,
            watched_at: r.watched_at,
            last_interaction: r.last_interaction,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: String,
    media_id: String,
    media_type: String,
    media_title: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    rating: f64,
    text: String,
    likes_count: i64,
    comments_count: i64,
    username: String,
    user_photo: Option<String>,
    level_title: String,
    is_elite_review: bool,
    is_edited: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = CinesorteError;

    fn try_from(r: ReviewRow) -> Result<Self> {
        let media_type = MediaType::parse(&r.media_type).ok_or_else(|| {
            CinesorteError::Database(format!("review {} has unknown media type {}", r.id, r.media_type))
        })?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            media_id: r.media_id,
            media_type,
            media_title: r.media_title,
            poster_path: r.poster_path,
            backdrop_path: r.backdrop_path,
            rating: r.rating,
            text: r.text,
            likes_count: r.likes_count,
            comments_count: r.comments_count,
            username: r.username,
            user_photo: r.user_photo,
            level_title: r.level_title,
            is_elite_review: r.is_elite_review,
            is_edited: r.is_edited,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRevisionRow {
    id: Uuid,
    review_id: Uuid,
    previous_text: String,
    previous_rating: f64,
    edited_at: DateTime<Utc>,
}

impl From<ReviewRevisionRow> for ReviewRevision {
    fn from(r: ReviewRevisionRow) -> Self {
        Self {
            id: r.id,
            review_id: r.review_id,
            previous_text: r.previous_text,
            previous_rating: r.previous_rating,
            edited_at: r.edited_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    review_id: Uuid,
    user_id: String,
    username: String,
    user_photo: Option<String>,
    level_title: String,
    text: String,
    parent_id: Option<Uuid>,
    is_edited: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id,
            review_id: r.review_id,
            user_id: r.user_id,
            username: r.username,
            user_photo: r.user_photo,
            level_title: r.level_title,
            text: r.text,
            parent_id: r.parent_id,
            is_edited: r.is_edited,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRevisionRow {
    id: Uuid,
    comment_id: Uuid,
    review_id: Uuid,
    previous_text: String,
    edited_at: DateTime<Utc>,
}

impl From<CommentRevisionRow> for CommentRevision {
    fn from(r: CommentRevisionRow) -> Self {
        Self {
            id: r.id,
            comment_id: r.comment_id,
            review_id: r.review_id,
            previous_text: r.previous_text,
            edited_at: r.edited_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListRow {
    user_id: String,
    id: String,
    name: String,
    description: String,
    items: Json<Vec<ListItem>>,
    is_public: bool,
    saves_count: i64,
    cloned_from: Option<Json<ListOrigin>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ListRow> for CuratedList {
    fn from(r: ListRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            description: r.description,
            items: r.items.0,
            is_public: r.is_public,
            saves_count: r.saves_count,
            cloned_from: r.cloned_from.map(|o| o.0),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListShareRow {
    id: Uuid,
    user_id: String,
    username: String,
    user_photo: Option<String>,
    level_title: String,
    list_id: String,
    list_name: String,
    content: String,
    likes_count: i64,
    comments_count: i64,
    created_at: DateTime<Utc>,
}

impl From<ListShareRow> for ListShare {
    fn from(r: ListShareRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            username: r.username,
            user_photo: r.user_photo,
            level_title: r.level_title,
            list_id: r.list_id,
            list_name: r.list_name,
            content: r.content,
            likes_count: r.likes_count,
            comments_count: r.comments_count,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: String,
    sender_id: Option<String>,
    sender_name: Option<String>,
    sender_photo: Option<String>,
    kind: String,
    title: String,
    message: String,
    icon: String,
    media_id: Option<String>,
    media_type: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CinesorteError;

    fn try_from(r: NotificationRow) -> Result<Self> {
        let kind = NotificationKind::parse(&r.kind).ok_or_else(|| {
            CinesorteError::Database(format!("notification {} has unknown kind {}", r.id, r.kind))
        })?;
        let sender = r.sender_id.map(|id| NotificationSender {
            id,
            name: r.sender_name.unwrap_or_default(),
            photo: r.sender_photo,
        });
        Ok(Self {
            id: r.id,
            recipient_id: r.recipient_id,
            sender,
            kind,
            title: r.title,
            message: r.message,
            icon: r.icon,
            media_id: r.media_id,
            media_type: r.media_type.as_deref().and_then(MediaType::parse),
            read: r.read,
            created_at: r.created_at,
        })
    }
}
