// In-memory SocialStore for tests. Every method runs under one lock, which
// makes each call trivially atomic. No await happens while the lock is held.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use cinesorte_common::{
    CinesorteError, Comment, CommentRevision, CuratedList, FollowEdge, Interaction, ListItem,
    ListShare, Notification, ProfileAudit, Result, Review, ReviewRevision, Trophy, UserProfile,
};

use crate::traits::{
    FollowCommit, FollowFn, InteractionCommit, InteractionFn, LikeToggle, ListDetails,
    OwnedCollection, ProfileCommit, ProfileFn, ReviewCommit, ReviewFilter, ReviewFn, SocialStore,
};

#[derive(Default)]
struct State {
    users: HashMap<String, UserProfile>,
    profile_history: Vec<ProfileAudit>,
    /// (uid, media_id) → record
    interactions: HashMap<(String, String), Interaction>,
    reviews: HashMap<Uuid, Review>,
    /// (review_id, uid)
    review_likes: HashSet<(Uuid, String)>,
    review_revisions: Vec<ReviewRevision>,
    comments: HashMap<Uuid, Comment>,
    comment_revisions: Vec<CommentRevision>,
    /// uid → followee → since
    following: HashMap<String, BTreeMap<String, DateTime<Utc>>>,
    /// uid → follower → since
    followers: HashMap<String, BTreeMap<String, DateTime<Utc>>>,
    notifications: Vec<Notification>,
    fail_notifications: bool,
    /// (uid, list_id) → list
    lists: BTreeMap<(String, String), CuratedList>,
    list_shares: Vec<ListShare>,
}

/// Stateful in-memory store. Thread-safe via interior Mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert_notification` fail for every call.
    pub fn failing_notifications(self) -> Self {
        self.inner.lock().unwrap().fail_notifications = true;
        self
    }

    // --- Assertion helpers ---

    pub fn notification_count(&self) -> usize {
        self.inner.lock().unwrap().notifications.len()
    }

    pub fn notifications_for(&self, recipient: &str) -> Vec<Notification> {
        self.inner
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient)
            .cloned()
            .collect()
    }

    pub fn comment_revision_count(&self, review_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .comment_revisions
            .iter()
            .filter(|r| r.review_id == review_id)
            .count()
    }

    pub fn review_revision_count(&self, review_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .review_revisions
            .iter()
            .filter(|r| r.review_id == review_id)
            .count()
    }

    pub fn comment_count_for(&self, review_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .comments
            .values()
            .filter(|c| c.review_id == review_id)
            .count()
    }

    pub fn like_count_for(&self, review_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .review_likes
            .iter()
            .filter(|(r, _)| *r == review_id)
            .count()
    }

    /// True if the edge is present in both directed tables.
    pub fn has_edge(&self, follower: &str, target: &str) -> (bool, bool) {
        let state = self.inner.lock().unwrap();
        let forward = state
            .following
            .get(follower)
            .is_some_and(|m| m.contains_key(target));
        let reverse = state
            .followers
            .get(target)
            .is_some_and(|m| m.contains_key(follower));
        (forward, reverse)
    }
}

fn user_missing() -> CinesorteError {
    CinesorteError::not_found("Usuário não encontrado.")
}

fn review_missing() -> CinesorteError {
    CinesorteError::not_found("Review não encontrada.")
}

fn list_missing() -> CinesorteError {
    CinesorteError::not_found("Lista não encontrada.")
}

fn list_key(uid: &str, list_id: &str) -> (String, String) {
    (uid.to_string(), list_id.to_string())
}

fn comment_missing() -> CinesorteError {
    CinesorteError::not_found("Comentário não encontrado.")
}

fn newest_edges(map: Option<&BTreeMap<String, DateTime<Utc>>>, limit: usize) -> Vec<FollowEdge> {
    let mut edges: Vec<FollowEdge> = map
        .map(|m| {
            m.iter()
                .map(|(user_id, since)| FollowEdge {
                    user_id: user_id.clone(),
                    since: *since,
                })
                .collect()
        })
        .unwrap_or_default();
    edges.sort_by(|a, b| b.since.cmp(&a.since));
    edges.truncate(limit);
    edges
}

impl State {
    fn remove_review_cascade(&mut self, id: Uuid) {
        self.reviews.remove(&id);
        self.review_likes.retain(|(r, _)| *r != id);
        self.review_revisions.retain(|r| r.review_id != id);
        self.comments.retain(|_, c| c.review_id != id);
        self.comment_revisions.retain(|r| r.review_id != id);
    }

    fn remove_comment(&mut self, id: Uuid) -> Option<Comment> {
        let comment = self.comments.remove(&id)?;
        self.comment_revisions.retain(|r| r.comment_id != id);
        if let Some(parent) = self.reviews.get_mut(&comment.review_id) {
            parent.comments_count = (parent.comments_count - 1).max(0);
        }
        Some(comment)
    }
}

#[async_trait]
impl SocialStore for MemoryStore {
    // --- Users ---

    async fn insert_user(&self, user: &UserProfile) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let username_taken = state.users.values().any(|u| u.username == user.username);
        if state.users.contains_key(&user.id) || username_taken {
            return Err(CinesorteError::conflict("Registro já existe."));
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>> {
        Ok(self.inner.lock().unwrap().users.get(uid).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let username = username.to_lowercase();
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserProfile>> {
        let state = self.inner.lock().unwrap();
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<UserProfile>> {
        let prefix = prefix.to_lowercase();
        let state = self.inner.lock().unwrap();
        let mut found: Vec<UserProfile> = state
            .users
            .values()
            .filter(|u| u.username.starts_with(&prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit);
        Ok(found)
    }

    async fn list_users(&self, limit: usize) -> Result<Vec<UserProfile>> {
        let state = self.inner.lock().unwrap();
        let mut users: Vec<UserProfile> = state.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        users.truncate(limit);
        Ok(users)
    }

    async fn update_profile(&self, uid: &str, f: &ProfileFn<'_>) -> Result<ProfileCommit> {
        let mut state = self.inner.lock().unwrap();
        let user = state.users.get(uid).ok_or_else(user_missing)?;
        let commit = f(user)?;
        if let Some(audit) = &commit.audit {
            let taken = state
                .users
                .values()
                .any(|u| u.id != uid && u.username == commit.user.username);
            if taken {
                return Err(CinesorteError::conflict("Registro já existe."));
            }
            state.users.insert(uid.to_string(), commit.user.clone());
            state.profile_history.push(audit.clone());
        }
        Ok(commit)
    }

    async fn profile_history(&self, uid: &str) -> Result<Vec<ProfileAudit>> {
        let state = self.inner.lock().unwrap();
        let mut entries: Vec<ProfileAudit> = state
            .profile_history
            .iter()
            .filter(|a| a.user_id == uid)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.changed_at.cmp(&a.changed_at));
        Ok(entries)
    }

    async fn increment_genre_counts(
        &self,
        uid: &str,
        genre_ids: &[i64],
        weight: i64,
    ) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(user) = state.users.get_mut(uid) {
            let unique: HashSet<i64> = genre_ids.iter().copied().collect();
            for genre in unique {
                *user.genre_counts.entry(genre).or_insert(0) += weight;
            }
        }
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> Result<()> {
        self.inner.lock().unwrap().users.remove(uid);
        Ok(())
    }

    async fn delete_owned_page(
        &self,
        collection: OwnedCollection,
        uid: &str,
        limit: usize,
    ) -> Result<usize> {
        let mut state = self.inner.lock().unwrap();
        let deleted = match collection {
            OwnedCollection::Reviews => {
                let ids: Vec<Uuid> = state
                    .reviews
                    .values()
                    .filter(|r| r.user_id == uid)
                    .map(|r| r.id)
                    .take(limit)
                    .collect();
                for id in &ids {
                    state.remove_review_cascade(*id);
                }
                ids.len()
            }
            OwnedCollection::Comments => {
                let ids: Vec<Uuid> = state
                    .comments
                    .values()
                    .filter(|c| c.user_id == uid)
                    .map(|c| c.id)
                    .take(limit)
                    .collect();
                for id in &ids {
                    state.remove_comment(*id);
                }
                ids.len()
            }
            OwnedCollection::Interactions => {
                let keys: Vec<(String, String)> = state
                    .interactions
                    .keys()
                    .filter(|(u, _)| u == uid)
                    .take(limit)
                    .cloned()
                    .collect();
                for key in &keys {
                    state.interactions.remove(key);
                }
                keys.len()
            }
            OwnedCollection::Notifications => {
                let mut removed = 0;
                state.notifications.retain(|n| {
                    if removed < limit && n.recipient_id == uid {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
                removed
            }
            OwnedCollection::Following => {
                let followees: Vec<String> = state
                    .following
                    .get(uid)
                    .map(|m| m.keys().take(limit).cloned().collect())
                    .unwrap_or_default();
                for followee in &followees {
                    if let Some(m) = state.following.get_mut(uid) {
                        m.remove(followee);
                    }
                    if let Some(m) = state.followers.get_mut(followee) {
                        m.remove(uid);
                    }
                    if let Some(u) = state.users.get_mut(followee) {
                        u.followers_count = (u.followers_count - 1).max(0);
                    }
                }
                followees.len()
            }
            OwnedCollection::Followers => {
                let followers: Vec<String> = state
                    .followers
                    .get(uid)
                    .map(|m| m.keys().take(limit).cloned().collect())
                    .unwrap_or_default();
                for follower in &followers {
                    if let Some(m) = state.followers.get_mut(uid) {
                        m.remove(follower);
                    }
                    if let Some(m) = state.following.get_mut(follower) {
                        m.remove(uid);
                    }
                    if let Some(u) = state.users.get_mut(follower) {
                        u.following_count = (u.following_count - 1).max(0);
                    }
                }
                followers.len()
            }
            OwnedCollection::ProfileHistory => {
                let mut removed = 0;
                state.profile_history.retain(|a| {
                    if removed < limit && a.user_id == uid {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
                removed
            }
            OwnedCollection::Lists => {
                let keys: Vec<(String, String)> = state
                    .lists
                    .keys()
                    .filter(|(owner, _)| owner == uid)
                    .take(limit)
                    .cloned()
                    .collect();
                for key in &keys {
                    state.lists.remove(key);
                }
                keys.len()
            }
            OwnedCollection::ListShares => {
                let mut removed = 0;
                state.list_shares.retain(|share| {
                    if removed < limit && share.user_id == uid {
                        removed += 1;
                        false
                    } else {
                        true
                    }
                });
                removed
            }
        };
        Ok(deleted)
    }

    // --- Interactions ---

    async fn update_interaction(
        &self,
        uid: &str,
        media_id: &str,
        f: &InteractionFn<'_>,
    ) -> Result<InteractionCommit> {
        let mut state = self.inner.lock().unwrap();
        let user = state.users.get(uid).ok_or_else(user_missing)?;
        let key = (uid.to_string(), media_id.to_string());
        let commit = f(user, state.interactions.get(&key))?;
        state.users.insert(uid.to_string(), commit.user.clone());
        state.interactions.insert(key, commit.interaction.clone());
        Ok(commit)
    }

    async fn get_interaction(&self, uid: &str, media_id: &str) -> Result<Option<Interaction>> {
        let key = (uid.to_string(), media_id.to_string());
        Ok(self.inner.lock().unwrap().interactions.get(&key).cloned())
    }

    async fn list_interactions(&self, uid: &str) -> Result<Vec<Interaction>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<Interaction> = state
            .interactions
            .values()
            .filter(|i| i.user_id == uid)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_interaction.cmp(&a.last_interaction));
        Ok(found)
    }

    async fn list_watched_between(
        &self,
        uid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Interaction>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<Interaction> = state
            .interactions
            .values()
            .filter(|i| i.user_id == uid && i.watched)
            .filter(|i| i.watched_at.is_some_and(|at| at >= from && at < to))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));
        Ok(found)
    }

    // --- Reviews ---

    async fn create_review(&self, uid: &str, f: &ReviewFn<'_>) -> Result<ReviewCommit> {
        let mut state = self.inner.lock().unwrap();
        let user = state.users.get(uid).ok_or_else(user_missing)?;
        let commit = f(user)?;
        state.users.insert(uid.to_string(), commit.user.clone());
        state.reviews.insert(commit.review.id, commit.review.clone());
        Ok(commit)
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
        Ok(self.inner.lock().unwrap().reviews.get(&id).cloned())
    }

    async fn list_reviews(&self, filter: ReviewFilter, limit: usize) -> Result<Vec<Review>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| match &filter {
                ReviewFilter::All => true,
                ReviewFilter::ByMedia(media_id) => &r.media_id == media_id,
                ReviewFilter::ByUser(uid) => &r.user_id == uid,
                ReviewFilter::ByUsers(uids) => uids.contains(&r.user_id),
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn update_review(
        &self,
        id: Uuid,
        text: &str,
        rating: f64,
        revision: &ReviewRevision,
    ) -> Result<Review> {
        let mut state = self.inner.lock().unwrap();
        let review = state.reviews.get_mut(&id).ok_or_else(review_missing)?;
        review.text = text.to_string();
        review.rating = rating;
        review.is_edited = true;
        review.updated_at = revision.edited_at;
        let updated = review.clone();
        state.review_revisions.push(revision.clone());
        Ok(updated)
    }

    async fn delete_review(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.reviews.contains_key(&id) {
            return Err(review_missing());
        }
        state.remove_review_cascade(id);
        Ok(())
    }

    async fn review_history(&self, id: Uuid) -> Result<Vec<ReviewRevision>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<ReviewRevision> = state
            .review_revisions
            .iter()
            .filter(|r| r.review_id == id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.edited_at.cmp(&a.edited_at));
        Ok(found)
    }

    async fn toggle_review_like(&self, review_id: Uuid, uid: &str) -> Result<LikeToggle> {
        let mut state = self.inner.lock().unwrap();
        if !state.reviews.contains_key(&review_id) {
            return Err(review_missing());
        }
        let key = (review_id, uid.to_string());
        let liked = if state.review_likes.remove(&key) {
            false
        } else {
            state.review_likes.insert(key);
            true
        };
        let review = state.reviews.get_mut(&review_id).ok_or_else(review_missing)?;
        review.likes_count = if liked {
            review.likes_count + 1
        } else {
            (review.likes_count - 1).max(0)
        };
        Ok(LikeToggle {
            liked,
            review: review.clone(),
        })
    }

    async fn is_review_liked(&self, review_id: Uuid, uid: &str) -> Result<bool> {
        let key = (review_id, uid.to_string());
        Ok(self.inner.lock().unwrap().review_likes.contains(&key))
    }

    // --- Comments ---

    async fn add_comment(&self, comment: &Comment) -> Result<Review> {
        let mut state = self.inner.lock().unwrap();
        let parent = state
            .reviews
            .get_mut(&comment.review_id)
            .ok_or_else(review_missing)?;
        parent.comments_count += 1;
        let parent = parent.clone();
        state.comments.insert(comment.id, comment.clone());
        Ok(parent)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.inner.lock().unwrap().comments.get(&id).cloned())
    }

    async fn list_comments(&self, review_id: Uuid) -> Result<Vec<Comment>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.review_id == review_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn update_comment(
        &self,
        id: Uuid,
        text: &str,
        revision: &CommentRevision,
    ) -> Result<Comment> {
        let mut state = self.inner.lock().unwrap();
        let comment = state.comments.get_mut(&id).ok_or_else(comment_missing)?;
        comment.text = text.to_string();
        comment.is_edited = true;
        comment.updated_at = revision.edited_at;
        let updated = comment.clone();
        state.comment_revisions.push(revision.clone());
        Ok(updated)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.remove_comment(id).ok_or_else(comment_missing)?;
        Ok(())
    }

    async fn comment_history(&self, id: Uuid) -> Result<Vec<CommentRevision>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<CommentRevision> = state
            .comment_revisions
            .iter()
            .filter(|r| r.comment_id == id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.edited_at.cmp(&a.edited_at));
        Ok(found)
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
        let mut state = self.inner.lock().unwrap();
        let mut follower_user = state.users.get(follower).cloned().ok_or_else(user_missing)?;
        let mut target_user = state.users.get(target).cloned().ok_or_else(user_missing)?;
        let exists = state
            .following
            .get(follower)
            .is_some_and(|m| m.contains_key(target));
        if exists {
            return Err(CinesorteError::conflict("Você já segue este usuário."));
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

        state
            .following
            .entry(follower.to_string())
            .or_default()
            .insert(target.to_string(), since);
        state
            .followers
            .entry(target.to_string())
            .or_default()
            .insert(follower.to_string(), since);
        state.users.insert(follower.to_string(), follower_user.clone());
        state.users.insert(target.to_string(), target_user.clone());

        Ok(FollowCommit {
            follower: follower_user,
            target: target_user,
            new_trophies,
        })
    }

    async fn unfollow(&self, follower: &str, target: &str) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        let removed = state
            .following
            .get_mut(follower)
            .and_then(|m| m.remove(target))
            .is_some();
        if let Some(m) = state.followers.get_mut(target) {
            m.remove(follower);
        }
        if removed {
            let now = Utc::now();
            if let Some(u) = state.users.get_mut(follower) {
                u.following_count = (u.following_count - 1).max(0);
                u.updated_at = now;
            }
            if let Some(u) = state.users.get_mut(target) {
                u.followers_count = (u.followers_count - 1).max(0);
                u.updated_at = now;
            }
        }
        Ok(removed)
    }

    async fn is_following(&self, follower: &str, target: &str) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .following
            .get(follower)
            .is_some_and(|m| m.contains_key(target)))
    }

    async fn list_following(&self, uid: &str, limit: usize) -> Result<Vec<FollowEdge>> {
        let state = self.inner.lock().unwrap();
        Ok(newest_edges(state.following.get(uid), limit))
    }

    async fn list_followers(&self, uid: &str, limit: usize) -> Result<Vec<FollowEdge>> {
        let state = self.inner.lock().unwrap();
        Ok(newest_edges(state.followers.get(uid), limit))
    }

    async fn count_following(&self, uid: &str) -> Result<i64> {
        let state = self.inner.lock().unwrap();
        Ok(state.following.get(uid).map_or(0, |m| m.len() as i64))
    }

    async fn count_followers(&self, uid: &str) -> Result<i64> {
        let state = self.inner.lock().unwrap();
        Ok(state.followers.get(uid).map_or(0, |m| m.len() as i64))
    }

    // --- Curated lists ---

    async fn insert_list(&self, list: &CuratedList) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let key = list_key(&list.user_id, &list.id);
        if state.lists.contains_key(&key) {
            return Err(CinesorteError::conflict("Registro já existe."));
        }
        state.lists.insert(key, list.clone());
        Ok(())
    }

    async fn get_list(&self, uid: &str, list_id: &str) -> Result<Option<CuratedList>> {
        let state = self.inner.lock().unwrap();
        Ok(state.lists.get(&list_key(uid, list_id)).cloned())
    }

    async fn list_lists(&self, uid: &str, public_only: bool) -> Result<Vec<CuratedList>> {
        let state = self.inner.lock().unwrap();
        let mut found: Vec<CuratedList> = state
            .lists
            .values()
            .filter(|l| l.user_id == uid && (l.is_public || !public_only))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_list_details(
        &self,
        uid: &str,
        list_id: &str,
        details: &ListDetails,
    ) -> Result<CuratedList> {
        let mut state = self.inner.lock().unwrap();
        let list = state
            .lists
            .get_mut(&list_key(uid, list_id))
            .ok_or_else(list_missing)?;
        list.name = details.name.clone();
        list.description = details.description.clone();
        list.is_public = details.is_public;
        list.updated_at = details.updated_at;
        Ok(list.clone())
    }

    async fn clone_list(&self, owner: &str, source_id: &str, copy: &CuratedList) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let copy_key = list_key(&copy.user_id, &copy.id);
        if state.lists.contains_key(&copy_key) {
            return Err(CinesorteError::conflict("Registro já existe."));
        }
        let source = state
            .lists
            .get_mut(&list_key(owner, source_id))
            .ok_or_else(list_missing)?;
        source.saves_count += 1;
        state.lists.insert(copy_key, copy.clone());
        Ok(())
    }

    async fn add_list_item(&self, uid: &str, list_id: &str, item: &ListItem) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        let list = state
            .lists
            .get_mut(&list_key(uid, list_id))
            .ok_or_else(list_missing)?;
        if list.contains(&item.id) {
            return Ok(false);
        }
        list.items.push(item.clone());
        list.updated_at = item.added_at;
        Ok(true)
    }

    async fn remove_list_item(
        &self,
        uid: &str,
        list_id: &str,
        media_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        let list = state
            .lists
            .get_mut(&list_key(uid, list_id))
            .ok_or_else(list_missing)?;
        let before = list.items.len();
        list.items.retain(|i| i.id != media_id);
        list.updated_at = now;
        Ok(list.items.len() < before)
    }

    async fn delete_list(&self, uid: &str, list_id: &str) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        Ok(state.lists.remove(&list_key(uid, list_id)).is_some())
    }

    async fn insert_list_share(&self, share: &ListShare) -> Result<()> {
        self.inner.lock().unwrap().list_shares.push(share.clone());
        Ok(())
    }

    async fn list_shares(&self, limit: usize) -> Result<Vec<ListShare>> {
        let state = self.inner.lock().unwrap();
        let mut found = state.list_shares.clone();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    // --- Notifications ---

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_notifications {
            return Err(CinesorteError::Database("notifications unavailable".into()));
        }
        state.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(&self, recipient: &str, limit: usize) -> Result<Vec<Notification>> {
        let mut found = self.notifications_for(recipient);
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn count_unread(&self, recipient: &str) -> Result<i64> {
        let state = self.inner.lock().unwrap();
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient && !n.read)
            .count() as i64)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient: &str) -> Result<bool> {
        let mut state = self.inner.lock().unwrap();
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient && !n.read)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
