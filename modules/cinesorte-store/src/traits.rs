// Storage contract for the social graph.
//
// Every multi-document mutation is exactly one method. Methods that need
// derived computation take a pure closure: the store reads the documents
// under lock, hands them to the closure, and writes back whatever the
// closure returns, all in one transaction. Closures may run more than once
// when the transaction is retried, so they must not have side effects.
//
// Two implementations: PgStore (production) and MemoryStore (tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use cinesorte_common::{
    Comment, CommentRevision, CuratedList, FollowEdge, Interaction, ListItem, ListShare,
    Notification, ProfileAudit, Result, Review, ReviewRevision, Trophy, UserProfile,
};

// ---------------------------------------------------------------------------
// Commit payloads
// ---------------------------------------------------------------------------

/// Bookkeeping computed alongside new documents. The store passes it through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    /// Set to the new level when the transition crossed a level boundary.
    pub leveled_up_to: Option<i32>,
    pub new_trophies: Vec<Trophy>,
}

#[derive(Debug, Clone)]
pub struct InteractionCommit {
    pub user: UserProfile,
    pub interaction: Interaction,
    /// Signed genre weight to apply after commit. Zero means none.
    pub genre_weight: i64,
    pub effects: Effects,
}

#[derive(Debug, Clone)]
pub struct ReviewCommit {
    pub user: UserProfile,
    pub review: Review,
    pub effects: Effects,
}

#[derive(Debug, Clone)]
pub struct ProfileCommit {
    pub user: UserProfile,
    /// `None` when the change set was empty and nothing should be written.
    pub audit: Option<ProfileAudit>,
}

#[derive(Debug, Clone)]
pub struct FollowCommit {
    pub follower: UserProfile,
    pub target: UserProfile,
    pub new_trophies: Vec<Trophy>,
}

/// Result of flipping a like on a review.
#[derive(Debug, Clone)]
pub struct LikeToggle {
    /// True if the like now exists.
    pub liked: bool,
    pub review: Review,
}

// The closures borrow request data, so the aliases carry the borrow's lifetime.
pub type InteractionFn<'a> =
    dyn Fn(&UserProfile, Option<&Interaction>) -> Result<InteractionCommit> + Send + Sync + 'a;

pub type ReviewFn<'a> = dyn Fn(&UserProfile) -> Result<ReviewCommit> + Send + Sync + 'a;

pub type ProfileFn<'a> = dyn Fn(&UserProfile) -> Result<ProfileCommit> + Send + Sync + 'a;

/// Receives the target with its follower count already incremented; returns trophies to union in.
pub type FollowFn<'a> = dyn Fn(&UserProfile) -> Vec<Trophy> + Send + Sync + 'a;

// ---------------------------------------------------------------------------
// Query shapes
// ---------------------------------------------------------------------------

/// Editable fields of a curated list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDetails {
    pub name: String,
    pub description: String,
    pub is_public: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewFilter {
    All,
    ByMedia(String),
    ByUser(String),
    ByUsers(Vec<String>),
}

/// Record families owned by a user, deleted page by page on account removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedCollection {
    Reviews,
    Comments,
    Interactions,
    Notifications,
    Following,
    Followers,
    ProfileHistory,
    Lists,
    ListShares,
}

impl OwnedCollection {
    pub const ALL: [OwnedCollection; 9] = [
        OwnedCollection::Reviews,
        OwnedCollection::Comments,
        OwnedCollection::Interactions,
        OwnedCollection::Notifications,
        OwnedCollection::Following,
        OwnedCollection::Followers,
        OwnedCollection::ProfileHistory,
        OwnedCollection::Lists,
        OwnedCollection::ListShares,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OwnedCollection::Reviews => "reviews",
            OwnedCollection::Comments => "comments",
            OwnedCollection::Interactions => "interactions",
            OwnedCollection::Notifications => "notifications",
            OwnedCollection::Following => "following",
            OwnedCollection::Followers => "followers",
            OwnedCollection::ProfileHistory => "profile_history",
            OwnedCollection::Lists => "lists",
            OwnedCollection::ListShares => "list_shares",
        }
    }
}

// ---------------------------------------------------------------------------
// SocialStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SocialStore: Send + Sync {
    // --- Users ---

    /// Insert a new aggregate. Conflict if the id or username already exists.
    async fn insert_user(&self, user: &UserProfile) -> Result<()>;

    async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserProfile>>;

    /// Aggregates for the given ids, in no particular order. Missing ids are skipped.
    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserProfile>>;

    /// Usernames starting with `prefix`, alphabetical.
    async fn search_users(&self, prefix: &str, limit: usize) -> Result<Vec<UserProfile>>;

    /// Arbitrary page of users, newest accounts first.
    async fn list_users(&self, limit: usize) -> Result<Vec<UserProfile>>;

    /// Read-modify-write of the aggregate plus an optional audit entry.
    async fn update_profile(&self, uid: &str, f: &ProfileFn<'_>) -> Result<ProfileCommit>;

    async fn profile_history(&self, uid: &str) -> Result<Vec<ProfileAudit>>;

    /// Atomic increment of `genre_counts[g]` by `weight` for every listed genre.
    async fn increment_genre_counts(&self, uid: &str, genre_ids: &[i64], weight: i64)
        -> Result<()>;

    /// Remove the aggregate itself. Owned records are removed separately.
    async fn delete_user(&self, uid: &str) -> Result<()>;

    /// Delete up to `limit` records of one family owned by `uid`. Returns how many went.
    /// Dependent counters on other documents are kept consistent.
    async fn delete_owned_page(
        &self,
        collection: OwnedCollection,
        uid: &str,
        limit: usize,
    ) -> Result<usize>;

    // --- Interactions ---

    /// One transaction over the user aggregate and the (user, media) record.
    async fn update_interaction(
        &self,
        uid: &str,
        media_id: &str,
        f: &InteractionFn<'_>,
    ) -> Result<InteractionCommit>;

    async fn get_interaction(&self, uid: &str, media_id: &str) -> Result<Option<Interaction>>;

    /// Most recently touched first.
    async fn list_interactions(&self, uid: &str) -> Result<Vec<Interaction>>;

    /// Watched records with `watched_at` in `[from, to)`, newest first.
    async fn list_watched_between(
        &self,
        uid: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Interaction>>;

    // --- Reviews ---

    /// One transaction over the author aggregate and the new review.
    async fn create_review(&self, uid: &str, f: &ReviewFn<'_>) -> Result<ReviewCommit>;

    async fn get_review(&self, id: Uuid) -> Result<Option<Review>>;

    /// Newest first.
    async fn list_reviews(&self, filter: ReviewFilter, limit: usize) -> Result<Vec<Review>>;

    /// Append the revision and apply the new text and rating together.
    async fn update_review(
        &self,
        id: Uuid,
        text: &str,
        rating: f64,
        revision: &ReviewRevision,
    ) -> Result<Review>;

    /// Remove the review with its likes, comments and every revision.
    async fn delete_review(&self, id: Uuid) -> Result<()>;

    async fn review_history(&self, id: Uuid) -> Result<Vec<ReviewRevision>>;

    /// Flip the like record and `likes_count` together. NotFound if the review is gone.
    async fn toggle_review_like(&self, review_id: Uuid, uid: &str) -> Result<LikeToggle>;

    async fn is_review_liked(&self, review_id: Uuid, uid: &str) -> Result<bool>;

    // --- Comments ---

    /// Insert the comment and bump the parent's `comments_count`. Returns the parent.
    async fn add_comment(&self, comment: &Comment) -> Result<Review>;

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>>;

    /// Oldest first.
    async fn list_comments(&self, review_id: Uuid) -> Result<Vec<Comment>>;

    async fn update_comment(
        &self,
        id: Uuid,
        text: &str,
        revision: &CommentRevision,
    ) -> Result<Comment>;

    /// Remove the comment and its revisions, decrement the parent's count.
    async fn delete_comment(&self, id: Uuid) -> Result<()>;

    async fn comment_history(&self, id: Uuid) -> Result<Vec<CommentRevision>>;

    // --- Follow graph ---

    /// Write both directed edges and both counters in one transaction.
    /// NotFound if either user is missing, Conflict if the edge exists.
    async fn follow(
        &self,
        follower: &str,
        target: &str,
        since: DateTime<Utc>,
        f: &FollowFn<'_>,
    ) -> Result<FollowCommit>;

    /// Remove both edges and decrement both counters, clamped at zero.
    /// Returns false if there was no edge.
    async fn unfollow(&self, follower: &str, target: &str) -> Result<bool>;

    async fn is_following(&self, follower: &str, target: &str) -> Result<bool>;

    /// Users `uid` follows, newest edge first.
    async fn list_following(&self, uid: &str, limit: usize) -> Result<Vec<FollowEdge>>;

    /// Users following `uid`, newest edge first.
    async fn list_followers(&self, uid: &str, limit: usize) -> Result<Vec<FollowEdge>>;

    async fn count_following(&self, uid: &str) -> Result<i64>;

    async fn count_followers(&self, uid: &str) -> Result<i64>;

    // --- Curated lists ---

    /// Conflict if the owner already has a list with this id.
    async fn insert_list(&self, list: &CuratedList) -> Result<()>;

    async fn get_list(&self, uid: &str, list_id: &str) -> Result<Option<CuratedList>>;

    /// Newest first. Private lists are left out when `public_only`.
    async fn list_lists(&self, uid: &str, public_only: bool) -> Result<Vec<CuratedList>>;

    /// Rewrite name, description and visibility. Items and counters are untouched.
    /// NotFound if the list does not exist.
    async fn update_list_details(&self, uid: &str, list_id: &str, details: &ListDetails)
        -> Result<CuratedList>;

    /// Insert `copy` and bump the source's saves count in one transaction.
    /// NotFound if the source is gone.
    async fn clone_list(&self, owner: &str, source_id: &str, copy: &CuratedList) -> Result<()>;

    /// Append `item` unless an item with its id is already there. Returns whether it was added.
    /// NotFound if the list does not exist.
    async fn add_list_item(&self, uid: &str, list_id: &str, item: &ListItem) -> Result<bool>;

    /// Returns whether an item went. NotFound if the list does not exist.
    async fn remove_list_item(
        &self,
        uid: &str,
        list_id: &str,
        media_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Returns false if there was no such list.
    async fn delete_list(&self, uid: &str, list_id: &str) -> Result<bool>;

    async fn insert_list_share(&self, share: &ListShare) -> Result<()>;

    /// Newest first.
    async fn list_shares(&self, limit: usize) -> Result<Vec<ListShare>>;

    // --- Notifications ---

    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Newest first.
    async fn list_notifications(&self, recipient: &str, limit: usize) -> Result<Vec<Notification>>;

    async fn count_unread(&self, recipient: &str) -> Result<i64>;

    /// Set `read` only when `recipient` owns the notification. Returns whether a row changed.
    async fn mark_notification_read(&self, id: Uuid, recipient: &str) -> Result<bool>;
}
