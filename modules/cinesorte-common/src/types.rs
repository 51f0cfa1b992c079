use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version of the terms of use a new account accepts at registration.
pub const TERMS_VERSION: &str = "1.0";

/// Title stored when a client does not send one.
pub const UNKNOWN_MEDIA_TITLE: &str = "Título Desconhecido";

/// Title every account starts with (zero reviews).
pub const DEFAULT_LEVEL_TITLE: &str = "Espectador";

// --- Media ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Person,
    Episode,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
            MediaType::Person => "person",
            MediaType::Episode => "episode",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(MediaType::Movie),
            "tv" => Some(MediaType::Tv),
            "person" => Some(MediaType::Person),
            "episode" => Some(MediaType::Episode),
            _ => None,
        }
    }

    /// Only movies and shows carry a genre list in the catalog.
    pub fn has_genres(&self) -> bool {
        matches!(self, MediaType::Movie | MediaType::Tv)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip the `movie-` / `tv-` prefix some clients put on catalog ids.
pub fn bare_media_id(media_id: &str) -> &str {
    media_id
        .strip_prefix("movie-")
        .or_else(|| media_id.strip_prefix("tv-"))
        .unwrap_or(media_id)
}

// --- Users ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// An earned achievement. Never mutated or removed once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trophy {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub awarded_at: DateTime<Utc>,
}

/// The user aggregate: identity fields plus every counter the engine maintains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub bio: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "backgroundURL")]
    pub background_url: Option<String>,

    /// Experience inside the current level, always below the level's requirement.
    pub xp: i64,
    /// Lifetime experience. Never decreases.
    pub total_xp: i64,
    pub level: i32,
    pub level_title: String,

    pub reviews_count: i64,
    pub watched_count: i64,
    pub followers_count: i64,
    pub following_count: i64,

    /// Genre id to signed affinity weight.
    pub genre_counts: BTreeMap<i64, i64>,
    pub trophies: Vec<Trophy>,

    pub terms_version: Option<String>,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub last_username_change: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A freshly registered account: level 1, every counter at zero, current terms accepted.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            username: username.into().to_lowercase(),
            email: email.into(),
            role: Role::User,
            bio: None,
            photo_url: None,
            background_url: None,
            xp: 0,
            total_xp: 0,
            level: 1,
            level_title: DEFAULT_LEVEL_TITLE.to_string(),
            reviews_count: 0,
            watched_count: 0,
            followers_count: 0,
            following_count: 0,
            genre_counts: BTreeMap::new(),
            trophies: Vec::new(),
            terms_version: Some(TERMS_VERSION.to_string()),
            terms_accepted_at: Some(now),
            last_username_change: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_trophy(&self, id: &str) -> bool {
        self.trophies.iter().any(|t| t.id == id)
    }

    /// Array-union: append trophies whose id is not already present.
    /// Returns how many were actually added.
    pub fn merge_trophies(&mut self, earned: &[Trophy]) -> usize {
        let mut added = 0;
        for trophy in earned {
            if !self.has_trophy(&trophy.id) {
                self.trophies.push(trophy.clone());
                added += 1;
            }
        }
        added
    }

    /// The genre with the highest positive weight, if any.
    pub fn top_genre(&self) -> Option<i64> {
        self.genre_counts
            .iter()
            .filter(|(_, weight)| **weight > 0)
            .max_by_key(|(_, weight)| **weight)
            .map(|(genre, _)| *genre)
    }

    pub fn to_public(&self) -> PublicProfile {
        PublicProfile::from(self.clone())
    }
}

/// A profile as other users see it. No email, no terms bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub bio: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(rename = "backgroundURL")]
    pub background_url: Option<String>,
    pub xp: i64,
    pub total_xp: i64,
    pub level: i32,
    pub level_title: String,
    pub reviews_count: i64,
    pub watched_count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub genre_counts: BTreeMap<i64, i64>,
    pub trophies: Vec<Trophy>,
    pub created_at: DateTime<Utc>,
}

impl From<UserProfile> for PublicProfile {
    fn from(u: UserProfile) -> Self {
        Self {
            id: u.id,
            name: u.name,
            username: u.username,
            role: u.role,
            bio: u.bio,
            photo_url: u.photo_url,
            background_url: u.background_url,
            xp: u.xp,
            total_xp: u.total_xp,
            level: u.level,
            level_title: u.level_title,
            reviews_count: u.reviews_count,
            watched_count: u.watched_count,
            followers_count: u.followers_count,
            following_count: u.following_count,
            genre_counts: u.genre_counts,
            trophies: u.trophies,
            created_at: u.created_at,
        }
    }
}

/// Audit entry written for every accepted profile change set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAudit {
    pub id: Uuid,
    pub user_id: String,
    /// Field name to `{ "from": old, "to": new }`.
    pub changes: serde_json::Value,
    pub user_agent: Option<String>,
    pub changed_at: DateTime<Utc>,
}

// --- Interactions ---

/// Per (user, media) state. Each boolean is its own two-state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub user_id: String,
    pub media_id: String,
    pub media_type: Option<MediaType>,
    pub media_title: String,
    pub poster_path: Option<String>,
    pub liked: bool,
    pub disliked: bool,
    pub watched: bool,
    pub favorite: bool,
    /// Present iff `watched`.
    pub watched_at: Option<DateTime<Utc>>,
    pub last_interaction: DateTime<Utc>,
}

impl Interaction {
    pub fn new(user_id: impl Into<String>, media_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            media_id: media_id.into(),
            media_type: None,
            media_title: UNKNOWN_MEDIA_TITLE.to_string(),
            poster_path: None,
            liked: false,
            disliked: false,
            watched: false,
            favorite: false,
            watched_at: None,
            last_interaction: now,
        }
    }
}

// --- Reviews and comments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: String,
    pub media_id: String,
    pub media_type: MediaType,
    pub media_title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub rating: f64,
    pub text: String,
    /// Maintained only by the like flow.
    pub likes_count: i64,
    /// Maintained only by the comment flow.
    pub comments_count: i64,
    // Author display fields, frozen at creation.
    pub username: String,
    pub user_photo: Option<String>,
    pub level_title: String,
    pub is_elite_review: bool,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a review's text and rating taken before an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRevision {
    pub id: Uuid,
    pub review_id: Uuid,
    pub previous_text: String,
    pub previous_rating: f64,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub review_id: Uuid,
    pub user_id: String,
    pub username: String,
    pub user_photo: Option<String>,
    pub level_title: String,
    pub text: String,
    pub parent_id: Option<Uuid>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRevision {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub review_id: Uuid,
    pub previous_text: String,
    pub edited_at: DateTime<Utc>,
}

// --- Follow graph ---

/// One directed edge as seen from one endpoint: the other user and when the edge was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub user_id: String,
    pub since: DateTime<Utc>,
}

// --- Notifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LevelUp,
    NewContent,
    NewFollower,
    TrophyUnlocked,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LevelUp => "level_up",
            NotificationKind::NewContent => "new_content",
            NotificationKind::NewFollower => "new_follower",
            NotificationKind::TrophyUnlocked => "trophy_unlocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "level_up" => Some(NotificationKind::LevelUp),
            "new_content" => Some(NotificationKind::NewContent),
            "new_follower" => Some(NotificationKind::NewFollower),
            "trophy_unlocked" => Some(NotificationKind::TrophyUnlocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSender {
    pub id: String,
    pub name: String,
    pub photo: Option<String>,
}

impl NotificationSender {
    pub fn from_user(user: &UserProfile) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            photo: user.photo_url.clone(),
        }
    }
}

/// Write-once record. Only `read` ever changes, and only from false to true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    pub sender: Option<NotificationSender>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub icon: String,
    pub media_id: Option<String>,
    pub media_type: Option<MediaType>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        icon: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: recipient_id.into(),
            sender: None,
            kind,
            title: title.into(),
            message: message.into(),
            icon: icon.into(),
            media_id: None,
            media_type: None,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_sender(mut self, sender: NotificationSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_media(mut self, media_id: impl Into<String>, media_type: MediaType) -> Self {
        self.media_id = Some(media_id.into());
        self.media_type = Some(media_type);
        self
    }
}

// --- Curated lists ---

/// A title saved into a list. Field names follow the catalog's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: String,
    pub title: String,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub media_type: MediaType,
    pub vote_average: f64,
    #[serde(rename = "addedAt")]
    pub added_at: DateTime<Utc>,
}

/// Where a cloned list came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrigin {
    pub list_id: String,
    /// Owner's username at clone time.
    pub owner: String,
    pub original_name: String,
}

/// A user's curated collection of titles. Ids are unique per owner only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratedList {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    /// No two items share an id.
    pub items: Vec<ListItem>,
    pub is_public: bool,
    /// Times other users cloned this list. Moves only with a clone.
    pub saves_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloned_from: Option<ListOrigin>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CuratedList {
    pub fn contains(&self, media_id: &str) -> bool {
        self.items.iter().any(|i| i.id == media_id)
    }
}

/// A post announcing a public list on the collections feed. Author display
/// fields are frozen at share time; the list itself is read live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListShare {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    pub user_photo: Option<String>,
    pub level_title: String,
    pub list_id: String,
    pub list_name: String,
    pub content: String,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}
