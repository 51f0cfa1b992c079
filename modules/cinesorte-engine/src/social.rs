// Read-side social projections: stats, suggestions, taste match and user search.

use std::collections::HashSet;

use serde::Serialize;

use cinesorte_common::{CinesorteError, PublicProfile, Result, Trophy, UserProfile};

use crate::Cinesorte;

pub const SUGGESTION_SCAN: usize = 30;
pub const SUGGESTION_LIMIT: usize = 5;
pub const SEARCH_MIN_CHARS: usize = 3;
pub const SEARCH_LIMIT: usize = 10;

/// Progression plus follower figures counted from the edge sets themselves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub followers_count: i64,
    pub following_count: i64,
    pub xp: i64,
    pub total_xp: i64,
    pub level: i32,
    pub level_title: String,
    pub trophies: Vec<Trophy>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub username: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl From<UserProfile> for UserSummary {
    fn from(u: UserProfile) -> Self {
        Self {
            name: u.name,
            username: u.username,
            photo_url: u.photo_url,
        }
    }
}

/// Jaccard similarity of two sets as a rounded percentage. Zero if either is empty.
pub fn jaccard_percentage(a: &HashSet<String>, b: &HashSet<String>) -> u32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let common = a.intersection(b).count();
    let union = a.union(b).count();
    ((common as f64 / union as f64) * 100.0).round() as u32
}

/// Rank candidates by their weight in `genre`. Ties keep scan order.
pub fn rank_suggestions(
    genre: Option<i64>,
    candidates: Vec<UserProfile>,
    exclude: &HashSet<String>,
) -> Vec<Suggestion> {
    let mut ranked: Vec<Suggestion> = candidates
        .into_iter()
        .filter(|u| !exclude.contains(&u.id))
        .map(|u| {
            let score = genre
                .and_then(|g| u.genre_counts.get(&g).copied())
                .unwrap_or(0);
            Suggestion {
                profile: PublicProfile::from(u),
                score,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(SUGGESTION_LIMIT);
    ranked
}

impl Cinesorte {
    pub async fn stats(&self, uid: &str) -> Result<UserStats> {
        let user = self
            .store
            .get_user(uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let (followers_count, following_count) = futures::try_join!(
            self.store.count_followers(uid),
            self.store.count_following(uid),
        )?;
        Ok(UserStats {
            followers_count,
            following_count,
            xp: user.xp,
            total_xp: user.total_xp,
            level: user.level,
            level_title: user.level_title,
            trophies: user.trophies,
        })
    }

    /// Accounts the viewer does not follow yet, ranked by affinity in the viewer's top genre.
    pub async fn suggestions(&self, uid: &str) -> Result<Vec<Suggestion>> {
        let viewer = self
            .store
            .get_user(uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado."))?;
        let following = self.store.count_following(uid).await?;

        let mut exclude: HashSet<String> = self
            .store
            .list_following(uid, following.max(0) as usize)
            .await?
            .into_iter()
            .map(|e| e.user_id)
            .collect();
        exclude.insert(uid.to_string());

        let candidates = self.store.list_users(SUGGESTION_SCAN).await?;
        Ok(rank_suggestions(viewer.top_genre(), candidates, &exclude))
    }

    /// Overlap between two users' liked media, 0 to 100.
    pub async fn match_percentage(&self, uid: &str, other: &str) -> Result<u32> {
        let (mine, theirs) = futures::try_join!(
            self.store.list_interactions(uid),
            self.store.list_interactions(other),
        )?;
        let liked = |records: Vec<cinesorte_common::Interaction>| -> HashSet<String> {
            records
                .into_iter()
                .filter(|i| i.liked)
                .map(|i| i.media_id)
                .collect()
        };
        Ok(jaccard_percentage(&liked(mine), &liked(theirs)))
    }

    /// Username prefix search. Short queries return nothing.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < SEARCH_MIN_CHARS {
            return Ok(Vec::new());
        }
        let found = self.store.search_users(&query, SEARCH_LIMIT).await?;
        Ok(found.into_iter().map(UserSummary::from).collect())
    }
}
