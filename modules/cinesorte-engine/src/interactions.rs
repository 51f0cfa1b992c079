//! Per (user, media) toggles.
//!
//! `liked`, `disliked`, `watched` and `favorite` are independent two-state
//! machines. Each call flips exactly one of them. Experience and the watched
//! counter only move on the engage edge of `liked`/`watched`, so repeated
//! toggles cannot farm XP.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use cinesorte_common::{CinesorteError, Interaction, MediaType, Result, UserProfile};
use cinesorte_store::{Effects, InteractionCommit};

use crate::affinity::{LIKE_WEIGHT, WATCHED_WEIGHT};
use crate::notifications;
use crate::progression::XpCurve;
use crate::trophies::{self, Criterion};
use crate::Cinesorte;

pub const LIKE_XP: i64 = 5;
pub const WATCHED_XP: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    Like,
    Dislike,
    Watched,
    Favorite,
}

impl InteractionAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            "watched" => Some(Self::Watched),
            "favorite" => Some(Self::Favorite),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Watched => "watched",
            Self::Favorite => "favorite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordInteraction {
    pub media_id: String,
    pub media_type: Option<MediaType>,
    pub action: InteractionAction,
    pub media_title: Option<String>,
    pub poster_path: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Compute the documents a toggle writes, from the documents as currently stored.
pub fn transition(
    curve: &XpCurve,
    user: &UserProfile,
    previous: Option<&Interaction>,
    request: &RecordInteraction,
    now: DateTime<Utc>,
) -> InteractionCommit {
    let mut record = previous
        .cloned()
        .unwrap_or_else(|| Interaction::new(&user.id, &request.media_id, now));
    if request.media_type.is_some() {
        record.media_type = request.media_type;
    }
    if let Some(title) = non_empty(&request.media_title) {
        record.media_title = title;
    }
    if let Some(poster) = non_empty(&request.poster_path) {
        record.poster_path = Some(poster);
    }

    let mut next = user.clone();
    let mut earned = 0;
    let mut genre_weight = 0;

    match request.action {
        InteractionAction::Like => {
            record.liked = !record.liked;
            // Either edge of a like leaves the title not disliked.
            record.disliked = false;
            if record.liked {
                earned = LIKE_XP;
                genre_weight = LIKE_WEIGHT;
            } else {
                genre_weight = -LIKE_WEIGHT;
            }
        }
        InteractionAction::Watched => {
            record.watched = !record.watched;
            if record.watched {
                record.watched_at = Some(now);
                earned = WATCHED_XP;
                genre_weight = WATCHED_WEIGHT;
                next.watched_count += 1;
            } else {
                record.watched_at = None;
                next.watched_count = (next.watched_count - 1).max(0);
            }
        }
        InteractionAction::Dislike => record.disliked = !record.disliked,
        InteractionAction::Favorite => record.favorite = !record.favorite,
    }
    record.last_interaction = now;

    let leveled_up_to = curve.award_user(&mut next, earned);
    let checks = [
        (Criterion::TotalXp, next.total_xp),
        (Criterion::Watched, next.watched_count),
    ];
    let new_trophies = trophies::unlock(&mut next, &checks, now);
    if next != *user {
        next.updated_at = now;
    }

    InteractionCommit {
        user: next,
        interaction: record,
        genre_weight,
        effects: Effects {
            leveled_up_to,
            new_trophies,
        },
    }
}

impl Cinesorte {
    pub async fn record_interaction(
        &self,
        uid: &str,
        request: RecordInteraction,
    ) -> Result<Interaction> {
        if request.media_id.trim().is_empty() {
            return Err(CinesorteError::validation("Dados inválidos."));
        }

        let now = Utc::now();
        let curve = self.curve;
        let commit = self
            .store
            .update_interaction(
                uid,
                &request.media_id,
                &|user: &UserProfile, previous: Option<&Interaction>| -> Result<InteractionCommit> {
                    Ok(transition(&curve, user, previous, &request, now))
                },
            )
            .await?;

        info!(
            uid,
            media_id = %request.media_id,
            action = request.action.as_str(),
            xp = commit.user.total_xp,
            "Interaction recorded"
        );

        self.apply_genre_weight(
            uid,
            commit.interaction.media_type,
            &request.media_id,
            commit.genre_weight,
        )
        .await;

        if let Some(level) = commit.effects.leveled_up_to {
            self.notify(notifications::level_up(uid, level, &commit.user.level_title))
                .await;
        }

        Ok(commit.interaction)
    }

    pub async fn interactions(&self, uid: &str) -> Result<Vec<Interaction>> {
        self.store.list_interactions(uid).await
    }

    /// Watched titles of one calendar year (UTC), keyed by zero-based month, newest first.
    pub async fn watch_diary(&self, uid: &str, year: i32) -> Result<BTreeMap<u32, Vec<Interaction>>> {
        let start_of = |y: i32| Utc.with_ymd_and_hms(y, 1, 1, 0, 0, 0).single();
        let next_year = year
            .checked_add(1)
            .ok_or_else(|| CinesorteError::validation("Ano inválido."))?;
        let (Some(from), Some(to)) = (start_of(year), start_of(next_year)) else {
            return Err(CinesorteError::validation("Ano inválido."));
        };

        let mut diary: BTreeMap<u32, Vec<Interaction>> = BTreeMap::new();
        for record in self.store.list_watched_between(uid, from, to).await? {
            if let Some(at) = record.watched_at {
                diary.entry(at.month0()).or_default().push(record);
            }
        }
        Ok(diary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile::new("ana", "Ana", "ana", "ana@example.com", Utc::now())
    }

    fn request(action: InteractionAction) -> RecordInteraction {
        RecordInteraction {
            media_id: "603".into(),
            media_type: Some(MediaType::Movie),
            action,
            media_title: Some("Matrix".into()),
            poster_path: None,
        }
    }

    /// Apply `n` toggles, feeding each commit into the next read.
    fn run(action: InteractionAction, n: usize) -> (UserProfile, Option<Interaction>, Vec<i64>) {
        let curve = XpCurve::default();
        let mut u = user();
        let mut record: Option<Interaction> = None;
        let mut weights = Vec::new();
        for _ in 0..n {
            let commit = transition(&curve, &u, record.as_ref(), &request(action), Utc::now());
            weights.push(commit.genre_weight);
            u = commit.user;
            record = Some(commit.interaction);
        }
        (u, record, weights)
    }

    #[test]
    fn parses_known_actions_only() {
        assert_eq!(InteractionAction::parse("watched"), Some(InteractionAction::Watched));
        assert_eq!(InteractionAction::parse("rewatch"), None);
        assert_eq!(InteractionAction::parse("Like"), None);
    }

    #[test]
    fn watched_effects_fire_on_engage_edges_only() {
        for n in 1..=7 {
            let (u, record, _) = run(InteractionAction::Watched, n);
            let engages = n.div_ceil(2) as i64;
            assert_eq!(u.total_xp, engages * WATCHED_XP, "n = {n}");
            assert_eq!(u.watched_count, (n % 2) as i64, "n = {n}");
            let record = record.unwrap();
            assert_eq!(record.watched, n % 2 == 1);
            assert_eq!(record.watched_at.is_some(), record.watched);
        }
    }

    #[test]
    fn like_weights_are_signed() {
        let (u, record, weights) = run(InteractionAction::Like, 3);
        assert_eq!(weights, vec![3, -3, 3]);
        assert_eq!(u.total_xp, 2 * LIKE_XP);
        assert!(record.unwrap().liked);
    }

    #[test]
    fn unwatch_has_no_weight_and_no_xp() {
        let (u, _, weights) = run(InteractionAction::Watched, 2);
        assert_eq!(weights, vec![1, 0]);
        assert_eq!(u.total_xp, WATCHED_XP);
    }

    #[test]
    fn dislike_and_favorite_flip_only_their_flag() {
        let (u, record, weights) = run(InteractionAction::Dislike, 1);
        let record = record.unwrap();
        assert!(record.disliked);
        assert!(!record.liked && !record.watched && !record.favorite);
        assert_eq!(weights, vec![0]);
        assert_eq!(u.total_xp, 0);

        let (_, record, _) = run(InteractionAction::Favorite, 1);
        assert!(record.unwrap().favorite);
    }

    #[test]
    fn like_clears_an_earlier_dislike() {
        let curve = XpCurve::default();
        let u = user();
        let disliked = transition(&curve, &u, None, &request(InteractionAction::Dislike), Utc::now());
        assert!(disliked.interaction.disliked);

        let liked = transition(
            &curve,
            &disliked.user,
            Some(&disliked.interaction),
            &request(InteractionAction::Like),
            Utc::now(),
        );
        assert!(liked.interaction.liked);
        assert!(!liked.interaction.disliked);
        assert_eq!(liked.user.total_xp, LIKE_XP);
    }

    #[test]
    fn tenth_watch_unlocks_trophy() {
        let curve = XpCurve::default();
        let mut u = user();
        u.watched_count = 9;
        let commit = transition(&curve, &u, None, &request(InteractionAction::Watched), Utc::now());
        assert_eq!(commit.user.watched_count, 10);
        let ids: Vec<_> = commit.effects.new_trophies.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["wat_10"]);
        assert!(commit.user.has_trophy("wat_10"));
    }

    #[test]
    fn level_up_is_reported() {
        let curve = XpCurve::default();
        let mut u = user();
        u.xp = 95;
        u.total_xp = 95;
        let commit = transition(&curve, &u, None, &request(InteractionAction::Like), Utc::now());
        assert_eq!(commit.effects.leveled_up_to, Some(2));
        assert_eq!(commit.user.xp, 0);
    }

    #[test]
    fn blank_title_keeps_stored_title() {
        let curve = XpCurve::default();
        let u = user();
        let first = transition(&curve, &u, None, &request(InteractionAction::Like), Utc::now());
        let mut again = request(InteractionAction::Like);
        again.media_title = Some("  ".into());
        let second = transition(&curve, &first.user, Some(&first.interaction), &again, Utc::now());
        assert_eq!(second.interaction.media_title, "Matrix");
    }
}
