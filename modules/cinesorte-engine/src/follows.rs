// Follow graph. Both directed edges and both counters change in one store call;
// notifications go out after the commit.

use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use cinesorte_common::{CinesorteError, FollowEdge, PublicProfile, Result, Trophy, UserProfile};
use cinesorte_store::FollowCommit;

use crate::notifications;
use crate::trophies::{self, Criterion};
use crate::Cinesorte;

pub const FOLLOW_LIST_LIMIT: usize = 50;

impl Cinesorte {
    pub async fn follow(&self, uid: &str, target: &str) -> Result<FollowCommit> {
        if uid == target {
            return Err(CinesorteError::validation("Você não pode seguir a si mesmo."));
        }

        let now = Utc::now();
        let commit = self
            .store
            .follow(uid, target, now, &|target: &UserProfile| -> Vec<Trophy> {
                trophies::evaluate(
                    target,
                    &[(Criterion::Followers, target.followers_count)],
                    now,
                )
            })
            .await?;

        info!(
            follower = uid,
            target,
            followers = commit.target.followers_count,
            "Follow recorded"
        );

        self.notify(notifications::new_follower(target, &commit.follower))
            .await;
        for trophy in &commit.new_trophies {
            self.notify(notifications::trophy_unlocked(target, trophy))
                .await;
        }
        Ok(commit)
    }

    /// Returns whether an edge was removed. Unfollowing someone not followed is a no-op.
    pub async fn unfollow(&self, uid: &str, target: &str) -> Result<bool> {
        let removed = self.store.unfollow(uid, target).await?;
        if removed {
            info!(follower = uid, target, "Unfollow recorded");
        }
        Ok(removed)
    }

    pub async fn is_following(&self, uid: &str, target: &str) -> Result<bool> {
        self.store.is_following(uid, target).await
    }

    pub async fn followers(&self, uid: &str) -> Result<Vec<PublicProfile>> {
        let edges = self.store.list_followers(uid, FOLLOW_LIST_LIMIT).await?;
        self.profiles_for(&edges).await
    }

    pub async fn following(&self, uid: &str) -> Result<Vec<PublicProfile>> {
        let edges = self.store.list_following(uid, FOLLOW_LIST_LIMIT).await?;
        self.profiles_for(&edges).await
    }

    /// Profiles at the other end of `edges`, in edge order. Dangling edges are skipped.
    async fn profiles_for(&self, edges: &[FollowEdge]) -> Result<Vec<PublicProfile>> {
        if edges.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = edges.iter().map(|e| e.user_id.clone()).collect();
        let mut by_id: HashMap<String, UserProfile> = self
            .store
            .get_users(&ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(PublicProfile::from)
            .collect())
    }
}
