// Profile edits, terms acceptance and public profile reads.
//
// Every accepted change set is written together with an audit entry listing
// each changed field as { from, to }.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use cinesorte_common::{
    contains_profanity_opt, CinesorteError, ProfileAudit, PublicProfile, Result, UserProfile,
};
use cinesorte_store::ProfileCommit;

use crate::validation::{self, IMPROPER_CONTENT};
use crate::Cinesorte;

pub const USERNAME_COOLDOWN_DAYS: i64 = 30;

const UNKNOWN_AGENT: &str = "unknown";

/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub background_url: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<()> {
        if contains_profanity_opt(self.bio.as_deref())
            || contains_profanity_opt(self.username.as_deref())
        {
            return Err(CinesorteError::validation(IMPROPER_CONTENT));
        }
        if let Some(bio) = &self.bio {
            validation::validate_bio(bio)?;
        }
        if let Some(username) = &self.username {
            validation::validate_handle(username)?;
        }
        Ok(())
    }
}

/// Whole days left before the username may change again, if any.
pub fn cooldown_days_left(last_change: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    let elapsed = now - last_change?;
    let window = Duration::days(USERNAME_COOLDOWN_DAYS);
    if elapsed >= window {
        return None;
    }
    let left = (window - elapsed).num_seconds();
    Some((left + 86_399) / 86_400)
}

fn record(changes: &mut Map<String, Value>, field: &str, from: Option<&str>, to: &str) {
    changes.insert(field.to_string(), json!({ "from": from, "to": to }));
}

/// Apply `update` to `user`. Returns no audit entry when nothing was requested.
pub fn apply_update(
    user: &UserProfile,
    update: &ProfileUpdate,
    user_agent: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ProfileCommit> {
    let mut next = user.clone();
    let mut changes = Map::new();

    if let Some(username) = update.username.as_deref().filter(|u| *u != user.username) {
        if let Some(days) = cooldown_days_left(user.last_username_change, now) {
            return Err(CinesorteError::validation(format!("WAIT_{days}_DAYS")));
        }
        record(&mut changes, "username", Some(&user.username), username);
        next.username = username.to_string();
        next.last_username_change = Some(now);
    }
    if let Some(bio) = &update.bio {
        record(&mut changes, "bio", user.bio.as_deref(), bio);
        next.bio = Some(bio.clone());
    }
    if let Some(photo) = &update.photo_url {
        record(&mut changes, "photoURL", user.photo_url.as_deref(), photo);
        next.photo_url = Some(photo.clone());
    }
    if let Some(background) = &update.background_url {
        record(&mut changes, "backgroundURL", user.background_url.as_deref(), background);
        next.background_url = Some(background.clone());
    }

    if changes.is_empty() {
        return Ok(ProfileCommit {
            user: user.clone(),
            audit: None,
        });
    }
    next.updated_at = now;
    let audit = ProfileAudit {
        id: Uuid::new_v4(),
        user_id: user.id.clone(),
        changes: Value::Object(changes),
        user_agent: Some(user_agent.unwrap_or(UNKNOWN_AGENT).to_string()),
        changed_at: now,
    };
    Ok(ProfileCommit {
        user: next,
        audit: Some(audit),
    })
}

impl Cinesorte {
    pub async fn update_profile(
        &self,
        uid: &str,
        update: ProfileUpdate,
        user_agent: Option<&str>,
    ) -> Result<UserProfile> {
        update.validate()?;

        if let Some(username) = &update.username {
            if let Some(holder) = self.store.get_user_by_username(username).await? {
                if holder.id != uid {
                    return Err(CinesorteError::conflict("Username em uso."));
                }
            }
        }

        let now = Utc::now();
        let commit = self
            .store
            .update_profile(uid, &|user: &UserProfile| -> Result<ProfileCommit> {
                apply_update(user, &update, user_agent, now)
            })
            .await
            .map_err(|e| match e {
                CinesorteError::Conflict(_) => CinesorteError::conflict("Username em uso."),
                other => other,
            })?;

        if commit.audit.is_some() {
            info!(uid, "Profile updated");
        }
        Ok(commit.user)
    }

    pub async fn accept_terms(&self, uid: &str, version: &str, user_agent: Option<&str>) -> Result<()> {
        if version.trim().is_empty() {
            return Err(CinesorteError::validation("Versão dos termos inválida."));
        }
        let now = Utc::now();
        self.store
            .update_profile(uid, &|user: &UserProfile| -> Result<ProfileCommit> {
                let mut next = user.clone();
                next.terms_version = Some(version.to_string());
                next.terms_accepted_at = Some(now);
                next.updated_at = now;
                let mut changes = Map::new();
                record(&mut changes, "termsVersion", user.terms_version.as_deref(), version);
                Ok(ProfileCommit {
                    user: next,
                    audit: Some(ProfileAudit {
                        id: Uuid::new_v4(),
                        user_id: user.id.clone(),
                        changes: Value::Object(changes),
                        user_agent: Some(user_agent.unwrap_or(UNKNOWN_AGENT).to_string()),
                        changed_at: now,
                    }),
                })
            })
            .await?;
        info!(uid, version, "Terms accepted");
        Ok(())
    }

    pub async fn public_profile(&self, username: &str) -> Result<PublicProfile> {
        self.store
            .get_user_by_username(&username.to_lowercase())
            .await?
            .map(PublicProfile::from)
            .ok_or_else(|| CinesorteError::not_found("Não encontrado."))
    }

    /// Audit trail of the caller's own profile, newest first.
    pub async fn profile_history(&self, uid: &str) -> Result<Vec<ProfileAudit>> {
        self.store.profile_history(uid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserProfile {
        UserProfile::new("ana", "Ana", "ana", "a@b.c", Utc::now())
    }

    #[test]
    fn cooldown_rounds_up_partial_days() {
        let now = Utc::now();
        assert_eq!(cooldown_days_left(None, now), None);
        assert_eq!(cooldown_days_left(Some(now - Duration::days(31)), now), None);
        assert_eq!(cooldown_days_left(Some(now - Duration::days(30)), now), None);
        assert_eq!(
            cooldown_days_left(Some(now - Duration::days(10) - Duration::hours(1)), now),
            Some(20)
        );
        assert_eq!(cooldown_days_left(Some(now), now), Some(30));
    }

    #[test]
    fn username_change_inside_window_is_refused() {
        let now = Utc::now();
        let mut u = user();
        u.last_username_change = Some(now - Duration::days(5));
        let update = ProfileUpdate {
            username: Some("ana_nova".into()),
            ..Default::default()
        };
        let err = apply_update(&u, &update, None, now).unwrap_err();
        assert_eq!(err.to_string(), "WAIT_25_DAYS");
    }

    #[test]
    fn same_username_is_not_a_change() {
        let update = ProfileUpdate {
            username: Some("ana".into()),
            ..Default::default()
        };
        let commit = apply_update(&user(), &update, None, Utc::now()).unwrap();
        assert!(commit.audit.is_none());
    }

    #[test]
    fn audit_lists_each_field_from_to() {
        let now = Utc::now();
        let update = ProfileUpdate {
            username: Some("ana_b".into()),
            bio: Some("Amo cinema".into()),
            ..Default::default()
        };
        let commit = apply_update(&user(), &update, Some("Mozilla/5.0"), now).unwrap();
        let audit = commit.audit.unwrap();
        assert_eq!(audit.changes["username"], json!({ "from": "ana", "to": "ana_b" }));
        assert_eq!(audit.changes["bio"], json!({ "from": null, "to": "Amo cinema" }));
        assert!(audit.changes.get("photoURL").is_none());
        assert_eq!(audit.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(commit.user.last_username_change, Some(now));
    }

    #[test]
    fn missing_agent_is_recorded_as_unknown() {
        let update = ProfileUpdate {
            bio: Some("oi".into()),
            ..Default::default()
        };
        let commit = apply_update(&user(), &update, None, Utc::now()).unwrap();
        assert_eq!(commit.audit.unwrap().user_agent.as_deref(), Some("unknown"));
    }

    #[test]
    fn profane_bio_is_rejected() {
        let update = ProfileUpdate {
            bio: Some("que filme idiota".into()),
            ..Default::default()
        };
        assert_eq!(update.validate().unwrap_err().to_string(), IMPROPER_CONTENT);
    }
}
