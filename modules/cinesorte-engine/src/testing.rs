// Test doubles for the engine's outer seams.
//
// - MockCatalog (MediaCatalog): fixed genre ids per media id
// - MockIdentity (IdentityProvider): in-memory accounts keyed by email
// - RecordingAlerts (AlertSink): keeps every message
//
// Plus `Harness`, which wires them over a MemoryStore.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use cinesorte_common::{MediaType, UserProfile};
use cinesorte_store::{MemoryStore, SocialStore};
use identity_client::IdentityError;
use tmdb_client::Genre;

use crate::accounts::{CreatedAccount, IdentityProvider, SignedInAccount};
use crate::affinity::MediaCatalog;
use crate::alerts::AlertSink;
use crate::Cinesorte;

// ---------------------------------------------------------------------------
// MockCatalog
// ---------------------------------------------------------------------------

/// Unregistered media resolve to no genres. `failing()` errors on every call.
#[derive(Default)]
pub struct MockCatalog {
    genres: HashMap<String, Vec<i64>>,
    fail: bool,
    lookups: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_genres(mut self, media_id: &str, genre_ids: &[i64]) -> Self {
        self.genres.insert(media_id.to_string(), genre_ids.to_vec());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Media ids looked up so far, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaCatalog for MockCatalog {
    async fn genre_ids(&self, _media_type: MediaType, media_id: &str) -> Result<Vec<i64>> {
        self.lookups.lock().unwrap().push(media_id.to_string());
        if self.fail {
            return Err(anyhow!("MockCatalog: catalog unavailable"));
        }
        Ok(self.genres.get(media_id).cloned().unwrap_or_default())
    }

    async fn genres(&self, _media_type: MediaType) -> Result<Vec<Genre>> {
        if self.fail {
            return Err(anyhow!("MockCatalog: catalog unavailable"));
        }
        Ok(vec![
            Genre {
                id: 28,
                name: "Ação".into(),
            },
            Genre {
                id: 18,
                name: "Drama".into(),
            },
        ])
    }
}

// ---------------------------------------------------------------------------
// MockIdentity
// ---------------------------------------------------------------------------

struct Account {
    uid: String,
    password: String,
    verified: bool,
}

/// Accounts created here start unverified unless `auto_verify()` was set.
#[derive(Default)]
pub struct MockIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    auto_verify: bool,
    fail_verification: bool,
    verification_emails: Mutex<usize>,
    resets: Mutex<Vec<String>>,
    discarded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MockIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_verify(mut self) -> Self {
        self.auto_verify = true;
        self
    }

    pub fn failing_verification(mut self) -> Self {
        self.fail_verification = true;
        self
    }

    pub fn with_verified_account(self, uid: &str, email: &str, password: &str) -> Self {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                uid: uid.to_string(),
                password: password.to_string(),
                verified: true,
            },
        );
        self
    }

    pub fn verify(&self, email: &str) {
        if let Some(account) = self.accounts.lock().unwrap().get_mut(email) {
            account.verified = true;
        }
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts.lock().unwrap().contains_key(email)
    }

    pub fn verification_emails(&self) -> usize {
        *self.verification_emails.lock().unwrap()
    }

    pub fn resets(&self) -> Vec<String> {
        self.resets.lock().unwrap().clone()
    }

    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

fn token_for(uid: &str) -> String {
    format!("token-{uid}")
}

#[async_trait]
impl IdentityProvider for MockIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<CreatedAccount> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(IdentityError::Api {
                status: 400,
                message: "EMAIL_EXISTS".into(),
            }
            .into());
        }
        let uid = format!("uid-{}", accounts.len() + 1);
        accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
                verified: self.auto_verify,
            },
        );
        Ok(CreatedAccount {
            id_token: token_for(&uid),
            uid,
        })
    }

    async fn send_verification(&self, _id_token: &str) -> Result<()> {
        if self.fail_verification {
            return Err(anyhow!("MockIdentity: mail quota exceeded"));
        }
        *self.verification_emails.lock().unwrap() += 1;
        Ok(())
    }

    async fn verification_link(&self, email: &str) -> Result<String> {
        Ok(format!("https://verify.test/{email}"))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SignedInAccount> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(email) {
            Some(account) if account.password == password => Ok(SignedInAccount {
                uid: account.uid.clone(),
                email: email.to_string(),
                email_verified: account.verified,
            }),
            _ => Err(IdentityError::Api {
                status: 400,
                message: "INVALID_LOGIN_CREDENTIALS".into(),
            }
            .into()),
        }
    }

    async fn send_password_reset(&self, email: &str) -> Result<()> {
        if !self.has_account(email) {
            return Err(anyhow!("MockIdentity: EMAIL_NOT_FOUND"));
        }
        self.resets.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn discard_new_account(&self, id_token: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        accounts.retain(|_, account| token_for(&account.uid) != id_token);
        self.discarded.lock().unwrap().push(id_token.to_string());
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> Result<()> {
        self.accounts.lock().unwrap().retain(|_, account| account.uid != uid);
        self.deleted.lock().unwrap().push(uid.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingAlerts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingAlerts {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlerts {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingAlerts {
    async fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// An engine wired over a MemoryStore and the mocks above, with handles kept
/// for assertions.
pub struct Harness {
    pub engine: Cinesorte,
    pub store: Arc<MemoryStore>,
    pub catalog: Arc<MockCatalog>,
    pub identity: Arc<MockIdentity>,
    pub alerts: Arc<RecordingAlerts>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MemoryStore::new(), MockCatalog::new(), MockIdentity::new())
    }

    pub fn with(store: MemoryStore, catalog: MockCatalog, identity: MockIdentity) -> Self {
        let store = Arc::new(store);
        let catalog = Arc::new(catalog);
        let identity = Arc::new(identity);
        let alerts = Arc::new(RecordingAlerts::default());
        let engine = Cinesorte::builder()
            .store(store.clone())
            .catalog(catalog.clone())
            .identity(identity.clone())
            .alerts(alerts.clone())
            .purge_pause(std::time::Duration::ZERO)
            .build();
        Self {
            engine,
            store,
            catalog,
            identity,
            alerts,
        }
    }

    /// Insert a fresh aggregate whose id, username and email derive from `id`.
    pub async fn user(&self, id: &str) -> UserProfile {
        let user = UserProfile::new(id, "Nome", id, format!("{id}@example.com"), Utc::now());
        self.store
            .insert_user(&user)
            .await
            .expect("seed user");
        user
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
