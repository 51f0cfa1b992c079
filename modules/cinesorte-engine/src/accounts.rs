//! Account lifecycle: registration, login, password reset and deletion.
//!
//! Credentials live with the identity provider behind [`IdentityProvider`];
//! this module keeps the user aggregate in step with it.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use cinesorte_common::{contains_profanity, CinesorteError, Result, UserProfile};
use cinesorte_store::OwnedCollection;
use identity_client::{IdentityClient, IdentityError};

use crate::validation;
use crate::Cinesorte;

const EMAIL_EXISTS: &str = "EMAIL_EXISTS";

#[derive(Debug, Clone)]
pub struct CreatedAccount {
    pub uid: String,
    /// Short-lived token for follow-up calls on the new account.
    pub id_token: String,
}

#[derive(Debug, Clone)]
pub struct SignedInAccount {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_account(&self, email: &str, password: &str) -> anyhow::Result<CreatedAccount>;

    /// Mail a verification link to the owner of `id_token`.
    async fn send_verification(&self, id_token: &str) -> anyhow::Result<()>;

    /// Verification link for out-of-band delivery.
    async fn verification_link(&self, email: &str) -> anyhow::Result<String>;

    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<SignedInAccount>;

    async fn send_password_reset(&self, email: &str) -> anyhow::Result<()>;

    /// Undo an account created moments ago, using its own token.
    async fn discard_new_account(&self, id_token: &str) -> anyhow::Result<()>;

    async fn delete_account(&self, uid: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn create_account(&self, email: &str, password: &str) -> anyhow::Result<CreatedAccount> {
        let signed = self.sign_up(email, password).await?;
        Ok(CreatedAccount {
            uid: signed.local_id,
            id_token: signed.id_token,
        })
    }

    async fn send_verification(&self, id_token: &str) -> anyhow::Result<()> {
        Ok(self.send_verification_email(id_token).await?)
    }

    async fn verification_link(&self, email: &str) -> anyhow::Result<String> {
        Ok(IdentityClient::verification_link(self, email).await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> anyhow::Result<SignedInAccount> {
        let signed = IdentityClient::sign_in(self, email, password).await?;
        let info = self.lookup(&signed.id_token).await?;
        Ok(SignedInAccount {
            uid: signed.local_id,
            email: signed.email,
            email_verified: info.email_verified,
        })
    }

    async fn send_password_reset(&self, email: &str) -> anyhow::Result<()> {
        Ok(IdentityClient::send_password_reset(self, email).await?)
    }

    async fn discard_new_account(&self, id_token: &str) -> anyhow::Result<()> {
        Ok(self.delete_with_token(id_token).await?)
    }

    async fn delete_account(&self, uid: &str) -> anyhow::Result<()> {
        Ok(IdentityClient::delete_account(self, uid).await?)
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        validation::validate_name(&self.name)?;
        validation::validate_handle(&self.nickname)?;
        validation::validate_email(&self.email)?;
        validation::validate_password(&self.password)?;
        if contains_profanity(&self.name) || contains_profanity(&self.nickname) {
            return Err(CinesorteError::validation("Nome ou Nickname impróprio."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    /// Absent if the identity exists without an aggregate.
    pub profile: Option<UserProfile>,
}

fn is_email_taken(err: &anyhow::Error) -> bool {
    err.downcast_ref::<IdentityError>()
        .and_then(IdentityError::code)
        .is_some_and(|code| code.starts_with(EMAIL_EXISTS))
}

impl Cinesorte {
    /// Create the identity and the aggregate together. If the aggregate cannot
    /// be written the identity is discarded again.
    pub async fn register(&self, registration: Registration) -> Result<UserProfile> {
        registration.validate()?;
        let nickname = registration.nickname.to_lowercase();
        let email = registration.email.trim().to_string();

        if self.store.get_user_by_username(&nickname).await?.is_some() {
            return Err(CinesorteError::conflict("Este nickname já está em uso."));
        }

        let account = self
            .identity
            .create_account(&email, &registration.password)
            .await
            .map_err(|e| {
                if is_email_taken(&e) {
                    CinesorteError::conflict("Este email já está em uso.")
                } else {
                    CinesorteError::Upstream(e.to_string())
                }
            })?;

        let user = UserProfile::new(
            &account.uid,
            registration.name.trim(),
            &nickname,
            &email,
            Utc::now(),
        );
        if let Err(e) = self.store.insert_user(&user).await {
            warn!(error = %e, uid = %account.uid, "Aggregate write failed, discarding identity");
            if let Err(rollback) = self.identity.discard_new_account(&account.id_token).await {
                warn!(error = %rollback, uid = %account.uid, "Identity rollback failed");
            }
            return Err(match e {
                CinesorteError::Conflict(_) => {
                    CinesorteError::conflict("Este nickname já está em uso.")
                }
                other => other,
            });
        }

        self.send_verification(&account, &email).await;
        info!(uid = %user.id, username = %user.username, "Account registered");
        Ok(user)
    }

    async fn send_verification(&self, account: &CreatedAccount, email: &str) {
        let Err(e) = self.identity.send_verification(&account.id_token).await else {
            return;
        };
        warn!(error = %e, uid = %account.uid, "Verification email failed");
        self.alerts
            .send(&format!("Falha ao enviar email de verificacao. Erro: {e}"))
            .await;

        match self.identity.verification_link(email).await {
            Ok(link) => {
                self.alerts
                    .send(&format!("Verification link generated: {link}"))
                    .await
            }
            Err(e) => warn!(error = %e, uid = %account.uid, "Verification link generation failed"),
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let account = self
            .identity
            .sign_in(email.trim(), password)
            .await
            .map_err(|e| {
                debug!(error = %e, "Sign-in rejected");
                CinesorteError::Unauthorized("Credenciais inválidas.".into())
            })?;
        if !account.email_verified {
            return Err(CinesorteError::forbidden("Email não verificado."));
        }

        let profile = self.store.get_user(&account.uid).await?;
        info!(uid = %account.uid, "Login");
        Ok(LoginOutcome {
            uid: account.uid,
            email: account.email,
            email_verified: account.email_verified,
            profile,
        })
    }

    pub async fn me(&self, uid: &str) -> Result<UserProfile> {
        self.store
            .get_user(uid)
            .await?
            .ok_or_else(|| CinesorteError::not_found("Usuário não encontrado"))
    }

    /// Always succeeds, whether or not the address belongs to an account.
    pub async fn request_password_reset(&self, email: &str) {
        let email = email.trim();
        if email.is_empty() {
            return;
        }
        if let Err(e) = self.identity.send_password_reset(email).await {
            debug!(error = %e, "Password reset not sent");
        }
    }

    /// Remove everything the user owns, page by page, then the aggregate and the identity.
    /// Safe to run again after a partial failure.
    pub async fn delete_account(&self, uid: &str) -> Result<()> {
        for collection in OwnedCollection::ALL {
            let mut total = 0;
            loop {
                let removed = self
                    .store
                    .delete_owned_page(collection, uid, self.purge_page_size)
                    .await?;
                if removed == 0 {
                    break;
                }
                total += removed;
                tokio::time::sleep(self.purge_pause).await;
            }
            if total > 0 {
                debug!(uid, collection = collection.as_str(), total, "Purged owned records");
            }
        }

        self.store.delete_user(uid).await?;
        self.identity
            .delete_account(uid)
            .await
            .map_err(|e| CinesorteError::Upstream(e.to_string()))?;
        info!(uid, "Account deleted");
        Ok(())
    }
}
