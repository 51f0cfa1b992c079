pub mod error;
pub mod types;

pub use error::{IdentityError, Result};
pub use types::{AccountInfo, SignedIn};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{
    ErrorEnvelope, IdTokenRequest, LocalIdRequest, LookupResponse, OobRequest, OobResponse,
    PasswordRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Client for the managed identity provider's `accounts:*` endpoints.
///
/// End-user calls authenticate with the web API key. Calls that act on an
/// arbitrary account (deleting by id, generating links) need an admin bearer
/// token and fail with [`IdentityError::MissingAdminToken`] without one.
pub struct IdentityClient {
    client: reqwest::Client,
    api_key: String,
    admin_token: Option<String>,
    base_url: String,
}

impl IdentityClient {
    pub fn new(api_key: String, admin_token: Option<String>) -> Self {
        Self::with_base_url(api_key, admin_token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, admin_token: Option<String>, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            admin_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignedIn> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.post("accounts:signUp", &body, false).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.post("accounts:signInWithPassword", &body, false).await
    }

    /// Account state behind an id token.
    pub async fn lookup(&self, id_token: &str) -> Result<AccountInfo> {
        let resp: LookupResponse = self
            .post("accounts:lookup", &IdTokenRequest { id_token }, false)
            .await?;
        resp.users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Parse("lookup returned no users".into()))
    }

    /// Ask the provider to mail a verification link to the token's owner.
    pub async fn send_verification_email(&self, id_token: &str) -> Result<()> {
        let body = OobRequest {
            request_type: "VERIFY_EMAIL",
            id_token: Some(id_token),
            email: None,
            return_oob_link: false,
        };
        let _: serde_json::Value = self.post("accounts:sendOobCode", &body, false).await?;
        Ok(())
    }

    /// Generate a verification link without sending mail. Admin only.
    pub async fn verification_link(&self, email: &str) -> Result<String> {
        let body = OobRequest {
            request_type: "VERIFY_EMAIL",
            id_token: None,
            email: Some(email),
            return_oob_link: true,
        };
        let resp: OobResponse = self.post("accounts:sendOobCode", &body, true).await?;
        resp.oob_link
            .ok_or_else(|| IdentityError::Parse("response carried no oobLink".into()))
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<()> {
        let body = OobRequest {
            request_type: "PASSWORD_RESET",
            id_token: None,
            email: Some(email),
            return_oob_link: false,
        };
        let _: serde_json::Value = self.post("accounts:sendOobCode", &body, false).await?;
        Ok(())
    }

    /// Delete the account the token belongs to.
    pub async fn delete_with_token(&self, id_token: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post("accounts:delete", &IdTokenRequest { id_token }, false)
            .await?;
        Ok(())
    }

    /// Delete any account by id. Admin only.
    pub async fn delete_account(&self, local_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .post("accounts:delete", &LocalIdRequest { local_id }, true)
            .await?;
        Ok(())
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
        admin: bool,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let mut req = self.client.post(&url).json(body);
        if admin {
            let token = self
                .admin_token
                .as_deref()
                .ok_or(IdentityError::MissingAdminToken)?;
            req = req.bearer_auth(token);
        } else {
            req = req.query(&[("key", self.api_key.as_str())]);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(method, status = status.as_u16(), "Identity request failed");
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: error_code(&body),
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Pull the provider's error code out of an error body, falling back to the raw text.
fn error_code(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_provider_error_code() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert_eq!(error_code(body), "EMAIL_EXISTS");
        assert_eq!(error_code("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn oob_request_omits_unset_fields() {
        let body = OobRequest {
            request_type: "PASSWORD_RESET",
            id_token: None,
            email: Some("a@b.c"),
            return_oob_link: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requestType"], "PASSWORD_RESET");
        assert!(json.get("idToken").is_none());
        assert!(json.get("returnOobLink").is_none());
    }

    #[test]
    fn lookup_defaults_unverified() {
        let resp: LookupResponse =
            serde_json::from_str(r#"{"users":[{"localId":"u1","email":"a@b.c"}]}"#).unwrap();
        assert!(!resp.users[0].email_verified);
    }

    #[tokio::test]
    async fn admin_calls_need_a_token() {
        let client = IdentityClient::with_base_url("k".into(), None, "http://127.0.0.1:9".into());
        let err = client.delete_account("u1").await.unwrap_err();
        assert!(matches!(err, IdentityError::MissingAdminToken));
    }
}
