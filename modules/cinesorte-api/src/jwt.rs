use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_DURATION_SECS: i64 = 5 * 24 * 3600; // 5 days
/// Sessions with less than this left are re-issued on the next authenticated request.
pub const RENEW_WITHIN_SECS: i64 = 24 * 3600;
const COOKIE_NAME: &str = "authToken";
const ISSUER: &str = "cinesorte";

/// What a signed-in session asserts about its holder.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionClaims {
    pub uid: String,
    /// Profile handle at issue time. Absent for accounts that have no profile yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Email verified at issue time.
    pub verified: bool,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl SessionClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        Duration::seconds(self.exp - now.timestamp())
    }
}

/// Signs and verifies HS256 session tokens.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SessionService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, uid: &str, username: Option<&str>, verified: bool) -> Result<String> {
        self.issue_at(uid, username, verified, Utc::now())
    }

    pub fn issue_at(
        &self,
        uid: &str,
        username: Option<&str>,
        verified: bool,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let claims = SessionClaims {
            uid: uid.to_string(),
            username: username.map(str::to_string),
            verified,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(SESSION_DURATION_SECS)).timestamp(),
            iss: ISSUER.to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Returns the claims of a well-signed, unexpired token.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }

    /// A fresh token for the same holder once `claims` is inside the renewal window.
    /// `username` replaces the stored handle so renamed profiles pick up the new one.
    pub fn renewal(
        &self,
        claims: &SessionClaims,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if claims.remaining(now) > Duration::seconds(RENEW_WITHIN_SECS) {
            return Ok(None);
        }
        let username = username.or(claims.username.as_deref());
        self.issue_at(&claims.uid, username, claims.verified, now)
            .map(Some)
    }
}

/// Set-Cookie value for a fresh session. The frontend lives on another origin,
/// so release builds send `SameSite=None; Secure`.
pub fn session_cookie(token: &str) -> String {
    let same_site = if cfg!(debug_assertions) {
        "SameSite=Lax"
    } else {
        "SameSite=None; Secure"
    };
    format!("{COOKIE_NAME}={token}; Path=/; HttpOnly; {same_site}; Max-Age={SESSION_DURATION_SECS}")
}

pub fn clear_session_cookie() -> String {
    format!("{COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Value of the authToken cookie in a Cookie header.
pub fn parse_auth_cookie(header: &str) -> Option<&str> {
    header
        .split(';')
        .filter_map(|part| part.trim().strip_prefix(COOKIE_NAME))
        .find_map(|rest| rest.strip_prefix('='))
        .filter(|v| !v.is_empty())
}
