use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Network error: {0}")]
    Network(String),

    /// `message` is the provider's error code when one was returned, e.g. `EMAIL_EXISTS`.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Admin token not configured")]
    MissingAdminToken,
}

impl IdentityError {
    /// Provider error code, if this is an API rejection.
    pub fn code(&self) -> Option<&str> {
        match self {
            IdentityError::Api { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IdentityError::Parse(err.to_string())
        } else {
            IdentityError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Parse(err.to_string())
    }
}
