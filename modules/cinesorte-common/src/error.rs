use thiserror::Error;

pub type Result<T> = std::result::Result<T, CinesorteError>;

#[derive(Error, Debug)]
pub enum CinesorteError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    /// Optimistic transaction kept conflicting after every retry.
    #[error("Transaction contention: {0}")]
    Contention(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CinesorteError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// HTTP status class for this error. Conflicts surface as 400 like validation.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Conflict(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::RateLimited(_) => 429,
            Self::Contention(_)
            | Self::Database(_)
            | Self::Upstream(_)
            | Self::Config(_)
            | Self::Anyhow(_) => 500,
        }
    }

    /// Client-caused errors carry a message safe to show to the caller.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_bad_request() {
        assert_eq!(CinesorteError::conflict("Username em uso.").status_code(), 400);
    }

    #[test]
    fn contention_is_server_error() {
        let err = CinesorteError::Contention("reviews".into());
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_client_error());
    }

    #[test]
    fn anyhow_is_server_error() {
        let err: CinesorteError = anyhow::anyhow!("boom").into();
        assert_eq!(err.status_code(), 500);
    }
}
