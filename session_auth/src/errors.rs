use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// The random source failed. Never answered with a weaker token.
    #[error("Token generation error: {0}")]
    Generation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Malformed or tampered cookie value
    #[error("Decryption error: {0}")]
    Decryption(String),

    #[error("Session not found")]
    NotFound,

    #[error("Session expired: expiration: {expires_at}, now: {now}")]
    Expired {
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// Raised by validate hooks
    #[error("Session rejected: {0}")]
    Rejected(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cookie error: {0}")]
    Cookie(String),
}

impl SessionError {
    /// True when the request simply has no usable session and the client
    /// must authenticate again.
    ///
    /// Not-found, expired and undecryptable cookies are logged distinctly but
    /// mean the same thing to access control.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Decryption(_) | Self::NotFound | Self::Expired { .. }
        )
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other.to_string()),
        }
    }
}
