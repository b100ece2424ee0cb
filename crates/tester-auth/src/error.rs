//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Provider metadata could not be fetched or decoded
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// The authorization challenge or code exchange failed
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// The user dismissed the browser challenge
    #[error("Sign-in cancelled by user")]
    Cancelled,

    /// A newer sign-in attempt replaced this one
    #[error("Sign-in superseded by a newer attempt")]
    Superseded,

    /// Token refresh error
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    /// Refresh retries exhausted
    #[error("Token refresh failed after {0} attempts")]
    RefreshExhausted(u32),

    /// The identity provider answered with a server error
    #[error("Identity provider returned HTTP {0}")]
    ServerError(u16),

    /// No session stored
    #[error("Not signed in")]
    NotSignedIn,

    /// Invalid state transition in the sign-in FSM
    #[error("Invalid sign-in state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] tester_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Timeout | AuthError::ServerError(_) => true,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
