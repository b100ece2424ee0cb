//! Update check error types.

use tester_auth::AuthError;
use tester_config_and_utils::CoreError;
use thiserror::Error;

/// Error type for update checks and the tester session surface.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Sign-in or token refresh failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The releases service answered with a non-200 status
    #[error("Releases service returned HTTP {status}")]
    Service { status: u16 },

    /// The releases response body could not be decoded
    #[error("Malformed releases response: {0}")]
    Decode(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The running binary could not be fingerprinted
    #[error("Binary identity unavailable: {0}")]
    Identity(String),

    /// Session requested before the host configured its context
    #[error("Host app context has not been configured")]
    HostNotInitialized,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),
}

impl UpdateError {
    /// True when the failure came from token refresh, which also signs the tester out.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            UpdateError::Auth(AuthError::TokenRefresh(_) | AuthError::RefreshExhausted(_))
        )
    }
}

/// Result type alias using UpdateError.
pub type UpdateResult<T> = Result<T, UpdateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_display() {
        let err = UpdateError::Service { status: 403 };
        assert_eq!(err.to_string(), "Releases service returned HTTP 403");
    }

    #[test]
    fn test_is_refresh_failure() {
        assert!(UpdateError::from(AuthError::TokenRefresh("invalid_grant".to_string()))
            .is_refresh_failure());
        assert!(UpdateError::from(AuthError::RefreshExhausted(3)).is_refresh_failure());
        assert!(!UpdateError::from(AuthError::Cancelled).is_refresh_failure());
        assert!(!UpdateError::Service { status: 500 }.is_refresh_failure());
    }
}
