//! Session management: sign-in, sign-out and access tokens that refresh themselves.
//!
//! The persisted [`Session`] in the [`SessionStore`] is the only source of
//! signed-in state. Refreshing never leaves a half-updated record: either the
//! whole refreshed session replaces the old one or the old one is cleared.

use crate::challenge::ChallengeRegistry;
use crate::sign_in::{BrowserPresenter, OAuthSettings, SignInFlow, StageCallback};
use crate::token::refresh_session;
use crate::{AuthError, AuthResult};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tester_config_and_utils::Config;
use tester_storage::{Session, SessionStore};
use tracing::{debug, info, warn};

/// Retry behaviour for token refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Total refresh attempts. Transient failures are retried up to this count.
    pub max_attempts: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.refresh_max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Owns the persisted session and the OAuth client that produces and refreshes it.
pub struct SessionManager {
    store: SessionStore,
    settings: OAuthSettings,
    challenges: Arc<ChallengeRegistry>,
    http_client: Client,
    refresh_config: RefreshConfig,
    stage_callback: Mutex<Option<StageCallback>>,
}

impl SessionManager {
    /// Create a session manager with the default refresh behaviour.
    pub fn new(
        store: SessionStore,
        settings: OAuthSettings,
        challenges: Arc<ChallengeRegistry>,
    ) -> AuthResult<Self> {
        Self::with_refresh_config(store, settings, challenges, RefreshConfig::default())
    }

    pub fn with_refresh_config(
        store: SessionStore,
        settings: OAuthSettings,
        challenges: Arc<ChallengeRegistry>,
        refresh_config: RefreshConfig,
    ) -> AuthResult<Self> {
        let http_client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            store,
            settings,
            challenges,
            http_client,
            refresh_config,
            stage_callback: Mutex::new(None),
        })
    }

    /// Registry hosts forward intercepted redirect URLs to.
    pub fn challenges(&self) -> Arc<ChallengeRegistry> {
        self.challenges.clone()
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// HTTP client shared with other authenticated requests.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Set a callback to be notified of sign-in stage changes.
    pub fn set_stage_callback(&self, callback: StageCallback) {
        *self.stage_callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    fn stage_callback(&self) -> Option<StageCallback> {
        self.stage_callback
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether a complete session is persisted. Reads storage only.
    ///
    /// An expired access token still counts: it is refreshed on next use.
    pub fn is_signed_in(&self) -> bool {
        match self.store.has_session() {
            Ok(signed_in) => signed_in,
            Err(e) => {
                warn!(error = %e, "Could not read stored session, reporting signed out");
                false
            }
        }
    }

    pub fn session(&self) -> AuthResult<Option<Session>> {
        Ok(self.store.retrieve()?)
    }

    /// Run the interactive sign-in and persist the resulting session.
    ///
    /// A previously stored session is only replaced once the new one is issued.
    pub async fn sign_in(&self, presenter: &dyn BrowserPresenter) -> AuthResult<Session> {
        info!("Starting tester sign-in");

        let session = SignInFlow::new(&self.http_client, &self.settings, &self.challenges)
            .with_stage_callback(self.stage_callback())
            .run(presenter)
            .await?;

        self.store.persist(&session)?;
        info!(expires_at = %session.expires_at, "Tester signed in");
        Ok(session)
    }

    /// Remove the stored session.
    pub fn sign_out(&self) -> AuthResult<()> {
        if self.store.clear()? {
            info!("Tester signed out");
        } else {
            debug!("Sign-out with no stored session");
        }
        Ok(())
    }

    /// Get an access token that is valid now, refreshing the session if needed.
    ///
    /// When refresh fails the session is cleared and the tester is signed out.
    pub async fn valid_access_token(&self) -> AuthResult<String> {
        let session = self.store.retrieve()?.ok_or(AuthError::NotSignedIn)?;

        if !session.is_expired() {
            debug!("Access token still valid");
            return Ok(session.access_token);
        }

        info!(expired_at = %session.expires_at, "Access token expired, attempting refresh");
        let refreshed = self.refresh_with_backoff(&session).await?;
        Ok(refreshed.access_token)
    }

    /// Refresh the session with exponential backoff retry.
    async fn refresh_with_backoff(&self, session: &Session) -> AuthResult<Session> {
        let max_attempts = self.refresh_config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match refresh_session(&self.http_client, &self.settings.client_id, session).await {
                Ok(refreshed) => {
                    self.store.persist(&refreshed)?;
                    info!(expires_at = %refreshed.expires_at, "Access token refreshed");
                    return Ok(refreshed);
                }
                Err(e) if e.is_transient() => {
                    if attempt + 1 < max_attempts {
                        let delay = self.refresh_config.delay_for_attempt(attempt);
                        debug!(
                            attempt = attempt + 1,
                            max_attempts,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            "Refresh failed with transient error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(error = %e, "Refresh failed with non-transient error");
                    if let Some(current) = self.discard_after_failed_refresh(session)? {
                        return Ok(current);
                    }
                    return Err(match e {
                        AuthError::TokenRefresh(_) => e,
                        other => AuthError::TokenRefresh(other.to_string()),
                    });
                }
            }
        }

        warn!(max_attempts, "Refresh failed after all attempts");
        if let Some(current) = self.discard_after_failed_refresh(session)? {
            return Ok(current);
        }

        if max_attempts > 1 {
            Err(AuthError::RefreshExhausted(max_attempts))
        } else {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string());
            Err(AuthError::TokenRefresh(reason))
        }
    }

    /// Clear the session after its refresh failed, unless a concurrent caller
    /// already stored a newer one, which is returned instead.
    fn discard_after_failed_refresh(&self, used: &Session) -> AuthResult<Option<Session>> {
        if let Some(current) = self.store.retrieve()? {
            let replaced = current.access_token != used.access_token
                || current.expires_at.timestamp() != used.expires_at.timestamp();
            if replaced && !current.is_expired() {
                debug!("Session was refreshed concurrently, keeping it");
                return Ok(Some(current));
            }
        }

        self.store.clear()?;
        warn!("Session cleared after failed refresh");
        Ok(None)
    }
}
