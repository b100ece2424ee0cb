//! Update check: consent gate, sign-in, token, release fetch, fingerprint comparison.

use crate::consent::ConsentPrompt;
use crate::identity::BinaryIdentity;
use crate::releases::{Release, ReleasesClient};
use crate::UpdateResult;
use std::sync::Arc;
use tester_auth::{BrowserPresenter, SessionManager};
use tester_config_and_utils::CoreError;
use tracing::{debug, info, warn};

/// Runs update checks for one app. Calls are independent of each other and
/// may run concurrently.
pub struct UpdateChecker {
    auth: Arc<SessionManager>,
    releases: ReleasesClient,
    identity: Arc<dyn BinaryIdentity>,
    app_id: String,
}

impl UpdateChecker {
    pub fn new(
        auth: Arc<SessionManager>,
        releases: ReleasesClient,
        identity: Arc<dyn BinaryIdentity>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            releases,
            identity,
            app_id: app_id.into(),
        }
    }

    /// Check whether a build newer than the running one is available.
    ///
    /// Returns `Ok(None)` when the user declines the sign-in prompt, when the
    /// installed build already matches the latest release, and when no
    /// release is flagged latest. A failed token refresh signs the tester out
    /// and is returned as an error.
    pub async fn check_for_update(
        &self,
        consent: &dyn ConsentPrompt,
        presenter: &dyn BrowserPresenter,
    ) -> UpdateResult<Option<Release>> {
        if self.app_id.trim().is_empty() {
            return Err(CoreError::Config("app_id is not set".to_string()).into());
        }

        if !self.auth.is_signed_in() {
            if !consent.request_in_app_alerts().await {
                info!("In-app alerts declined, skipping update check");
                return Ok(None);
            }
            self.auth.sign_in(presenter).await?;
        }

        let access_token = match self.auth.valid_access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "No usable access token for update check");
                return Err(e.into());
            }
        };

        let list = self
            .releases
            .fetch_releases(&self.app_id, &access_token)
            .await?;

        let Some(latest) = list.latest() else {
            warn!(
                app_id = %self.app_id,
                release_count = list.releases.len(),
                "No release is flagged latest, treating as no update"
            );
            return Ok(None);
        };

        let installed = self.identity.code_hash().await?;
        if latest.code_hash == installed {
            debug!(code_hash = %installed, "Installed build is the latest release");
            return Ok(None);
        }

        info!(
            display_version = ?latest.display_version,
            build_version = ?latest.build_version,
            "Newer build available"
        );
        Ok(Some(latest.clone()))
    }
}

impl std::fmt::Debug for UpdateChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateChecker")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
