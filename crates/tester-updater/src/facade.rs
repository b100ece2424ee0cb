//! The surface a host app talks to.

use crate::checker::UpdateChecker;
use crate::consent::ConsentPrompt;
use crate::registry::HostContext;
use crate::releases::{Release, ReleasesClient};
use crate::UpdateResult;
use std::sync::Arc;
use tester_auth::{
    BrowserPresenter, ChallengeRegistry, OAuthSettings, RefreshConfig, SessionManager,
};
use tester_storage::{Session, SessionStore};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sign-in, sign-out and update checks for one host app context.
///
/// Obtain one through [`crate::SessionRegistry`]. The `*_with` variants run on
/// the host's runtime and report through a completion callback without
/// blocking the caller.
pub struct TesterSession {
    auth: Arc<SessionManager>,
    checker: UpdateChecker,
    presenter: Arc<dyn BrowserPresenter>,
    consent: Arc<dyn ConsentPrompt>,
    runtime: Handle,
}

impl TesterSession {
    pub fn new(host: &HostContext, challenges: Arc<ChallengeRegistry>) -> UpdateResult<Self> {
        let config = host.config();
        config.validate()?;

        let settings = OAuthSettings::from_config(config)?;
        let store = SessionStore::new(Box::new(host.storage()), &config.storage_namespace);
        let auth = Arc::new(SessionManager::with_refresh_config(
            store,
            settings,
            challenges,
            RefreshConfig::from_config(config),
        )?);
        if let Some(callback) = host.stage_callback() {
            auth.set_stage_callback(callback);
        }

        let releases = ReleasesClient::new(config.releases_url()?, config.request_timeout())?;
        let checker = UpdateChecker::new(
            auth.clone(),
            releases,
            host.identity(),
            config.app_id.clone(),
        );

        Ok(Self {
            auth,
            checker,
            presenter: host.presenter(),
            consent: host.consent(),
            runtime: host.runtime(),
        })
    }

    /// Whether a session is persisted. Never touches the network.
    pub fn is_signed_in(&self) -> bool {
        self.auth.is_signed_in()
    }

    /// The persisted session, if any.
    pub fn session(&self) -> UpdateResult<Option<Session>> {
        Ok(self.auth.session()?)
    }

    pub async fn sign_in(&self) -> UpdateResult<()> {
        self.auth.sign_in(self.presenter.as_ref()).await?;
        Ok(())
    }

    pub fn sign_out(&self) -> UpdateResult<()> {
        self.auth.sign_out()?;
        Ok(())
    }

    pub async fn check_for_update(&self) -> UpdateResult<Option<Release>> {
        self.checker
            .check_for_update(self.consent.as_ref(), self.presenter.as_ref())
            .await
    }

    /// Start a sign-in on the host runtime; `completion` receives the outcome.
    pub fn sign_in_with<F>(self: &Arc<Self>, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(UpdateResult<()>) + Send + 'static,
    {
        let session = self.clone();
        self.runtime.spawn(async move {
            let result = session.sign_in().await;
            if let Err(e) = &result {
                warn!(error = %e, "Sign-in failed");
            }
            completion(result);
        })
    }

    /// Start an update check on the host runtime; `completion` receives the outcome.
    pub fn check_for_update_with<F>(self: &Arc<Self>, completion: F) -> JoinHandle<()>
    where
        F: FnOnce(UpdateResult<Option<Release>>) + Send + 'static,
    {
        let session = self.clone();
        self.runtime.spawn(async move {
            let result = session.check_for_update().await;
            match &result {
                Ok(Some(release)) => {
                    debug!(code_hash = %release.code_hash, "Delivering available release")
                }
                Ok(None) => debug!("No update to deliver"),
                Err(e) => warn!(error = %e, "Update check failed"),
            }
            completion(result);
        })
    }

    /// Where the host forwards redirect URLs intercepted from the browser.
    pub fn redirect_handler(&self) -> Arc<ChallengeRegistry> {
        self.auth.challenges()
    }
}

impl std::fmt::Debug for TesterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TesterSession")
            .field("checker", &self.checker)
            .field("signed_in", &self.is_signed_in())
            .finish_non_exhaustive()
    }
}
