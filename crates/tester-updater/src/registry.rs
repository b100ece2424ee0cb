//! Host app context and the registry that owns one [`TesterSession`] per context.

use crate::consent::ConsentPrompt;
use crate::facade::TesterSession;
use crate::identity::BinaryIdentity;
use crate::{UpdateError, UpdateResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tester_auth::{BrowserPresenter, ChallengeRegistry, StageCallback};
use tester_config_and_utils::Config;
use tester_storage::SecureStorage;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

/// Name of the context used by [`SessionRegistry::session`].
pub const DEFAULT_CONTEXT_NAME: &str = "[DEFAULT]";

/// Name this library registers with the host.
pub const LIBRARY_NAME: &str = "app-tester";

/// Version this library registers with the host.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Everything the host app provides to build a [`TesterSession`].
pub struct HostContext {
    name: String,
    config: Config,
    storage: Arc<dyn SecureStorage>,
    presenter: Arc<dyn BrowserPresenter>,
    consent: Arc<dyn ConsentPrompt>,
    identity: Arc<dyn BinaryIdentity>,
    runtime: Handle,
    stage_callback: Option<StageCallback>,
    libraries: Mutex<BTreeMap<String, String>>,
}

impl HostContext {
    pub fn new(
        name: impl Into<String>,
        config: Config,
        storage: Arc<dyn SecureStorage>,
        presenter: Arc<dyn BrowserPresenter>,
        consent: Arc<dyn ConsentPrompt>,
        identity: Arc<dyn BinaryIdentity>,
        runtime: Handle,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            storage,
            presenter,
            consent,
            identity,
            runtime,
            stage_callback: None,
            libraries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Report sign-in progress to the host UI.
    pub fn with_stage_callback(mut self, callback: StageCallback) -> Self {
        self.stage_callback = Some(callback);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> Arc<dyn SecureStorage> {
        self.storage.clone()
    }

    pub fn presenter(&self) -> Arc<dyn BrowserPresenter> {
        self.presenter.clone()
    }

    pub fn consent(&self) -> Arc<dyn ConsentPrompt> {
        self.consent.clone()
    }

    pub fn identity(&self) -> Arc<dyn BinaryIdentity> {
        self.identity.clone()
    }

    pub fn runtime(&self) -> Handle {
        self.runtime.clone()
    }

    pub fn stage_callback(&self) -> Option<StageCallback> {
        self.stage_callback.clone()
    }

    /// Record a library name and version, replacing an earlier version.
    pub fn register_library(&self, name: &str, version: &str) {
        lock(&self.libraries).insert(name.to_string(), version.to_string());
    }

    /// Registered `(name, version)` pairs, sorted by name.
    pub fn registered_libraries(&self) -> Vec<(String, String)> {
        lock(&self.libraries)
            .iter()
            .map(|(name, version)| (name.clone(), version.clone()))
            .collect()
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("name", &self.name)
            .field("app_id", &self.config.app_id)
            .field("bundle_id", &self.config.bundle_id)
            .finish_non_exhaustive()
    }
}

/// Single owner of tester sessions.
///
/// Sessions are created on first access and cached per host context. All
/// sessions share one challenge registry, so at most one browser challenge
/// is pending in the process.
pub struct SessionRegistry {
    contexts: Mutex<HashMap<String, Arc<HostContext>>>,
    sessions: Mutex<HashMap<String, Arc<TesterSession>>>,
    challenges: Arc<ChallengeRegistry>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            challenges: Arc::new(ChallengeRegistry::new()),
        }
    }

    /// Where the host forwards redirect URLs intercepted from the browser.
    pub fn redirect_handler(&self) -> Arc<ChallengeRegistry> {
        self.challenges.clone()
    }

    /// Register a host context under its name, replacing any earlier one.
    /// A session cached for a replaced context is dropped.
    pub fn configure(&self, host: HostContext) -> Arc<HostContext> {
        host.register_library(LIBRARY_NAME, LIBRARY_VERSION);
        let host = Arc::new(host);
        let name = host.name().to_string();

        // Lock order: sessions, then contexts
        let mut sessions = lock(&self.sessions);
        let replaced = lock(&self.contexts)
            .insert(name.clone(), host.clone())
            .is_some();
        if replaced {
            sessions.remove(&name);
            info!(context = %name, "Host context reconfigured");
        } else {
            info!(context = %name, "Host context configured");
        }
        host
    }

    pub fn is_configured(&self, name: &str) -> bool {
        lock(&self.contexts).contains_key(name)
    }

    /// Session for the default host context.
    pub fn session(&self) -> UpdateResult<Arc<TesterSession>> {
        self.session_named(DEFAULT_CONTEXT_NAME)
    }

    /// Session for the named host context, built on first call and cached.
    pub fn session_named(&self, name: &str) -> UpdateResult<Arc<TesterSession>> {
        let mut sessions = lock(&self.sessions);
        if let Some(session) = sessions.get(name) {
            return Ok(session.clone());
        }

        let Some(host) = lock(&self.contexts).get(name).cloned() else {
            error!(
                context = %name,
                "Tester session requested before the host app context was configured"
            );
            return Err(UpdateError::HostNotInitialized);
        };

        debug!(context = %name, "Creating tester session");
        let session = Arc::new(TesterSession::new(&host, self.challenges.clone())?);
        sessions.insert(name.to_string(), session.clone());
        Ok(session)
    }
}
