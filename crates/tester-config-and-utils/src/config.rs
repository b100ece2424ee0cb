//! Configuration management for the tester SDK.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Identity provider issuer (can be overridden at compile time via APP_TESTER_ISSUER_URL).
pub const DEFAULT_ISSUER_URL: &str = match option_env!("APP_TESTER_ISSUER_URL") {
    Some(url) => url,
    None => "https://accounts.google.com",
};

/// OAuth client identifier (can be overridden at compile time via APP_TESTER_CLIENT_ID).
pub const DEFAULT_CLIENT_ID: &str = match option_env!("APP_TESTER_CLIENT_ID") {
    Some(id) => id,
    None => "app-tester-sdk.apps.googleusercontent.com",
};

/// Scope granting access to the tester API (compile-time override via APP_TESTER_API_SCOPE).
pub const DEFAULT_TESTER_API_SCOPE: &str = match option_env!("APP_TESTER_API_SCOPE") {
    Some(scope) => scope,
    None => "https://www.googleapis.com/auth/cloud-platform",
};

/// Releases collection endpoint; the app id is appended as the last path segment.
pub const DEFAULT_RELEASES_ENDPOINT: &str = match option_env!("APP_TESTER_RELEASES_ENDPOINT") {
    Some(endpoint) => endpoint,
    None => "https://firebaseapptesters.googleapis.com/v1alpha/devices/-/testerApps",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_REDIRECT_SCHEME_PREFIX: &str = "dev.appdistribution";
const DEFAULT_STORAGE_NAMESPACE: &str = "dev.appdistribution.tester";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SIGN_IN_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REFRESH_MAX_ATTEMPTS: u32 = 1;

/// Tester SDK configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// OpenID Connect issuer used for discovery.
    pub issuer_url: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// Host app bundle identifier, used to derive the redirect URI.
    pub bundle_id: String,
    /// Reverse-domain prefix of the redirect URI scheme.
    pub redirect_scheme_prefix: String,
    /// Scope granting access to the releases API.
    pub tester_api_scope: String,
    /// Releases collection endpoint.
    pub releases_endpoint: String,
    /// Identifier of the app whose releases are checked.
    pub app_id: String,
    /// Timeout for every HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// How long a pending browser challenge may wait for its redirect, in seconds.
    pub sign_in_timeout_secs: u64,
    /// Token refresh attempts before the session is dropped.
    pub refresh_max_attempts: u32,
    /// Namespace under which the session record is stored.
    pub storage_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            issuer_url: DEFAULT_ISSUER_URL.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            bundle_id: String::new(),
            redirect_scheme_prefix: DEFAULT_REDIRECT_SCHEME_PREFIX.to_string(),
            tester_api_scope: DEFAULT_TESTER_API_SCOPE.to_string(),
            releases_endpoint: DEFAULT_RELEASES_ENDPOINT.to_string(),
            app_id: String::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            sign_in_timeout_secs: DEFAULT_SIGN_IN_TIMEOUT_SECS,
            refresh_max_attempts: DEFAULT_REFRESH_MAX_ATTEMPTS,
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file under `paths`, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply runtime overrides. Only host-specific values may change at runtime;
    /// provider identity stays compile-time or file configured.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = non_empty("APP_TESTER_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(app_id) = non_empty("APP_TESTER_APP_ID") {
            self.app_id = app_id;
        }
        if let Some(bundle_id) = non_empty("APP_TESTER_BUNDLE_ID") {
            self.bundle_id = bundle_id;
        }
    }

    /// Check that the values a check-for-update run depends on are present and well formed.
    pub fn validate(&self) -> CoreResult<()> {
        if self.app_id.trim().is_empty() {
            return Err(CoreError::Config("app_id is not set".to_string()));
        }
        if self.bundle_id.trim().is_empty() {
            return Err(CoreError::Config("bundle_id is not set".to_string()));
        }
        if self.client_id.trim().is_empty() {
            return Err(CoreError::Config("client_id is not set".to_string()));
        }
        self.issuer()?;
        self.releases_url()?;
        Ok(())
    }

    /// The issuer as a parsed URL.
    pub fn issuer(&self) -> CoreResult<Url> {
        Url::parse(&self.issuer_url).map_err(CoreError::from)
    }

    /// The releases endpoint as a parsed URL.
    pub fn releases_url(&self) -> CoreResult<Url> {
        Url::parse(&self.releases_endpoint).map_err(CoreError::from)
    }

    /// Redirect URI registered for this app: `<prefix>.<bundle_id>:/launch`.
    pub fn redirect_uri(&self) -> String {
        format!("{}.{}:/launch", self.redirect_scheme_prefix, self.bundle_id)
    }

    /// Scopes requested during sign-in.
    pub fn scopes(&self) -> Vec<String> {
        vec![
            "openid".to_string(),
            "profile".to_string(),
            self.tester_api_scope.clone(),
        ]
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sign_in_timeout(&self) -> Duration {
        Duration::from_secs(self.sign_in_timeout_secs)
    }
}
