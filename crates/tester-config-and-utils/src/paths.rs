//! File system paths used by command-line hosts.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

const BASE_DIR_NAME: &str = ".app-tester";

/// Manages file system paths for the tester SDK.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory (~/.app-tester)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.app-tester`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.app-tester/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the secrets file used by file-backed storage (~/.app-tester/secrets.json).
    pub fn secrets_file(&self) -> PathBuf {
        self.base_dir.join("secrets.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}
