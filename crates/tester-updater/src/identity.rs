//! Fingerprint of the running build, compared against a release's `codeHash`.

use crate::{UpdateError, UpdateResult};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::task;
use tracing::debug;

/// Supplies the code fingerprint of the installed build.
///
/// Mobile hosts compute this the same way the distribution service does and
/// hand it in through [`StaticIdentity`].
#[async_trait]
pub trait BinaryIdentity: Send + Sync {
    async fn code_hash(&self) -> UpdateResult<String>;
}

/// A fingerprint known up front.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    code_hash: String,
}

impl StaticIdentity {
    pub fn new(code_hash: impl Into<String>) -> Self {
        Self {
            code_hash: code_hash.into(),
        }
    }
}

#[async_trait]
impl BinaryIdentity for StaticIdentity {
    async fn code_hash(&self) -> UpdateResult<String> {
        Ok(self.code_hash.clone())
    }
}

/// Lowercase hex SHA-256 of an executable, computed once and cached.
pub struct ExecutableSha256Identity {
    path: Option<PathBuf>,
    cached: OnceLock<String>,
}

impl ExecutableSha256Identity {
    /// Fingerprint the currently running executable.
    pub fn current() -> Self {
        Self {
            path: None,
            cached: OnceLock::new(),
        }
    }

    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            cached: OnceLock::new(),
        }
    }

    fn resolve_path(&self) -> UpdateResult<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe()
                .map_err(|e| UpdateError::Identity(format!("cannot locate executable: {}", e))),
        }
    }
}

#[async_trait]
impl BinaryIdentity for ExecutableSha256Identity {
    async fn code_hash(&self) -> UpdateResult<String> {
        if let Some(hash) = self.cached.get() {
            return Ok(hash.clone());
        }

        let path = self.resolve_path()?;

        // Hashing reads the whole binary; keep it off the async workers.
        let hash = task::spawn_blocking({
            let path = path.clone();
            move || sha256_file(&path)
        })
        .await
        .map_err(|e| UpdateError::Identity(format!("hash task failed: {}", e)))?
        .map_err(|e| UpdateError::Identity(format!("cannot read {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), code_hash = %hash, "Computed binary fingerprint");

        Ok(self.cached.get_or_init(|| hash).clone())
    }
}

fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
