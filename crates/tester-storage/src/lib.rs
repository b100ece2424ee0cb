//! Secure storage for the tester SDK session.
//!
//! This crate provides:
//! - [`SecureStorage`], the key/value secret backend trait
//! - Backends: Keychain on Apple platforms, a JSON file, and in-memory
//! - [`SessionStore`], which persists the OAuth [`Session`] as one record

mod file;
mod memory;
mod session_store;
mod traits;

#[cfg(target_vendor = "apple")]
mod apple;

#[cfg(target_vendor = "apple")]
pub use apple::KeychainStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use session_store::{Session, SessionStore};
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A session without all of its tokens cannot be stored
    #[error("Refusing to store an incomplete session")]
    IncompleteSession,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default platform-specific storage, with items scoped to `namespace`.
pub fn create_storage(namespace: &str) -> StorageResult<Box<dyn SecureStorage>> {
    #[cfg(target_vendor = "apple")]
    {
        let storage = apple::KeychainStorage::new(namespace)?;
        Ok(Box::new(storage))
    }

    #[cfg(not(target_vendor = "apple"))]
    {
        Err(StorageError::Platform(format!(
            "No bundled secure storage for this platform; supply a SecureStorage for {}",
            namespace
        )))
    }
}
