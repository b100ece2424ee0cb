//! Persisted OAuth session.

use crate::{SecureStorage, StorageError, StorageResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_LEEWAY_SECS: i64 = 60;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// An authenticated tester session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
    /// Token endpoint that issued these tokens; refreshes go back to it.
    pub token_endpoint: String,
    pub issuer: String,
}

impl Session {
    /// A session is complete when every token it depends on is present.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_empty()
            && !self.id_token.is_empty()
            && !self.refresh_token.is_empty()
            && !self.token_endpoint.is_empty()
    }

    /// Whether the access token is expired (or about to be).
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_LEEWAY_SECS) <= now
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("token_endpoint", &self.token_endpoint)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Persists one [`Session`] as a single serialized record, so a session is
/// either stored whole or not at all.
pub struct SessionStore {
    storage: Box<dyn SecureStorage>,
    key: String,
    lock: Mutex<()>,
}

impl SessionStore {
    /// Create a store whose record lives at `<namespace>.auth_session`.
    pub fn new(storage: Box<dyn SecureStorage>, namespace: &str) -> Self {
        Self {
            storage,
            key: format!("{}.auth_session", namespace),
            lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the persisted session.
    ///
    /// Undecodable or incomplete records count as no session and are removed.
    pub fn retrieve(&self) -> StorageResult<Option<Session>> {
        let _guard = self.guard();

        let Some(raw) = self.storage.get(&self.key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.is_complete() => Ok(Some(session)),
            Ok(_) => {
                warn!(key = %self.key, "Stored session is incomplete, discarding");
                self.discard_unreadable();
                Ok(None)
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Stored session is corrupt, discarding");
                self.discard_unreadable();
                Ok(None)
            }
        }
    }

    fn discard_unreadable(&self) {
        if let Err(e) = self.storage.delete(&self.key) {
            warn!(key = %self.key, error = %e, "Failed to delete unreadable session record");
        }
    }

    /// Persist a session, replacing any previous one.
    pub fn persist(&self, session: &Session) -> StorageResult<()> {
        if !session.is_complete() {
            return Err(StorageError::IncompleteSession);
        }

        let encoded = serde_json::to_string(session)?;
        let _guard = self.guard();
        self.storage.set(&self.key, &encoded)?;
        debug!(key = %self.key, expires_at = %session.expires_at, "Session persisted");
        Ok(())
    }

    /// Remove the persisted session. Returns whether one existed.
    pub fn clear(&self) -> StorageResult<bool> {
        let _guard = self.guard();
        let removed = self.storage.delete(&self.key)?;
        if removed {
            info!(key = %self.key, "Session cleared");
        }
        Ok(removed)
    }

    /// Whether a readable, complete session is persisted.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.retrieve()?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use std::sync::Arc;

    fn sample_session(expires_in_secs: i64) -> Session {
        Session {
            access_token: "access-token".to_string(),
            id_token: "id-token".to_string(),
            refresh_token: "refresh-token".to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
            token_type: "Bearer".to_string(),
            scope: Some("openid profile".to_string()),
            token_endpoint: "https://issuer.example.com/token".to_string(),
            issuer: "https://issuer.example.com".to_string(),
        }
    }

    fn shared_store() -> (SessionStore, Arc<MemoryStorage>) {
        let backing = Arc::new(MemoryStorage::new());
        let store = SessionStore::new(Box::new(backing.clone()), "test.ns");
        (store, backing)
    }

    #[test]
    fn test_retrieve_empty() {
        let (store, _) = shared_store();
        assert!(store.retrieve().unwrap().is_none());
        assert!(!store.has_session().unwrap());
    }

    #[test]
    fn test_persist_and_retrieve() {
        let (store, backing) = shared_store();
        let session = sample_session(3600);

        store.persist(&session).unwrap();

        assert_eq!(store.retrieve().unwrap(), Some(session));
        assert!(backing.has("test.ns.auth_session").unwrap());
    }

    #[test]
    fn test_persist_rejects_incomplete_session() {
        let (store, backing) = shared_store();
        let mut session = sample_session(3600);
        session.refresh_token.clear();

        let result = store.persist(&session);
        assert!(matches!(result, Err(StorageError::IncompleteSession)));
        assert!(!backing.has(store.key()).unwrap());
    }

    #[test]
    fn test_clear() {
        let (store, _) = shared_store();
        store.persist(&sample_session(3600)).unwrap();

        assert!(store.clear().unwrap());
        assert!(store.retrieve().unwrap().is_none());
        assert!(!store.clear().unwrap());
    }

    #[test]
    fn test_corrupt_record_is_absent_and_removed() {
        let (store, backing) = shared_store();
        backing.set(store.key(), "{ definitely not a session").unwrap();

        assert!(store.retrieve().unwrap().is_none());
        assert!(!backing.has(store.key()).unwrap());
    }

    #[test]
    fn test_incomplete_record_is_absent() {
        let (store, backing) = shared_store();
        let mut session = sample_session(3600);
        session.id_token.clear();
        backing
            .set(store.key(), &serde_json::to_string(&session).unwrap())
            .unwrap();

        assert!(store.retrieve().unwrap().is_none());
    }

    #[test]
    fn test_session_expiry_leeway() {
        assert!(!sample_session(3600).is_expired());
        assert!(sample_session(-10).is_expired());
        // Inside the leeway window
        assert!(sample_session(30).is_expired());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", sample_session(3600));
        assert!(!rendered.contains("access-token"));
        assert!(!rendered.contains("refresh-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_token_type_defaults_to_bearer() {
        let json = serde_json::json!({
            "access_token": "a",
            "id_token": "i",
            "refresh_token": "r",
            "expires_at": "2030-01-01T00:00:00Z",
            "token_endpoint": "https://issuer.example.com/token",
            "issuer": "https://issuer.example.com"
        });
        let session: Session = serde_json::from_value(json).unwrap();
        assert_eq!(session.token_type, "Bearer");
        assert!(session.scope.is_none());
    }
}
