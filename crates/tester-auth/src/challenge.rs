//! Pending browser authorization challenge.
//!
//! At most one challenge is outstanding per registry. Beginning a new one
//! resolves the previous waiter with [`ChallengeOutcome::Superseded`]; a
//! redirect carrying the old `state` afterwards matches nothing and is ignored.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

/// How a pending challenge ended.
#[derive(Debug)]
pub enum ChallengeOutcome {
    /// The redirect came back with this URL.
    Redirect(Url),
    /// The user dismissed the browser.
    Cancelled,
    /// A newer challenge replaced this one.
    Superseded,
}

struct PendingChallenge {
    state: String,
    redirect_uri: Url,
    sender: oneshot::Sender<ChallengeOutcome>,
}

/// Receiving side of one registered challenge.
pub struct ChallengeTicket {
    state: String,
    receiver: oneshot::Receiver<ChallengeOutcome>,
}

impl ChallengeTicket {
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Wait for the challenge to end. `None` when the registry dropped it without an outcome.
    pub async fn outcome(self) -> Option<ChallengeOutcome> {
        self.receiver.await.ok()
    }
}

/// Process-wide slot for the single outstanding authorization challenge.
///
/// Hosts forward redirect URLs intercepted from the system browser to
/// [`ChallengeRegistry::deliver_redirect`].
#[derive(Default)]
pub struct ChallengeRegistry {
    pending: Mutex<Option<PendingChallenge>>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, Option<PendingChallenge>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a challenge, superseding any outstanding one.
    pub fn begin(&self, state: String, redirect_uri: Url) -> ChallengeTicket {
        let (sender, receiver) = oneshot::channel();

        let previous = self.pending().replace(PendingChallenge {
            state: state.clone(),
            redirect_uri,
            sender,
        });

        if let Some(previous) = previous {
            info!("Superseding pending sign-in challenge");
            let _ = previous.sender.send(ChallengeOutcome::Superseded);
        }

        ChallengeTicket { state, receiver }
    }

    /// Forward an intercepted redirect to the pending challenge.
    ///
    /// Returns `true` when the URL belonged to the outstanding challenge.
    /// Unrelated URLs, stale `state` values and redirects arriving with no
    /// challenge pending are ignored.
    pub fn deliver_redirect(&self, redirect: &str) -> bool {
        let url = match Url::parse(redirect) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "Ignoring unparseable redirect");
                return false;
            }
        };

        let mut pending = self.pending();
        let Some(challenge) = pending.as_ref() else {
            debug!("Ignoring redirect with no challenge pending");
            return false;
        };

        if !same_target(&url, &challenge.redirect_uri) {
            debug!(scheme = %url.scheme(), "Ignoring redirect for another target");
            return false;
        }

        let state = url
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned());
        if state.as_deref() != Some(challenge.state.as_str()) {
            warn!("Ignoring redirect whose state does not match the pending challenge");
            return false;
        }

        if let Some(challenge) = pending.take() {
            let _ = challenge.sender.send(ChallengeOutcome::Redirect(url));
        }
        true
    }

    /// Resolve the pending challenge as cancelled by the user.
    pub fn cancel_pending(&self) -> bool {
        match self.pending().take() {
            Some(challenge) => {
                info!("Pending sign-in challenge cancelled");
                let _ = challenge.sender.send(ChallengeOutcome::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Drop the challenge registered with `state`, if it is still the pending one.
    pub fn release(&self, state: &str) {
        let mut pending = self.pending();
        if pending.as_ref().is_some_and(|c| c.state == state) {
            pending.take();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending().is_some()
    }
}

/// Custom schemes carry the bundle id, so compare them case-insensitively.
fn same_target(url: &Url, expected: &Url) -> bool {
    url.scheme().eq_ignore_ascii_case(expected.scheme())
        && url.host_str() == expected.host_str()
        && url.path() == expected.path()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect_uri() -> Url {
        Url::parse("dev.appdistribution.com.example.app:/launch").unwrap()
    }

    #[tokio::test]
    async fn test_matching_redirect_is_delivered() {
        let registry = ChallengeRegistry::new();
        let ticket = registry.begin("state-1".to_string(), redirect_uri());

        assert!(registry.deliver_redirect(
            "dev.appdistribution.com.example.app:/launch?code=abc&state=state-1"
        ));
        assert!(!registry.has_pending());

        match ticket.outcome().await {
            Some(ChallengeOutcome::Redirect(url)) => {
                assert!(url.query_pairs().any(|(k, v)| k == "code" && v == "abc"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scheme_comparison_ignores_case() {
        let registry = ChallengeRegistry::new();
        let redirect = Url::parse("dev.appdistribution.com.Example.App:/launch").unwrap();
        let _ticket = registry.begin("s".to_string(), redirect);

        assert!(registry.deliver_redirect("dev.appdistribution.com.example.app:/launch?state=s&code=c"));
    }

    #[test]
    fn test_mismatched_state_is_ignored() {
        let registry = ChallengeRegistry::new();
        let _ticket = registry.begin("state-1".to_string(), redirect_uri());

        assert!(!registry.deliver_redirect(
            "dev.appdistribution.com.example.app:/launch?code=abc&state=other"
        ));
        assert!(!registry.deliver_redirect("dev.appdistribution.com.example.app:/launch?code=abc"));
        assert!(registry.has_pending());
    }

    #[test]
    fn test_unrelated_url_is_ignored() {
        let registry = ChallengeRegistry::new();
        let _ticket = registry.begin("state-1".to_string(), redirect_uri());

        assert!(!registry.deliver_redirect("https://example.com/launch?state=state-1"));
        assert!(!registry.deliver_redirect("not a url"));
        assert!(registry.has_pending());
    }

    #[test]
    fn test_redirect_without_pending_challenge_is_ignored() {
        let registry = ChallengeRegistry::new();
        assert!(!registry.deliver_redirect(
            "dev.appdistribution.com.example.app:/launch?code=abc&state=state-1"
        ));
    }

    #[tokio::test]
    async fn test_new_challenge_supersedes_previous() {
        let registry = ChallengeRegistry::new();
        let first = registry.begin("first".to_string(), redirect_uri());
        let second = registry.begin("second".to_string(), redirect_uri());

        assert!(matches!(first.outcome().await, Some(ChallengeOutcome::Superseded)));

        // The first challenge's redirect no longer matches anything
        assert!(!registry.deliver_redirect(
            "dev.appdistribution.com.example.app:/launch?code=a&state=first"
        ));
        assert!(registry.deliver_redirect(
            "dev.appdistribution.com.example.app:/launch?code=b&state=second"
        ));
        assert!(matches!(second.outcome().await, Some(ChallengeOutcome::Redirect(_))));
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let registry = ChallengeRegistry::new();
        assert!(!registry.cancel_pending());

        let ticket = registry.begin("s".to_string(), redirect_uri());
        assert!(registry.cancel_pending());
        assert!(matches!(ticket.outcome().await, Some(ChallengeOutcome::Cancelled)));
    }

    #[test]
    fn test_release_only_drops_matching_state() {
        let registry = ChallengeRegistry::new();
        let _old = registry.begin("old".to_string(), redirect_uri());
        let _new = registry.begin("new".to_string(), redirect_uri());

        registry.release("old");
        assert!(registry.has_pending());

        registry.release("new");
        assert!(!registry.has_pending());
    }
}
