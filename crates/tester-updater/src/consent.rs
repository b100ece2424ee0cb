//! Consent gate shown before an update check signs the tester in.

use async_trait::async_trait;

/// Asks the user whether to enable in-app new-build alerts.
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    /// `true` when the user agreed to sign in for alerts.
    async fn request_in_app_alerts(&self) -> bool;
}

/// Fixed answer, for hosts that collected consent elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct StaticConsent(pub bool);

#[async_trait]
impl ConsentPrompt for StaticConsent {
    async fn request_in_app_alerts(&self) -> bool {
        self.0
    }
}
