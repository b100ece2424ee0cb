//! OpenID Connect provider discovery.

use crate::{AuthError, AuthResult};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const DISCOVERY_PATH: &str = ".well-known/openid-configuration";

/// The subset of the discovery document the sign-in flow uses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
}

/// Discovery document URL for an issuer, keeping any path the issuer has.
pub fn discovery_url(issuer: &Url) -> AuthResult<Url> {
    let mut base = issuer.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(DISCOVERY_PATH)?)
}

/// Fetch and decode provider metadata. Every failure maps to [`AuthError::Discovery`].
pub async fn discover(http_client: &reqwest::Client, issuer: &Url) -> AuthResult<ProviderMetadata> {
    let url = discovery_url(issuer)?;
    debug!(url = %url, "Fetching provider configuration");

    let response = http_client
        .get(url.clone())
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| AuthError::Discovery(format!("request to {} failed: {}", url, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        warn!(status = %status, url = %url, "Provider configuration request failed");
        return Err(AuthError::Discovery(format!("HTTP {} from {}", status, url)));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AuthError::Discovery(format!("failed to read body: {}", e)))?;
    let metadata: ProviderMetadata = serde_json::from_str(&body)
        .map_err(|e| AuthError::Discovery(format!("malformed provider configuration: {}", e)))?;

    Url::parse(&metadata.authorization_endpoint)
        .map_err(|e| AuthError::Discovery(format!("invalid authorization_endpoint: {}", e)))?;
    Url::parse(&metadata.token_endpoint)
        .map_err(|e| AuthError::Discovery(format!("invalid token_endpoint: {}", e)))?;

    debug!(issuer = %metadata.issuer, "Provider configuration discovered");
    Ok(metadata)
}
