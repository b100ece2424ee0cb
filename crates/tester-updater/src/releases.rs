//! Releases API client.

use crate::{UpdateError, UpdateResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tester_config_and_utils::CoreError;
use tracing::{debug, warn};
use url::Url;

/// A distributable build as reported by the releases service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Fingerprint of the release's binary.
    pub code_hash: String,
    #[serde(default)]
    pub latest: bool,
}

/// Response body of the releases endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseList {
    #[serde(default)]
    pub releases: Vec<Release>,
}

impl ReleaseList {
    /// First release flagged latest, in list order.
    pub fn latest(&self) -> Option<&Release> {
        self.releases.iter().find(|r| r.latest)
    }
}

/// Single-attempt client for `GET <endpoint>/<app_id>`.
pub struct ReleasesClient {
    endpoint: Url,
    http_client: Client,
}

impl ReleasesClient {
    pub fn new(endpoint: Url, timeout: Duration) -> UpdateResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(endpoint, http_client))
    }

    pub fn with_client(endpoint: Url, http_client: Client) -> Self {
        Self {
            endpoint,
            http_client,
        }
    }

    /// Collection URL for one app. The id is appended as a single path segment.
    pub fn releases_url(&self, app_id: &str) -> UpdateResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                CoreError::Config(format!(
                    "releases endpoint {} cannot take a path",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .push(app_id);
        Ok(url)
    }

    pub async fn fetch_releases(&self, app_id: &str, access_token: &str) -> UpdateResult<ReleaseList> {
        let url = self.releases_url(app_id)?;
        debug!(url = %url, "Fetching releases");

        let response = self
            .http_client
            .get(url.clone())
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, url = %url, "Releases request failed");
            return Err(UpdateError::Service {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let list: ReleaseList =
            serde_json::from_str(&body).map_err(|e| UpdateError::Decode(e.to_string()))?;

        debug!(count = list.releases.len(), "Releases fetched");
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mount_status, releases_endpoint, releases_path};
    use wiremock::MockServer;

    fn client_for(server: &MockServer) -> ReleasesClient {
        let endpoint = Url::parse(&releases_endpoint(server)).unwrap();
        ReleasesClient::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_release_decodes_camel_case() {
        let release: Release = serde_json::from_str(
            r#"{
                "displayVersion": "1.2.0",
                "buildVersion": "42",
                "releaseNotes": "Bug fixes",
                "downloadUrl": "https://example.com/build",
                "codeHash": "abc123",
                "latest": true,
                "unknownField": 7
            }"#,
        )
        .unwrap();

        assert_eq!(release.display_version.as_deref(), Some("1.2.0"));
        assert_eq!(release.build_version.as_deref(), Some("42"));
        assert_eq!(release.code_hash, "abc123");
        assert!(release.latest);
    }

    #[test]
    fn test_missing_releases_key_is_empty_list() {
        let list: ReleaseList = serde_json::from_str("{}").unwrap();
        assert!(list.releases.is_empty());
        assert!(list.latest().is_none());
    }

    #[test]
    fn test_latest_is_first_flagged_in_list_order() {
        let list: ReleaseList = serde_json::from_str(
            r#"{"releases": [
                {"codeHash": "a", "latest": false},
                {"codeHash": "b", "latest": true},
                {"codeHash": "c", "latest": true}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.latest().unwrap().code_hash, "b");
    }

    #[tokio::test]
    async fn test_releases_url_appends_app_id() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        assert_eq!(
            client.releases_url("1:123:ios:abc").unwrap().path(),
            "/v1alpha/devices/-/testerApps/1:123:ios:abc"
        );

        let trailing = ReleasesClient::new(
            Url::parse("https://example.com/releases/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            trailing.releases_url("app").unwrap().as_str(),
            "https://example.com/releases/app"
        );
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token() {
        let server = MockServer::start().await;
        mount_status(
            &server,
            "GET",
            &releases_path("app-1"),
            200,
            r#"{"releases": [{"codeHash": "x", "latest": true}]}"#,
        )
        .await;

        let list = client_for(&server)
            .fetch_releases("app-1", "token-1")
            .await
            .unwrap();

        assert_eq!(list.releases.len(), 1);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method.as_str(), "GET");
        let header = |name: &str| {
            requests[0]
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        assert_eq!(header("authorization").as_deref(), Some("Bearer token-1"));
        assert_eq!(header("accept").as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_non_200_is_service_error() {
        let server = MockServer::start().await;
        mount_status(
            &server,
            "GET",
            &releases_path("app-1"),
            403,
            r#"{"error": "forbidden"}"#,
        )
        .await;

        let result = client_for(&server).fetch_releases("app-1", "token").await;
        assert!(matches!(result, Err(UpdateError::Service { status: 403 })));
    }

    #[tokio::test]
    async fn test_other_success_status_is_service_error() {
        let server = MockServer::start().await;
        mount_status(&server, "GET", &releases_path("app-1"), 204, "").await;

        let result = client_for(&server).fetch_releases("app-1", "token").await;
        assert!(matches!(result, Err(UpdateError::Service { status: 204 })));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        mount_status(&server, "GET", &releases_path("app-1"), 200, r#"{"releases": "#).await;

        let result = client_for(&server).fetch_releases("app-1", "token").await;
        assert!(matches!(result, Err(UpdateError::Decode(_))));
    }
}
