//! Fixtures shared by this crate's tests.

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tester_auth::{AuthResult, BrowserPresenter, ChallengeRegistry};
use tester_storage::Session;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RELEASES_ENDPOINT_PATH: &str = "/v1alpha/devices/-/testerApps";
pub const TOKEN_PATH: &str = "/token";

pub fn releases_path(app_id: &str) -> String {
    format!("{}/{}", RELEASES_ENDPOINT_PATH, app_id)
}

pub fn releases_endpoint(server: &MockServer) -> String {
    format!("{}{}", server.uri(), RELEASES_ENDPOINT_PATH)
}

fn session_for(server: &MockServer, access_token: &str, expires_in_secs: i64) -> Session {
    Session {
        access_token: access_token.to_string(),
        id_token: format!("id-{}", access_token),
        refresh_token: "stored-refresh".to_string(),
        expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        token_type: "Bearer".to_string(),
        scope: Some("openid profile".to_string()),
        token_endpoint: format!("{}{}", server.uri(), TOKEN_PATH),
        issuer: server.uri(),
    }
}

pub fn valid_session(server: &MockServer) -> Session {
    session_for(server, "valid-access", 3600)
}

pub fn expired_session(server: &MockServer) -> Session {
    session_for(server, "expired-access", -120)
}

pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}{}", server.uri(), TOKEN_PATH),
            "code_challenge_methods_supported": ["S256"],
        })))
        .mount(server)
        .await;
}

pub async fn mount_tokens(server: &MockServer, access_token: &str, refresh_token: Option<&str>) {
    let mut body = json!({
        "access_token": access_token,
        "id_token": format!("id-{}", access_token),
        "token_type": "Bearer",
        "expires_in": 3600,
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, verb: &str, route: &str, status: u16, body: &str) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

pub async fn total_hits(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// `Authorization` header of the first request received on `route`.
pub async fn authorization_sent(server: &MockServer, route: &str) -> Option<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .find(|r| r.url.path() == route)
        .and_then(|r| r.headers.get("authorization"))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Fails the test if a sign-in is attempted.
pub struct PanickingPresenter;

impl BrowserPresenter for PanickingPresenter {
    fn present(&self, authorization_url: &Url) -> AuthResult<()> {
        panic!("unexpected sign-in prompt for {}", authorization_url);
    }
}

/// Answers the challenge as soon as it is presented, like a user who
/// completes (or dismisses) the browser page immediately.
pub struct AutoRedirectPresenter {
    challenges: Arc<ChallengeRegistry>,
    code: Option<String>,
}

impl AutoRedirectPresenter {
    pub fn new(challenges: Arc<ChallengeRegistry>, code: &str) -> Self {
        Self {
            challenges,
            code: Some(code.to_string()),
        }
    }

    pub fn cancelling(challenges: Arc<ChallengeRegistry>) -> Self {
        Self {
            challenges,
            code: None,
        }
    }
}

impl BrowserPresenter for AutoRedirectPresenter {
    fn present(&self, authorization_url: &Url) -> AuthResult<()> {
        let Some(code) = &self.code else {
            self.challenges.cancel_pending();
            return Ok(());
        };

        let pairs: Vec<(String, String)> = authorization_url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let lookup = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        let mut redirect = Url::parse(&lookup("redirect_uri")).unwrap();
        redirect
            .query_pairs_mut()
            .append_pair("code", code)
            .append_pair("state", &lookup("state"));
        assert!(self.challenges.deliver_redirect(redirect.as_str()));
        Ok(())
    }
}
