//! Mock identity provider endpoints for tests.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const TOKEN_PATH: &str = "/token";

/// Serve a discovery document whose endpoints point back at `server`.
pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": server.uri(),
            "authorization_endpoint": format!("{}/authorize", server.uri()),
            "token_endpoint": format!("{}{}", server.uri(), TOKEN_PATH),
            "code_challenge_methods_supported": ["S256"],
        })))
        .mount(server)
        .await;
}

/// Serve a successful token response. The id token is `id-<access_token>`.
pub async fn mount_tokens(
    server: &MockServer,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: i64,
) {
    let mut body = json!({
        "access_token": access_token,
        "id_token": format!("id-{}", access_token),
        "token_type": "Bearer",
        "expires_in": expires_in,
        "scope": "openid profile",
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

/// Answer `verb route` with `status` and a raw body.
pub async fn mount_status(server: &MockServer, verb: &str, route: &str, status: u16, body: &str) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Bodies of the requests received on `route`, in arrival order.
pub async fn request_bodies(server: &MockServer, route: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect()
}

pub async fn hits(server: &MockServer, route: &str) -> usize {
    request_bodies(server, route).await.len()
}

pub async fn total_hits(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}
