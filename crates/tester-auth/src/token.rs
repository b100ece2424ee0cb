//! Token endpoint requests: authorization-code exchange and refresh.

use crate::pkce::PkceVerifier;
use crate::{AuthError, AuthResult};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tester_storage::Session;
use tracing::{debug, warn};

/// Used when the provider omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// OAuth error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// Raw outcome of a token endpoint call, before it is classified.
enum TokenCall {
    Issued(TokenResponse),
    Rejected { status: u16, error: Option<String> },
}

async fn post_token_request(
    http_client: &reqwest::Client,
    token_endpoint: &str,
    params: &[(&str, &str)],
) -> AuthResult<TokenCall> {
    let response = http_client
        .post(token_endpoint)
        .header("Accept", "application/json")
        .form(params)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let error = serde_json::from_str::<TokenErrorResponse>(&body)
            .ok()
            .map(|e| e.error);
        warn!(
            status = %status,
            error = ?error,
            body_summary = %summarize_response_body(&body),
            "Token endpoint rejected request"
        );
        return Ok(TokenCall::Rejected {
            status: status.as_u16(),
            error,
        });
    }

    Ok(TokenCall::Issued(serde_json::from_str(&body)?))
}

fn describe_rejection(status: u16, error: Option<String>) -> String {
    match error {
        Some(error) => format!("HTTP {}: {}", status, error),
        None => format!("HTTP {}", status),
    }
}

/// Exchange an authorization code for a complete session.
pub async fn exchange_code(
    http_client: &reqwest::Client,
    token_endpoint: &str,
    issuer: &str,
    client_id: &str,
    redirect_uri: &str,
    code: &str,
    verifier: &PkceVerifier,
) -> AuthResult<Session> {
    debug!(url = %token_endpoint, "Exchanging authorization code");

    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("client_id", client_id),
        ("code_verifier", verifier.as_str()),
    ];

    let issued = match post_token_request(http_client, token_endpoint, &params).await {
        Ok(TokenCall::Issued(issued)) => issued,
        Ok(TokenCall::Rejected { status, error }) => {
            return Err(AuthError::Authorization(format!(
                "code exchange failed: {}",
                describe_rejection(status, error)
            )))
        }
        Err(e) => return Err(AuthError::Authorization(format!("code exchange failed: {}", e))),
    };

    let id_token = issued
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::Authorization("token response has no id_token".to_string()))?;
    let refresh_token = issued
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            AuthError::Authorization("token response has no refresh_token".to_string())
        })?;

    Ok(Session {
        access_token: issued.access_token,
        id_token,
        refresh_token,
        expires_at: Utc::now()
            + Duration::seconds(issued.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)),
        token_type: issued.token_type.unwrap_or_else(|| "Bearer".to_string()),
        scope: issued.scope,
        token_endpoint: token_endpoint.to_string(),
        issuer: issuer.to_string(),
    })
}

/// Refresh `session`'s access token. Tokens the provider does not rotate are kept.
pub async fn refresh_session(
    http_client: &reqwest::Client,
    client_id: &str,
    session: &Session,
) -> AuthResult<Session> {
    debug!(url = %session.token_endpoint, "Refreshing access token");

    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", session.refresh_token.as_str()),
        ("client_id", client_id),
    ];

    let issued = match post_token_request(http_client, &session.token_endpoint, &params).await? {
        TokenCall::Issued(issued) => issued,
        TokenCall::Rejected { status, .. } if status >= 500 => {
            return Err(AuthError::ServerError(status))
        }
        TokenCall::Rejected { status, error } => {
            return Err(AuthError::TokenRefresh(describe_rejection(status, error)))
        }
    };

    Ok(Session {
        access_token: issued.access_token,
        id_token: issued
            .id_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| session.id_token.clone()),
        refresh_token: issued
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| session.refresh_token.clone()),
        expires_at: Utc::now()
            + Duration::seconds(issued.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)),
        token_type: issued
            .token_type
            .unwrap_or_else(|| session.token_type.clone()),
        scope: issued.scope.or_else(|| session.scope.clone()),
        token_endpoint: session.token_endpoint.clone(),
        issuer: session.issuer.clone(),
    })
}
