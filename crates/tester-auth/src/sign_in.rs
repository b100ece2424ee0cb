//! Interactive OAuth sign-in: discovery, browser challenge, code exchange.

use crate::challenge::{ChallengeOutcome, ChallengeRegistry};
use crate::discovery::{discover, ProviderMetadata};
use crate::flow_fsm::{SignInMachine, SignInMachineInput, SignInStage};
use crate::pkce::{generate_state, PkceVerifier, CHALLENGE_METHOD};
use crate::token::exchange_code;
use crate::{AuthError, AuthResult};
use std::sync::Arc;
use std::time::Duration;
use tester_config_and_utils::Config;
use tester_storage::Session;
use tracing::{debug, info, warn};
use url::Url;

/// Shows the authorization URL to the user.
///
/// Mobile hosts open a system browser session; the CLI prints the URL.
/// Returning an error aborts the attempt.
pub trait BrowserPresenter: Send + Sync {
    fn present(&self, authorization_url: &Url) -> AuthResult<()>;
}

/// Callback invoked on each sign-in stage change.
pub type StageCallback = Arc<dyn Fn(SignInStage) + Send + Sync>;

/// OAuth client parameters for the tester identity provider.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub issuer: Url,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub redirect_uri: Url,
    pub request_timeout: Duration,
    pub sign_in_timeout: Duration,
}

impl OAuthSettings {
    pub fn from_config(config: &Config) -> AuthResult<Self> {
        let issuer = config
            .issuer()
            .map_err(|e| AuthError::Config(e.to_string()))?;
        let redirect_uri = Url::parse(&config.redirect_uri())
            .map_err(|e| AuthError::Config(format!("invalid redirect URI: {}", e)))?;

        Ok(Self {
            issuer,
            client_id: config.client_id.clone(),
            scopes: config.scopes(),
            redirect_uri,
            request_timeout: config.request_timeout(),
            sign_in_timeout: config.sign_in_timeout(),
        })
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Build the authorization request URL for one challenge.
pub fn authorization_url(
    metadata: &ProviderMetadata,
    settings: &OAuthSettings,
    state: &str,
    verifier: &PkceVerifier,
) -> AuthResult<Url> {
    let mut url = Url::parse(&metadata.authorization_endpoint)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", settings.redirect_uri.as_str())
        .append_pair("scope", &settings.scope())
        .append_pair("state", state)
        .append_pair("code_challenge", &verifier.challenge())
        .append_pair("code_challenge_method", CHALLENGE_METHOD);
    Ok(url)
}

/// Pull the authorization code out of the redirect, surfacing provider errors.
fn authorization_code(redirect: &Url) -> AuthResult<String> {
    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in redirect.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let message = match description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        };
        return Err(AuthError::Authorization(message));
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::Authorization("redirect carried no authorization code".to_string()))
}

/// One sign-in attempt. Consumed by [`SignInFlow::run`].
pub struct SignInFlow<'a> {
    http_client: &'a reqwest::Client,
    settings: &'a OAuthSettings,
    challenges: &'a ChallengeRegistry,
    machine: SignInMachine,
    on_stage: Option<StageCallback>,
}

impl<'a> SignInFlow<'a> {
    pub fn new(
        http_client: &'a reqwest::Client,
        settings: &'a OAuthSettings,
        challenges: &'a ChallengeRegistry,
    ) -> Self {
        Self {
            http_client,
            settings,
            challenges,
            machine: SignInMachine::new(),
            on_stage: None,
        }
    }

    pub fn with_stage_callback(mut self, callback: Option<StageCallback>) -> Self {
        self.on_stage = callback;
        self
    }

    pub fn stage(&self) -> SignInStage {
        SignInStage::from(self.machine.state())
    }

    fn transition(&mut self, input: SignInMachineInput) -> AuthResult<()> {
        let from = self.stage();
        self.machine.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!("Cannot apply {:?} in state {:?}", input, from))
        })?;

        let to = self.stage();
        debug!(from = ?from, to = ?to, "Sign-in stage transition");
        if let Some(callback) = &self.on_stage {
            callback(to);
        }
        Ok(())
    }

    /// Run the attempt to completion and return the issued session. Persisting
    /// it is left to the caller.
    pub async fn run(mut self, presenter: &dyn BrowserPresenter) -> AuthResult<Session> {
        self.transition(SignInMachineInput::Start)?;

        let metadata = match discover(self.http_client, &self.settings.issuer).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "Sign-in failed during discovery");
                self.transition(SignInMachineInput::DiscoveryFailed)?;
                return Err(e);
            }
        };
        if !metadata.code_challenge_methods_supported.is_empty()
            && !metadata
                .code_challenge_methods_supported
                .iter()
                .any(|m| m == CHALLENGE_METHOD)
        {
            warn!("Provider does not advertise S256 PKCE, sending it anyway");
        }
        self.transition(SignInMachineInput::ConfigDiscovered)?;

        let verifier = PkceVerifier::generate();
        let code = match self.await_challenge(&metadata, &verifier, presenter).await {
            Ok(code) => code,
            Err(e) => {
                info!(error = %e, "Sign-in challenge did not complete");
                self.transition(SignInMachineInput::ChallengeAborted)?;
                return Err(e);
            }
        };
        self.transition(SignInMachineInput::RedirectReceived)?;

        let exchanged = exchange_code(
            self.http_client,
            &metadata.token_endpoint,
            &metadata.issuer,
            &self.settings.client_id,
            self.settings.redirect_uri.as_str(),
            &code,
            &verifier,
        )
        .await;

        match exchanged {
            Ok(session) => {
                self.transition(SignInMachineInput::TokensIssued)?;
                info!(expires_at = %session.expires_at, "Sign-in complete");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Authorization code exchange failed");
                self.transition(SignInMachineInput::ExchangeFailed)?;
                Err(e)
            }
        }
    }

    async fn await_challenge(
        &self,
        metadata: &ProviderMetadata,
        verifier: &PkceVerifier,
        presenter: &dyn BrowserPresenter,
    ) -> AuthResult<String> {
        let state = generate_state();
        let url = authorization_url(metadata, self.settings, &state, verifier)?;
        let ticket = self
            .challenges
            .begin(state.clone(), self.settings.redirect_uri.clone());

        if let Err(e) = presenter.present(&url) {
            self.challenges.release(&state);
            return Err(e);
        }

        let outcome = match tokio::time::timeout(self.settings.sign_in_timeout, ticket.outcome()).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                self.challenges.release(&state);
                warn!(
                    timeout_secs = self.settings.sign_in_timeout.as_secs(),
                    "Sign-in challenge timed out"
                );
                return Err(AuthError::Timeout);
            }
        };

        match outcome {
            Some(ChallengeOutcome::Redirect(redirect)) => authorization_code(&redirect),
            Some(ChallengeOutcome::Cancelled) => Err(AuthError::Cancelled),
            Some(ChallengeOutcome::Superseded) => Err(AuthError::Superseded),
            None => Err(AuthError::Authorization(
                "challenge ended without an outcome".to_string(),
            )),
        }
    }
}
