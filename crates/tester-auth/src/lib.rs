//! Tester authentication for the app-tester SDK.
//!
//! This crate provides:
//! - OAuth authorization-code sign-in with OIDC discovery and PKCE
//! - A single-slot registry for the pending browser challenge, fed by the
//!   host's redirect interception
//! - Session management with token refresh backed by [`tester_storage`]
//! - Explicit FSM-based sign-in progress

mod challenge;
mod discovery;
mod error;
mod flow_fsm;
mod pkce;
mod session;
mod sign_in;
mod token;

#[cfg(test)]
mod test_support;

pub use challenge::{ChallengeOutcome, ChallengeRegistry, ChallengeTicket};
pub use discovery::{discover, discovery_url, ProviderMetadata};
pub use error::{AuthError, AuthResult};
pub use flow_fsm::sign_in_flow;
pub use flow_fsm::{SignInMachine, SignInMachineInput, SignInMachineState, SignInStage};
pub use pkce::{generate_state, PkceVerifier, CHALLENGE_METHOD};
pub use session::{RefreshConfig, SessionManager};
pub use sign_in::{authorization_url, BrowserPresenter, OAuthSettings, SignInFlow, StageCallback};
pub use token::{exchange_code, refresh_session};
