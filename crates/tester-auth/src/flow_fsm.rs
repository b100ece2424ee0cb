//! Sign-in flow state machine using rust-fsm.
//!
//! One machine is created per sign-in attempt.
//!
//! ## State Diagram
//!
//! ```text
//!        Idle
//!         │ Start
//!         ▼
//!  DiscoveringConfig ── DiscoveryFailed ──────────────┐
//!         │ ConfigDiscovered                          │
//!         ▼                                           │
//!  AwaitingUserChallenge ── ChallengeAborted ─────────┤
//!         │ RedirectReceived                          │
//!         ▼                                           ▼
//!  ExchangingCode ── ExchangeFailed ──────────────► Failed
//!         │ TokensIssued
//!         ▼
//!      Complete
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub sign_in_flow(Idle)

    Idle => {
        Start => DiscoveringConfig
    },
    DiscoveringConfig => {
        ConfigDiscovered => AwaitingUserChallenge,
        DiscoveryFailed => Failed
    },
    AwaitingUserChallenge => {
        RedirectReceived => ExchangingCode,
        // Cancelled, superseded, timed out or the browser could not be shown
        ChallengeAborted => Failed
    },
    ExchangingCode => {
        TokensIssued => Complete,
        ExchangeFailed => Failed
    }
}

pub use sign_in_flow::Input as SignInMachineInput;
pub use sign_in_flow::State as SignInMachineState;
pub use sign_in_flow::StateMachine as SignInMachine;

/// Sign-in progress for host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInStage {
    Idle,
    DiscoveringConfig,
    AwaitingUserChallenge,
    ExchangingCode,
    Complete,
    Failed,
}

impl From<&SignInMachineState> for SignInStage {
    fn from(state: &SignInMachineState) -> Self {
        match state {
            SignInMachineState::Idle => SignInStage::Idle,
            SignInMachineState::DiscoveringConfig => SignInStage::DiscoveringConfig,
            SignInMachineState::AwaitingUserChallenge => SignInStage::AwaitingUserChallenge,
            SignInMachineState::ExchangingCode => SignInStage::ExchangingCode,
            SignInMachineState::Complete => SignInStage::Complete,
            SignInMachineState::Failed => SignInStage::Failed,
        }
    }
}
