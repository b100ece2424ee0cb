//! New-build alerts for app testers.
//!
//! [`SessionRegistry`] owns one [`TesterSession`] per host app context. A
//! session signs the tester in through [`tester_auth`], fetches the app's
//! releases and compares the latest release's code hash with the running
//! build's [`BinaryIdentity`].

mod checker;
mod consent;
mod error;
mod facade;
mod identity;
mod registry;
mod releases;

#[cfg(test)]
mod test_support;

pub use checker::UpdateChecker;
pub use consent::{ConsentPrompt, StaticConsent};
pub use error::{UpdateError, UpdateResult};
pub use facade::TesterSession;
pub use identity::{BinaryIdentity, ExecutableSha256Identity, StaticIdentity};
pub use registry::{
    HostContext, SessionRegistry, DEFAULT_CONTEXT_NAME, LIBRARY_NAME, LIBRARY_VERSION,
};
pub use releases::{Release, ReleaseList, ReleasesClient};
