//! Subcommand handlers. Each builds a tester session over the CLI's file storage.

use crate::prompt::{StdinLines, TerminalConsent, TerminalPresenter};
use std::sync::Arc;
use tester_auth::SignInStage;
use tester_config_and_utils::{Config, Paths};
use tester_storage::FileStorage;
use tester_updater::{
    BinaryIdentity, ExecutableSha256Identity, HostContext, SessionRegistry, StaticIdentity,
    TesterSession, UpdateResult, DEFAULT_CONTEXT_NAME,
};
use tokio::runtime::Handle;
use tracing::info;

fn open_session(
    config: Config,
    paths: &Paths,
    identity: Arc<dyn BinaryIdentity>,
) -> UpdateResult<Arc<TesterSession>> {
    paths.ensure_dirs()?;

    let registry = SessionRegistry::new();
    let input = StdinLines::new();
    let presenter = TerminalPresenter::new(input.clone(), registry.redirect_handler());

    let host = HostContext::new(
        DEFAULT_CONTEXT_NAME,
        config,
        Arc::new(FileStorage::new(paths.secrets_file())),
        Arc::new(presenter),
        Arc::new(TerminalConsent::new(input)),
        identity,
        Handle::current(),
    )
    .with_stage_callback(Arc::new(|stage| {
        if stage == SignInStage::ExchangingCode {
            eprintln!("Completing sign-in...");
        }
    }));
    registry.configure(host);
    registry.session()
}

fn executable_identity() -> Arc<dyn BinaryIdentity> {
    Arc::new(ExecutableSha256Identity::current())
}

pub fn status(config: Config, paths: &Paths) -> UpdateResult<()> {
    let app_id = config.app_id.clone();
    let session = open_session(config, paths, executable_identity())?;

    match session.session()? {
        Some(stored) => {
            println!("Signed in");
            println!("  issuer:     {}", stored.issuer);
            println!("  expires at: {}", stored.expires_at);
            if stored.is_expired() {
                println!("  (access token expired, it is refreshed on the next check)");
            }
        }
        None => println!("Not signed in"),
    }
    println!("  app id:     {}", app_id);
    Ok(())
}

pub async fn sign_in(config: Config, paths: &Paths) -> UpdateResult<()> {
    let session = open_session(config, paths, executable_identity())?;
    session.sign_in().await?;
    println!("Signed in");
    Ok(())
}

pub fn sign_out(config: Config, paths: &Paths) -> UpdateResult<()> {
    let session = open_session(config, paths, executable_identity())?;
    session.sign_out()?;
    println!("Signed out");
    Ok(())
}

pub async fn check(config: Config, paths: &Paths, code_hash: Option<String>) -> UpdateResult<()> {
    let identity: Arc<dyn BinaryIdentity> = match code_hash {
        Some(hash) => Arc::new(StaticIdentity::new(hash)),
        None => executable_identity(),
    };
    let session = open_session(config, paths, identity)?;

    match session.check_for_update().await? {
        Some(release) => {
            info!(code_hash = %release.code_hash, "Update available");
            println!("A new build is available");
            if let Some(version) = &release.display_version {
                match &release.build_version {
                    Some(build) => println!("  version: {} ({})", version, build),
                    None => println!("  version: {}", version),
                }
            }
            if let Some(notes) = &release.release_notes {
                println!("  notes:   {}", notes);
            }
            if let Some(url) = &release.download_url {
                println!("  install: {}", url);
            }
        }
        None => println!("No new build"),
    }
    Ok(())
}
