//! App tester CLI - sign in as a tester and check for new builds.

mod commands;
mod prompt;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tester_config_and_utils::{init_logging, Config, Paths};

/// App tester command-line interface.
#[derive(Parser)]
#[command(name = "app-tester")]
#[command(about = "Sign in as an app tester and check for new builds")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and session files. Defaults to ~/.app-tester
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// App whose releases are checked
    #[arg(long, env = "APP_TESTER_APP_ID", global = true)]
    app_id: Option<String>,

    /// Bundle identifier the redirect URI is derived from
    #[arg(long, env = "APP_TESTER_BUNDLE_ID", global = true)]
    bundle_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether a tester is signed in
    Status,
    /// Sign in through the browser
    SignIn,
    /// Forget the stored session
    SignOut,
    /// Check whether a newer build is available
    Check {
        /// Code hash of the installed build. Defaults to the hash of this executable
        #[arg(long)]
        code_hash: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;

    init_logging(log_level(cli.log_level.as_deref(), &config));
    if let Some(app_id) = cli.app_id {
        config.app_id = app_id;
    }
    if let Some(bundle_id) = cli.bundle_id {
        config.bundle_id = bundle_id;
    }

    match cli.command {
        Commands::Status => commands::status(config, &paths)?,
        Commands::SignIn => commands::sign_in(config, &paths).await?,
        Commands::SignOut => commands::sign_out(config, &paths)?,
        Commands::Check { code_hash } => commands::check(config, &paths, code_hash).await?,
    }

    Ok(())
}

/// The `--log-level` flag wins over the file and `APP_TESTER_LOG_LEVEL`.
fn log_level<'a>(flag: Option<&'a str>, config: &'a Config) -> &'a str {
    flag.unwrap_or(&config.log_level)
}
