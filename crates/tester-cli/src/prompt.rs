//! Terminal implementations of the browser presenter and consent prompt.

use async_trait::async_trait;
use std::sync::Arc;
use tester_auth::{AuthResult, BrowserPresenter, ChallengeRegistry};
use tester_updater::ConsentPrompt;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Line reader over stdin shared by every prompt, so buffered input is never lost.
#[derive(Clone)]
pub struct StdinLines {
    lines: Arc<Mutex<Lines<BufReader<Stdin>>>>,
}

impl StdinLines {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines())),
        }
    }

    /// Next trimmed line, or `None` at end of input.
    pub async fn next_line(&self) -> Option<String> {
        match self.lines.lock().await.next_line().await {
            Ok(line) => line.map(|l| l.trim().to_string()),
            Err(e) => {
                warn!(error = %e, "Failed to read from stdin");
                None
            }
        }
    }
}

impl Default for StdinLines {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints the authorization URL and reads the redirect URL back from stdin.
pub struct TerminalPresenter {
    input: StdinLines,
    challenges: Arc<ChallengeRegistry>,
}

impl TerminalPresenter {
    pub fn new(input: StdinLines, challenges: Arc<ChallengeRegistry>) -> Self {
        Self { input, challenges }
    }
}

impl BrowserPresenter for TerminalPresenter {
    fn present(&self, authorization_url: &Url) -> AuthResult<()> {
        println!("Open this URL in a browser and sign in:\n\n  {}\n", authorization_url);
        println!("Then paste the URL you were redirected to (empty line cancels):");

        let input = self.input.clone();
        let challenges = self.challenges.clone();
        tokio::spawn(async move {
            loop {
                match input.next_line().await {
                    Some(line) if line.is_empty() => {
                        challenges.cancel_pending();
                        return;
                    }
                    Some(line) => {
                        if challenges.deliver_redirect(&line) {
                            return;
                        }
                        if !challenges.has_pending() {
                            debug!("Challenge no longer pending, stop reading redirects");
                            return;
                        }
                        println!("That URL does not belong to this sign-in, try again:");
                    }
                    None => {
                        challenges.cancel_pending();
                        return;
                    }
                }
            }
        });
        Ok(())
    }
}

/// y/N question on the terminal.
pub struct TerminalConsent {
    input: StdinLines,
}

impl TerminalConsent {
    pub fn new(input: StdinLines) -> Self {
        Self { input }
    }
}

#[async_trait]
impl ConsentPrompt for TerminalConsent {
    async fn request_in_app_alerts(&self) -> bool {
        println!("Sign in to get alerts about new builds? [y/N]");
        matches!(
            self.input.next_line().await.as_deref(),
            Some("y" | "Y" | "yes" | "Yes")
        )
    }
}
