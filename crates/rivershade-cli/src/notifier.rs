// ABOUTME: Terminal notifier: info to stdout, errors to stderr, confirmations via dialoguer.
// ABOUTME: `--yes` bypasses prompts so scripted runs never block.

use async_trait::async_trait;
use rivershade_core::Notifier;
use tracing::warn;

pub struct ConsoleNotifier {
    assume_yes: bool,
}

impl ConsoleNotifier {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("{message}");
    }

    async fn confirm(&self, prompt: &str, accept_label: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let prompt = format!("{prompt} ({accept_label}?)");
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await;
        match answer {
            Ok(Ok(yes)) => yes,
            Ok(Err(e)) => {
                warn!(error = %e, "confirmation prompt failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "confirmation task failed");
                false
            }
        }
    }
}
