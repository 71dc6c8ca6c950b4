//! Terminal branch picker

use std::io::IsTerminal;
use std::sync::Arc;

use async_trait::async_trait;
use inquire::{InquireError, Select};

use crate::config::OutputFormat;
use crate::error::{Result, ShellError};
use crate::ports::BranchPicker;

/// Blocking prompt: message and options in, chosen option out
type PromptFn = dyn Fn(&str, Vec<String>) -> Result<String> + Send + Sync;

/// [`BranchPicker`] prompting on the controlling terminal
pub struct TerminalPicker {
    interactive: bool,
    prompt: Arc<PromptFn>,
}

impl TerminalPicker {
    /// Interactive only for human output with both stdin and stdout on a
    /// terminal
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self::with_terminal(
            format,
            std::io::stdin().is_terminal() && std::io::stdout().is_terminal(),
        )
    }

    #[must_use]
    pub fn with_terminal(format: OutputFormat, terminal: bool) -> Self {
        Self {
            interactive: terminal && matches!(format, OutputFormat::Human),
            prompt: Arc::new(select_branch),
        }
    }
}

fn select_branch(message: &str, options: Vec<String>) -> Result<String> {
    Select::new(message, options).prompt().map_err(|e| match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            ShellError::Cancelled
        }
        other => ShellError::Io(std::io::Error::other(other.to_string())),
    })
}

#[async_trait]
impl BranchPicker for TerminalPicker {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// The prompt owns the terminal until answered, so it runs on the
    /// blocking pool; signal handling keeps running meanwhile.
    async fn pick(&self, database: &str, branches: &[String]) -> Result<String> {
        let prompt = Arc::clone(&self.prompt);
        let message = format!("Select a branch of {database}:");
        let options = branches.to_vec();

        tokio::task::spawn_blocking(move || prompt(&message, options))
            .await
            .map_err(|e| ShellError::Io(std::io::Error::other(format!("branch prompt failed: {e}"))))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_json_output_is_never_interactive() {
        assert!(!TerminalPicker::with_terminal(OutputFormat::Json, true).is_interactive());
    }

    #[test]
    fn test_no_terminal_is_not_interactive() {
        assert!(!TerminalPicker::with_terminal(OutputFormat::Human, false).is_interactive());
    }

    #[test]
    fn test_human_on_terminal_is_interactive() {
        assert!(TerminalPicker::with_terminal(OutputFormat::Human, true).is_interactive());
    }

    #[tokio::test]
    async fn test_prompt_does_not_block_the_runtime() {
        // The prompt waits for an answer that only a task on the same
        // single-threaded runtime can send
        let (answer_tx, answer_rx) = mpsc::channel::<String>();
        let answer_rx = Mutex::new(answer_rx);
        let picker = TerminalPicker {
            interactive: true,
            prompt: Arc::new(move |message: &str, options: Vec<String>| {
                assert_eq!(message, "Select a branch of shop:");
                assert_eq!(options, ["main", "dev"]);
                answer_rx
                    .lock()
                    .unwrap()
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(|e| ShellError::Io(std::io::Error::other(e.to_string())))
            }),
        };

        let answer = tokio::spawn(async move {
            tokio::task::yield_now().await;
            answer_tx.send("dev".to_string()).unwrap();
        });

        let picked = picker
            .pick("shop", &["main".to_string(), "dev".to_string()])
            .await
            .unwrap();
        assert_eq!(picked, "dev");
        answer.await.unwrap();
    }

    #[tokio::test]
    async fn test_prompt_cancellation_is_propagated() {
        let picker = TerminalPicker {
            interactive: true,
            prompt: Arc::new(|_: &str, _: Vec<String>| Err(ShellError::Cancelled)),
        };
        let err = picker.pick("shop", &["main".to_string()]).await.unwrap_err();
        assert!(matches!(err, ShellError::Cancelled));
    }
}
