//! Terminal prompts.

use async_trait::async_trait;
use cloudbuild_core::prompt::{PromptError, Prompter};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use std::io::{BufRead, IsTerminal};

/// Answer assumed when the user just presses Enter.
const CONFIRM_DEFAULT: bool = false;

/// Prompts on the controlling terminal, or reads plain lines from stdin
/// when it is not a terminal.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn interactive() -> bool {
        std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
    }
}

fn from_dialoguer(err: dialoguer::Error) -> PromptError {
    match err {
        dialoguer::Error::IO(e) => e.into(),
    }
}

fn parse_confirmation(answer: &str) -> bool {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => CONFIRM_DEFAULT,
    }
}

fn read_stdin_line() -> Result<String, PromptError> {
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(PromptError::Closed);
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

async fn blocking<T, F>(f: F) -> Result<T, PromptError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PromptError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PromptError::Io(e.to_string()))?
}

#[async_trait]
impl Prompter for TerminalPrompter {
    async fn read_line(&self, label: &str, hidden: bool) -> Result<String, PromptError> {
        let label = label.to_string();
        if !Self::interactive() {
            return blocking(read_stdin_line).await;
        }

        blocking(move || {
            let theme = ColorfulTheme::default();
            if hidden {
                Password::with_theme(&theme)
                    .with_prompt(label)
                    .allow_empty_password(true)
                    .interact()
                    .map_err(from_dialoguer)
            } else {
                Input::<String>::with_theme(&theme)
                    .with_prompt(label)
                    .interact_text()
                    .map_err(from_dialoguer)
            }
        })
        .await
    }

    async fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        let question = question.to_string();
        if !Self::interactive() {
            return blocking(|| {
                let answer = read_stdin_line()?;
                Ok(parse_confirmation(&answer))
            })
            .await;
        }

        blocking(move || {
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(question)
                .default(CONFIRM_DEFAULT)
                .interact()
                .map_err(from_dialoguer)
        })
        .await
    }
}
