//! Interactive prompt abstraction.
//!
//! The terminal implementation lives in the CLI; flows only see this trait so
//! they can be driven by scripted prompters in tests.

use async_trait::async_trait;
use thiserror::Error;

/// Failure to obtain a line of interactive input.
#[derive(Debug, Clone, Error)]
pub enum PromptError {
    #[error("input stream closed")]
    Closed,

    #[error("input error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => PromptError::Closed,
            _ => PromptError::Io(err.to_string()),
        }
    }
}

/// Source of interactive answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Read one line. When `hidden` is true the input is not echoed.
    async fn read_line(&self, label: &str, hidden: bool) -> Result<String, PromptError>;

    /// Ask a yes/no question.
    async fn confirm(&self, question: &str) -> Result<bool, PromptError>;
}
