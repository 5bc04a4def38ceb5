//! Client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(String),

    /// A non-2xx response; `message` is the server's explanation.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("invalid response: {0}")]
    Parse(String),

    #[error("session file error: {0}")]
    Session(String),

    #[error("unable to pack project: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

impl From<ClientError> for cloudbuild_core::Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized(message) => cloudbuild_core::Error::Unauthorized(message),
            ClientError::Io(e) => cloudbuild_core::Error::Io(e),
            other => cloudbuild_core::Error::Remote(other.to_string()),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
