// ================================================================
// File: zeddybot-common/src/error.rs
// ================================================================

use thiserror::Error;

/// Failures of the credential lifecycle. Cloneable so that a single
/// refresh outcome can be handed to every caller that waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No credential on record; reauthorize the bot account")]
    NoCredential,

    #[error("Token refresh failed (reauthorize required): {reason}")]
    RefreshFailed { reason: String },

    #[error("Upstream authority unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Credential store unavailable: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found error: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Subscriber {0} overflowed its buffer")]
    SubscriberOverflow(String),

    #[error("Chat send error: {0}")]
    ChatSend(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
