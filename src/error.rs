use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The completion backend answered with a non-success status.
    #[error("completion backend responded with {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("conversation store error: {0}")]
    Store(Box<dyn StdError + Send + Sync>),
}

impl ChatError {
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        ChatError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}
