//! Error types for the triage core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LensError {
    #[error("malformed capture event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    #[error("unrecognized command: {0}")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, LensError>;
