//! Error types for the note hub.

use crate::types::NoteId;
use thiserror::Error;

/// Main error type for hub operations.
#[derive(Debug, Error)]
pub enum NoteError {
    #[error("Note not found: {0}")]
    NotFound(NoteId),

    #[error("Topic is closed: {0}")]
    TopicClosed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for NoteError {
    fn from(e: serde_json::Error) -> Self {
        NoteError::Serialization(e.to_string())
    }
}

/// Result type for hub operations.
pub type Result<T> = std::result::Result<T, NoteError>;
