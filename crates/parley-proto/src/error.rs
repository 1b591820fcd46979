//! Error types for parley-proto

use thiserror::Error;

/// Result type alias using the decode error
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Reasons an inbound frame could not be turned into a [`crate::ServerEvent`]
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Frame is not valid JSON, or a known event kind has missing/mistyped fields
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// Object carries neither a `type` tag nor a legacy `error` field
    #[error("Frame has no event type")]
    MissingKind,

    /// `type` tag names an event this client does not know
    #[error("Unknown event type: {0}")]
    UnknownKind(String),
}

impl DecodeError {
    /// Whether the frame was structurally broken (as opposed to well-formed but unrecognized)
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DecodeError::UnknownKind(_))
    }
}
