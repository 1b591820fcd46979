//! Error types for parley-client

use thiserror::Error;

/// Result type alias using parley-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the client side of a conversation
#[derive(Error, Debug)]
pub enum Error {
    /// Send attempted while the transport is not connected
    #[error("Not connected")]
    NotConnected,

    /// Submission was empty or whitespace only
    #[error("Message content is empty")]
    EmptyMessage,

    /// Outbound payload could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// WebSocket protocol or I/O failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection ended while a write was in flight
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the transport will recover from this error on its own by reconnecting
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::NotConnected | Error::WebSocket(_) | Error::ConnectionClosed
        )
    }
}
