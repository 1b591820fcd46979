//! parley-client: Conversation client for a streaming agent server
//!
//! This crate keeps a reconnecting WebSocket connection to the server, folds
//! the streamed events into an ordered message list, and publishes read-only
//! views of that state to consumers.

pub mod backoff;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod transport;
pub mod view;

#[cfg(test)]
mod proptests;

pub use backoff::BackoffPolicy;
pub use error::{Error, Result};
pub use reconciler::Reconciler;
pub use session::{ChatConfig, ChatSession, DEFAULT_URL};
pub use transport::{ConnectionStatus, Connector, Transport, WsConnector};
pub use view::ChatView;
