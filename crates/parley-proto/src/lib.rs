//! parley-proto: Wire protocol for the parley conversation client
//!
//! This crate defines the JSON frames exchanged with the conversational agent
//! server: the message/part data model, the closed set of server events, the
//! outbound request, and the decoder that turns raw frames into events.

pub mod decode;
pub mod error;
pub mod events;
pub mod request;
pub mod types;

pub use decode::decode_frame;
pub use error::{DecodeError, Result};
pub use events::{NodeData, ServerEvent};
pub use request::ClientRequest;
pub use types::*;
