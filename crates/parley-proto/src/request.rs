//! Outbound request frame

use serde::{Deserialize, Serialize};

/// A user submission sent to the server.
///
/// `conversation_id` is omitted until the server has assigned one; the server
/// creates a conversation for requests that lack it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
}

impl ClientRequest {
    pub fn new(content: impl Into<String>, conversation_id: Option<i64>) -> Self {
        Self {
            content: content.into(),
            conversation_id,
        }
    }
}
