//! Server event types

use serde::{Deserialize, Serialize};

use crate::types::{Part, Role, ToolStatus};

/// Events the server pushes over the conversation connection.
///
/// Every frame also carries a `conversation_id`; it is redundant with
/// [`ServerEvent::ConversationCreated`] and is not decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Server assigned an id to the conversation
    ConversationCreated { conversation_id: i64 },

    /// Full message snapshot
    Message {
        id: i64,
        #[serde(default)]
        parts: Vec<Part>,
        role: Role,
        created_at: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        /// Flat text body sent by older servers instead of `parts`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    /// Single incremental part
    MessagePart {
        message_id: i64,
        part: Part,
        role: Role,
    },

    /// Batch of parts produced by one reasoning/tool step
    NodeAdded { message_id: i64, node: NodeData },

    /// Incremental text delta
    TextChunk {
        message_id: i64,
        chunk: String,
        role: Role,
    },

    /// Message finalized
    MessageComplete {
        id: i64,
        created_at: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// Tool execution started (the server sends no call id)
    ToolStart {
        message_id: i64,
        tool_name: String,
        #[serde(default)]
        args: serde_json::Value,
    },

    /// Tool execution finished (correlated to its start by tool name only)
    ToolComplete {
        message_id: i64,
        tool_name: String,
        #[serde(default)]
        result: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<ToolStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },

    /// Server-side failure
    Error { error: String },
}

/// A node of the agent's execution graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<u32>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ServerEvent {
    /// Wire names of every event kind
    pub const KINDS: [&'static str; 9] = [
        "conversation_created",
        "message",
        "message_part",
        "node_added",
        "text_chunk",
        "message_complete",
        "tool_start",
        "tool_complete",
        "error",
    ];

    /// Wire name of this event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::ConversationCreated { .. } => "conversation_created",
            ServerEvent::Message { .. } => "message",
            ServerEvent::MessagePart { .. } => "message_part",
            ServerEvent::NodeAdded { .. } => "node_added",
            ServerEvent::TextChunk { .. } => "text_chunk",
            ServerEvent::MessageComplete { .. } => "message_complete",
            ServerEvent::ToolStart { .. } => "tool_start",
            ServerEvent::ToolComplete { .. } => "tool_complete",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Id of the message this event targets, if any
    pub fn message_id(&self) -> Option<i64> {
        match self {
            ServerEvent::Message { id, .. } | ServerEvent::MessageComplete { id, .. } => Some(*id),
            ServerEvent::MessagePart { message_id, .. }
            | ServerEvent::NodeAdded { message_id, .. }
            | ServerEvent::TextChunk { message_id, .. }
            | ServerEvent::ToolStart { message_id, .. }
            | ServerEvent::ToolComplete { message_id, .. } => Some(*message_id),
            ServerEvent::ConversationCreated { .. } | ServerEvent::Error { .. } => None,
        }
    }

    /// Check if this event ends the wait for an agent reply
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerEvent::MessageComplete { .. }
                | ServerEvent::Error { .. }
                | ServerEvent::Message {
                    role: Role::Agent,
                    ..
                }
        )
    }
}
