//! Core types for conversation messages

use serde::{Deserialize, Serialize};

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human side of the conversation
    User,
    /// Server-side agent (the server's persisted models call this `assistant`)
    #[serde(alias = "assistant")]
    Agent,
}

impl Role {
    /// Get the role as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

/// Discriminant of a [`Part`], as carried in its `part_kind` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartKind {
    Text,
    Thinking,
    ToolCall,
    ToolReturn,
    UserPrompt,
    SystemPrompt,
}

impl PartKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Text => "text",
            PartKind::Thinking => "thinking",
            PartKind::ToolCall => "tool-call",
            PartKind::ToolReturn => "tool-return",
            PartKind::UserPrompt => "user-prompt",
            PartKind::SystemPrompt => "system-prompt",
        }
    }
}

/// Outcome of a tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
    Cancelled,
}

impl ToolStatus {
    /// Whether the tool ran to a successful result
    pub fn is_success(&self) -> bool {
        matches!(self, ToolStatus::Success)
    }
}

/// One semantic unit of a message's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "kebab-case")]
pub enum Part {
    /// Agent-authored text span
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Reasoning trace
    Thinking {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Tool invocation request
    ToolCall {
        #[serde(default)]
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Tool result
    ToolReturn {
        #[serde(default)]
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<ToolStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Prompt authored by the user
    UserPrompt {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// System prompt the agent ran with
    SystemPrompt {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

impl Part {
    /// Create a text part
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: Some(content.into()),
        }
    }

    /// Create a user prompt part
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Self::UserPrompt {
            content: Some(content.into()),
        }
    }

    /// Create a tool-call part
    pub fn tool_call(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            tool_name: tool_name.into(),
            tool_call_id: Some(tool_call_id.into()),
            args: Some(args),
            content: None,
            metadata: None,
            timestamp: None,
        }
    }

    /// Create a tool-return part
    pub fn tool_return(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        status: Option<ToolStatus>,
        error_message: Option<String>,
    ) -> Self {
        Self::ToolReturn {
            tool_name: tool_name.into(),
            tool_call_id: Some(tool_call_id.into()),
            content: Some(content.into()),
            status,
            error_message,
            metadata: None,
            timestamp: None,
        }
    }

    /// Get the discriminant
    pub fn kind(&self) -> PartKind {
        match self {
            Part::Text { .. } => PartKind::Text,
            Part::Thinking { .. } => PartKind::Thinking,
            Part::ToolCall { .. } => PartKind::ToolCall,
            Part::ToolReturn { .. } => PartKind::ToolReturn,
            Part::UserPrompt { .. } => PartKind::UserPrompt,
            Part::SystemPrompt { .. } => PartKind::SystemPrompt,
        }
    }

    /// Get the content, if any
    pub fn content(&self) -> Option<&str> {
        match self {
            Part::Text { content }
            | Part::Thinking { content, .. }
            | Part::ToolCall { content, .. }
            | Part::ToolReturn { content, .. }
            | Part::UserPrompt { content }
            | Part::SystemPrompt { content } => content.as_deref(),
        }
    }

    /// Tool name for tool-call and tool-return parts
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Part::ToolCall { tool_name, .. } | Part::ToolReturn { tool_name, .. } => {
                Some(tool_name)
            }
            _ => None,
        }
    }

    /// Correlation key for tool-call and tool-return parts
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Part::ToolCall { tool_call_id, .. } | Part::ToolReturn { tool_call_id, .. } => {
                tool_call_id.as_deref()
            }
            _ => None,
        }
    }

    /// `(part_kind, tool_call_id)` pair that must be unique within a message.
    ///
    /// Parts without a `tool_call_id` have no key and never collide.
    pub fn dedup_key(&self) -> Option<(PartKind, &str)> {
        self.tool_call_id().map(|id| (self.kind(), id))
    }

    /// Check if this is a text part
    pub fn is_text(&self) -> bool {
        matches!(self, Part::Text { .. })
    }

    /// Check if this is a tool call
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Part::ToolCall { .. })
    }
}

/// A conversation message, possibly still being assembled from stream events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Message {
    /// Create a message with no parts
    pub fn new(id: i64, role: Role, created_at: impl Into<String>) -> Self {
        Self {
            id,
            role,
            parts: vec![],
            created_at: created_at.into(),
            model_name: None,
            timestamp: None,
        }
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.is_text())
            .filter_map(|p| p.content())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether any part already carries this dedup key
    pub fn has_key(&self, kind: PartKind, tool_call_id: &str) -> bool {
        self.parts
            .iter()
            .any(|p| p.dedup_key() == Some((kind, tool_call_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_accepts_assistant_alias() {
        let role: Role = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(role, Role::Agent);
        assert_eq!(serde_json::to_value(role).unwrap(), json!("agent"));
    }

    #[test]
    fn test_part_kind_wire_names() {
        let part: Part = serde_json::from_value(json!({
            "part_kind": "tool-return",
            "tool_name": "search",
            "tool_call_id": "c1",
            "content": "42",
            "status": "error",
            "error_message": "boom"
        }))
        .unwrap();
        assert_eq!(part.kind(), PartKind::ToolReturn);
        assert_eq!(part.kind().as_str(), "tool-return");
        assert_eq!(part.tool_call_id(), Some("c1"));
        assert_eq!(part.content(), Some("42"));
    }

    #[test]
    fn test_part_ignores_unknown_fields() {
        let part: Part = serde_json::from_value(json!({
            "part_kind": "text",
            "content": "hi",
            "tool_name": null,
            "provider_details": {"x": 1}
        }))
        .unwrap();
        assert_eq!(part, Part::text("hi"));
    }

    #[test]
    fn test_thinking_part_fields() {
        let part: Part = serde_json::from_value(json!({
            "part_kind": "thinking",
            "content": "hmm",
            "provider_name": "anthropic",
            "signature": "sig",
            "id": "t1"
        }))
        .unwrap();
        match part {
            Part::Thinking {
                provider_name,
                signature,
                id,
                ..
            } => {
                assert_eq!(provider_name.as_deref(), Some("anthropic"));
                assert_eq!(signature.as_deref(), Some("sig"));
                assert_eq!(id.as_deref(), Some("t1"));
            }
            other => panic!("expected thinking part, got {:?}", other),
        }
    }

    #[test]
    fn test_dedup_key_only_for_tool_parts() {
        assert_eq!(Part::text("x").dedup_key(), None);
        let call = Part::tool_call("search", "c1", json!({}));
        assert_eq!(call.dedup_key(), Some((PartKind::ToolCall, "c1")));
        let ret = Part::tool_return("search", "c1", "ok", None, None);
        assert_ne!(call.dedup_key(), ret.dedup_key());
    }

    #[test]
    fn test_message_text_joins_text_parts_only() {
        let mut msg = Message::new(1, Role::Agent, "T");
        msg.parts.push(Part::text("Hello "));
        msg.parts.push(Part::tool_call("search", "c1", json!({})));
        msg.parts.push(Part::text("world"));
        assert_eq!(msg.text(), "Hello world");
        assert!(msg.has_key(PartKind::ToolCall, "c1"));
        assert!(!msg.has_key(PartKind::ToolReturn, "c1"));
    }
}
