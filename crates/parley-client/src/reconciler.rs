//! Streaming conversation reconciler
//!
//! Folds decoded [`ServerEvent`]s into an ordered list of [`Message`]s. Each
//! call to [`Reconciler::apply`] is one complete transition; callers serialize
//! access (the session holds it behind a mutex and feeds it from a single task).
//!
//! Merge rules, per event kind:
//!
//! - `message` inserts a snapshot the first time an id is seen and is ignored
//!   afterwards, so a late snapshot never clobbers streamed parts.
//! - `message_part`, `text_chunk`, `tool_start` and `tool_complete` create a
//!   stub message when the id is unknown.
//! - `node_added` skips parts whose `(part_kind, tool_call_id)` is already
//!   present and fills `model_name`/`timestamp` only while unset.
//! - `text_chunk` extends a trailing text part instead of starting a new one.
//!
//! The server sends no call id with `tool_start`/`tool_complete`. Starts get a
//! synthesized id from the tool name and a nanosecond timestamp; completions
//! attach to the most recent call with the same tool name. Two concurrent
//! calls of the same tool therefore cannot be told apart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parley_proto::{Message, NodeData, Part, Role, ServerEvent, ToolStatus};

/// Source of "now" for placeholders and synthesized call ids
pub type Clock = fn() -> DateTime<Utc>;

/// Authoritative in-memory state of one conversation session
#[derive(Debug, Clone)]
pub struct Reconciler {
    messages: Vec<Message>,
    index: HashMap<i64, usize>,
    conversation_id: Option<i64>,
    awaiting_response: bool,
    error: Option<String>,
    clock: Clock,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    /// Create an empty reconciler using the system clock
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Create an empty reconciler with a custom clock
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            messages: vec![],
            index: HashMap::new(),
            conversation_id: None,
            awaiting_response: false,
            error: None,
            clock,
        }
    }

    /// Messages in first-reference order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by id
    pub fn message(&self, id: i64) -> Option<&Message> {
        self.index.get(&id).map(|&i| &self.messages[i])
    }

    /// Server-assigned conversation id, once known
    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    /// Whether a sent message is still waiting for the agent
    pub fn is_awaiting_response(&self) -> bool {
        self.awaiting_response
    }

    /// Last error surfaced to the user
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Mark a user submission as in flight
    pub fn begin_request(&mut self) {
        self.awaiting_response = true;
        self.error = None;
    }

    /// A submission never left the client. Handled like a server `error` event.
    pub fn reject_request(&mut self, reason: impl Into<String>) {
        self.apply(ServerEvent::Error {
            error: reason.into(),
        });
    }

    /// Apply one event. Returns whether any observable state changed.
    pub fn apply(&mut self, event: ServerEvent) -> bool {
        tracing::debug!(
            "Applying {} (message {:?})",
            event.kind(),
            event.message_id()
        );
        let terminal = event.is_terminal();
        match event {
            ServerEvent::ConversationCreated { conversation_id } => {
                if let Some(previous) = self.conversation_id {
                    if previous != conversation_id {
                        tracing::debug!(
                            "Conversation id changed from {} to {}",
                            previous,
                            conversation_id
                        );
                    }
                }
                self.conversation_id = Some(conversation_id);
                true
            }
            ServerEvent::Message {
                id,
                parts,
                role,
                created_at,
                model_name,
                timestamp,
                content,
            } => {
                let cleared = self.clear_awaiting_if(terminal);
                if self.index.contains_key(&id) {
                    tracing::debug!("Ignoring snapshot for existing message {}", id);
                    return cleared;
                }
                let parts = if parts.is_empty() {
                    legacy_parts(role, content)
                } else {
                    parts
                };
                self.insert(Message {
                    id,
                    role,
                    parts,
                    created_at,
                    model_name,
                    timestamp,
                });
                true
            }
            ServerEvent::MessagePart {
                message_id,
                part,
                role,
            } => {
                self.entry(message_id, role).parts.push(part);
                true
            }
            ServerEvent::NodeAdded { message_id, node } => {
                self.merge_node(message_id, node);
                true
            }
            ServerEvent::TextChunk {
                message_id,
                chunk,
                role,
            } => {
                let message = self.entry(message_id, role);
                match message.parts.last_mut() {
                    Some(Part::Text { content }) => {
                        content.get_or_insert_with(String::new).push_str(&chunk);
                    }
                    _ => message.parts.push(Part::text(chunk)),
                }
                true
            }
            ServerEvent::MessageComplete {
                id,
                created_at,
                model_name,
                timestamp,
            } => {
                let cleared = self.clear_awaiting_if(terminal);
                let Some(&i) = self.index.get(&id) else {
                    tracing::debug!("Completion for unknown message {} ignored", id);
                    return cleared;
                };
                let message = &mut self.messages[i];
                message.created_at = created_at;
                message.model_name = model_name;
                message.timestamp = timestamp;
                true
            }
            ServerEvent::ToolStart {
                message_id,
                tool_name,
                args,
            } => {
                let tool_call_id = self.synthesize_call_id(&tool_name);
                self.entry(message_id, Role::Agent)
                    .parts
                    .push(Part::tool_call(tool_name, tool_call_id, args));
                true
            }
            ServerEvent::ToolComplete {
                message_id,
                tool_name,
                result,
                status,
                error_message,
            } => {
                self.record_tool_result(message_id, tool_name, result, status, error_message);
                true
            }
            ServerEvent::Error { error } => {
                tracing::debug!("Server error: {}", error);
                self.clear_awaiting_if(terminal);
                self.error = Some(error);
                true
            }
        }
    }

    fn clear_awaiting_if(&mut self, condition: bool) -> bool {
        let was = self.awaiting_response;
        if condition {
            self.awaiting_response = false;
        }
        was && condition
    }

    fn insert(&mut self, message: Message) {
        self.index.insert(message.id, self.messages.len());
        self.messages.push(message);
    }

    /// Existing message, or a stub whose `created_at` is a placeholder until completion
    fn entry(&mut self, id: i64, role: Role) -> &mut Message {
        let i = match self.index.get(&id) {
            Some(&i) => i,
            None => {
                let placeholder = (self.clock)().to_rfc3339();
                self.insert(Message::new(id, role, placeholder));
                self.messages.len() - 1
            }
        };
        &mut self.messages[i]
    }

    fn merge_node(&mut self, message_id: i64, node: NodeData) {
        let message = self.entry(message_id, Role::Agent);
        for part in node.parts {
            let duplicate = part
                .dedup_key()
                .is_some_and(|(kind, id)| message.has_key(kind, id));
            if duplicate {
                tracing::debug!(
                    "Skipping duplicate {} part {:?} in message {}",
                    part.kind().as_str(),
                    part.tool_call_id(),
                    message_id
                );
                continue;
            }
            message.parts.push(part);
        }
        if message.model_name.is_none() {
            message.model_name = node.model_name;
        }
        if message.timestamp.is_none() {
            message.timestamp = node.timestamp;
        }
    }

    fn record_tool_result(
        &mut self,
        message_id: i64,
        tool_name: String,
        result: serde_json::Value,
        status: Option<ToolStatus>,
        error_message: Option<String>,
    ) {
        let message = self.entry(message_id, Role::Agent);
        let matched = message.parts.iter().rev().find_map(|part| match part {
            Part::ToolCall {
                tool_name: name,
                tool_call_id: Some(id),
                ..
            } if *name == tool_name => Some(id.clone()),
            _ => None,
        });
        let tool_call_id = matched.unwrap_or_else(|| {
            tracing::warn!(
                "No {} call found in message {} for tool result",
                tool_name,
                message_id
            );
            format!("{}-{}", tool_name, uuid::Uuid::new_v4())
        });
        message.parts.push(Part::tool_return(
            tool_name,
            tool_call_id,
            result_text(result),
            status,
            error_message,
        ));
    }

    fn synthesize_call_id(&self, tool_name: &str) -> String {
        let now = (self.clock)();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros());
        format!("{}-{}", tool_name, nanos)
    }
}

/// Parts for a snapshot that carries a flat `content` string instead of parts
fn legacy_parts(role: Role, content: Option<String>) -> Vec<Part> {
    match (role, content) {
        (_, None) => vec![],
        (Role::User, Some(text)) => vec![Part::user_prompt(text)],
        (Role::Agent, Some(text)) => vec![Part::text(text)],
    }
}

/// Tool results are displayed as text; non-string JSON is serialized
fn result_text(result: serde_json::Value) -> String {
    match result {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
