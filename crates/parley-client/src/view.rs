//! Read-only view handed to consumers

use parley_proto::Message;

use crate::{reconciler::Reconciler, transport::ConnectionStatus};

/// Everything a consumer needs to render the conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatView {
    /// Messages in first-reference order
    pub messages: Vec<Message>,
    /// Server-assigned conversation id, once known
    pub conversation_id: Option<i64>,
    /// Transport state
    pub connection_status: ConnectionStatus,
    /// A sent message is waiting for the agent
    pub is_loading: bool,
    /// Last error to show the user
    pub error: Option<String>,
}

impl ChatView {
    pub(crate) fn capture(reconciler: &Reconciler, connection_status: ConnectionStatus) -> Self {
        Self {
            messages: reconciler.messages().to_vec(),
            conversation_id: reconciler.conversation_id(),
            connection_status,
            is_loading: reconciler.is_awaiting_response(),
            error: reconciler.error().map(String::from),
        }
    }

    /// Look up a message by id
    pub fn message(&self, id: i64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }
}
