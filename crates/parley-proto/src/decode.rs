//! Frame decoder

use serde_json::Value;

use crate::{
    error::{DecodeError, Result},
    events::ServerEvent,
};

/// Decode one inbound text frame into a [`ServerEvent`].
///
/// Objects without a `type` tag but with a string `error` field are the
/// server's untyped error replies and decode as [`ServerEvent::Error`].
pub fn decode_frame(frame: &str) -> Result<ServerEvent> {
    let value: Value = serde_json::from_str(frame)?;
    let Some(object) = value.as_object() else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = match object.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(DecodeError::MissingKind),
        None => {
            return match object.get("error") {
                Some(Value::String(error)) => Ok(ServerEvent::Error {
                    error: error.clone(),
                }),
                _ => Err(DecodeError::MissingKind),
            };
        }
    };

    if !ServerEvent::KINDS.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownKind(kind));
    }

    let event = serde_json::from_value(value)?;
    tracing::trace!("decoded {} frame", kind);
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, PartKind, Role, ToolStatus};

    #[test]
    fn test_decode_conversation_created() {
        let event =
            decode_frame(r#"{"type":"conversation_created","conversation_id":7}"#).unwrap();
        assert_eq!(event, ServerEvent::ConversationCreated { conversation_id: 7 });
    }

    #[test]
    fn test_decode_message_snapshot() {
        let frame = r#"{
            "type": "message",
            "id": 4,
            "role": "agent",
            "conversation_id": 7,
            "created_at": "2025-11-03T15:16:04Z",
            "model_name": "claude-sonnet-4-5",
            "parts": [
                {"part_kind": "text", "content": "hi", "tool_name": null, "status": null}
            ]
        }"#;
        match decode_frame(frame).unwrap() {
            ServerEvent::Message {
                id,
                parts,
                role,
                model_name,
                timestamp,
                content,
                ..
            } => {
                assert_eq!(id, 4);
                assert_eq!(role, Role::Agent);
                assert_eq!(parts, vec![Part::text("hi")]);
                assert_eq!(model_name.as_deref(), Some("claude-sonnet-4-5"));
                assert!(timestamp.is_none());
                assert!(content.is_none());
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_legacy_snapshot_with_flat_content() {
        let frame = r#"{"type":"message","id":1,"content":"hello","role":"user","conversation_id":7,"created_at":"T"}"#;
        match decode_frame(frame).unwrap() {
            ServerEvent::Message { parts, content, .. } => {
                assert!(parts.is_empty());
                assert_eq!(content.as_deref(), Some("hello"));
            }
            other => panic!("expected message, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_node_added() {
        let frame = r#"{
            "type": "node_added",
            "message_id": 2,
            "conversation_id": 7,
            "node": {
                "id": "n1",
                "step": 3,
                "parts": [
                    {"part_kind": "tool-call", "tool_name": "search", "tool_call_id": "c1", "args": {"q": "x"}}
                ],
                "timestamp": "2025-11-03T15:16:05Z"
            }
        }"#;
        match decode_frame(frame).unwrap() {
            ServerEvent::NodeAdded { message_id, node } => {
                assert_eq!(message_id, 2);
                assert_eq!(node.id.as_deref(), Some("n1"));
                assert_eq!(node.step, Some(3));
                assert_eq!(node.parts.len(), 1);
                assert_eq!(node.parts[0].kind(), PartKind::ToolCall);
                assert!(node.model_name.is_none());
            }
            other => panic!("expected node_added, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_tool_complete_defaults() {
        let frame = r#"{"type":"tool_complete","message_id":1,"tool_name":"search","result":{"hits":2},"conversation_id":7}"#;
        match decode_frame(frame).unwrap() {
            ServerEvent::ToolComplete {
                result,
                status,
                error_message,
                ..
            } => {
                assert_eq!(result, serde_json::json!({"hits": 2}));
                assert!(status.is_none());
                assert!(error_message.is_none());
            }
            other => panic!("expected tool_complete, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_tool_complete_error_status() {
        let frame = r#"{"type":"tool_complete","message_id":1,"tool_name":"read_file_tool","result":"Error: nope","status":"error","error_message":"nope","conversation_id":7}"#;
        match decode_frame(frame).unwrap() {
            ServerEvent::ToolComplete {
                status,
                error_message,
                ..
            } => {
                assert_eq!(status, Some(ToolStatus::Error));
                assert_eq!(error_message.as_deref(), Some("nope"));
            }
            other => panic!("expected tool_complete, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_untyped_error_frame() {
        let event = decode_frame(r#"{"error":"Message content is required"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::Error {
                error: "Message content is required".into()
            }
        );
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode_frame("{not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_decode_rejects_non_object() {
        assert!(matches!(decode_frame("[1,2]"), Err(DecodeError::NotAnObject)));
        assert!(matches!(decode_frame("\"text\""), Err(DecodeError::NotAnObject)));
    }

    #[test]
    fn test_decode_rejects_missing_type() {
        assert!(matches!(
            decode_frame(r#"{"id":1}"#),
            Err(DecodeError::MissingKind)
        ));
        assert!(matches!(
            decode_frame(r#"{"type":5}"#),
            Err(DecodeError::MissingKind)
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        match decode_frame(r#"{"type":"heartbeat"}"#) {
            Err(DecodeError::UnknownKind(kind)) => assert_eq!(kind, "heartbeat"),
            other => panic!("expected unknown kind, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_known_type_with_missing_fields() {
        assert!(matches!(
            decode_frame(r#"{"type":"text_chunk","message_id":1}"#),
            Err(DecodeError::Json(_))
        ));
    }
}
