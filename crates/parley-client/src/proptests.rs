//! Property-based tests for the reconciler
//!
//! Invariants checked over arbitrary event sequences:
//! - Messages appear in first-reference order and parts in arrival order
//! - No message holds two parts with the same `(part_kind, tool_call_id)` via node merges
//! - A snapshot for a known id never changes existing state
//! - Decoding arbitrary input never panics

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parley_proto::{NodeData, Part, Role, ServerEvent, decode_frame};
use proptest::prelude::*;
use serde_json::json;

use crate::reconciler::Reconciler;

fn fixed_clock() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

fn arb_message_id() -> impl Strategy<Value = i64> {
    1i64..5
}

/// Tool part drawn from a small key space so collisions are common
fn arb_tool_part() -> impl Strategy<Value = Part> {
    (any::<bool>(), "[ab]", "c[0-3]").prop_map(|(is_call, name, id)| {
        if is_call {
            Part::tool_call(name, id, json!({}))
        } else {
            Part::tool_return(name, id, "ok", None, None)
        }
    })
}

fn arb_node_part() -> impl Strategy<Value = Part> {
    prop_oneof![
        3 => arb_tool_part(),
        1 => "[a-z ]{0,10}".prop_map(Part::text),
    ]
}

fn arb_node_event() -> impl Strategy<Value = ServerEvent> {
    (
        arb_message_id(),
        proptest::collection::vec(arb_node_part(), 0..5),
    )
        .prop_map(|(message_id, parts)| ServerEvent::NodeAdded {
            message_id,
            node: NodeData {
                id: None,
                step: None,
                parts,
                model_name: None,
                timestamp: None,
            },
        })
}

/// Part without a dedup key, so node merges never drop it
fn arb_unkeyed_part() -> impl Strategy<Value = Part> {
    prop_oneof![
        "[a-z ]{0,8}".prop_map(Part::text),
        "[a-z ]{1,8}".prop_map(|content| Part::Thinking {
            content: Some(content),
            provider_name: None,
            signature: None,
            id: None,
        }),
    ]
}

/// Streaming step: a text delta, a single part, or a node batch
#[derive(Debug, Clone)]
enum Step {
    Chunk(i64, String),
    Part(i64, Part),
    Node(i64, Vec<Part>),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (arb_message_id(), "[a-z ]{1,8}").prop_map(|(id, text)| Step::Chunk(id, text)),
        (arb_message_id(), "[a-z]{1,5}").prop_map(|(id, name)| {
            Step::Part(id, Part::tool_call(name.clone(), name, json!({})))
        }),
        (
            arb_message_id(),
            proptest::collection::vec(arb_unkeyed_part(), 0..4),
        )
            .prop_map(|(id, parts)| Step::Node(id, parts)),
    ]
}

impl Step {
    fn into_event(self) -> ServerEvent {
        match self {
            Step::Chunk(message_id, chunk) => ServerEvent::TextChunk {
                message_id,
                chunk,
                role: Role::Agent,
            },
            Step::Part(message_id, part) => ServerEvent::MessagePart {
                message_id,
                part,
                role: Role::Agent,
            },
            Step::Node(message_id, parts) => ServerEvent::NodeAdded {
                message_id,
                node: NodeData {
                    id: None,
                    step: None,
                    parts,
                    model_name: None,
                    timestamp: None,
                },
            },
        }
    }
}

fn arb_any_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        arb_step().prop_map(Step::into_event),
        arb_node_event(),
        (arb_message_id(), "[a-z]{1,5}").prop_map(|(message_id, tool_name)| {
            ServerEvent::ToolStart {
                message_id,
                tool_name,
                args: json!({}),
            }
        }),
        arb_message_id().prop_map(|id| ServerEvent::MessageComplete {
            id,
            created_at: "T".into(),
            model_name: None,
            timestamp: None,
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_order_follows_arrival(steps in proptest::collection::vec(arb_step(), 0..40)) {
        // Reference model: ordered (id, parts); chunks extend a trailing text part,
        // single parts and node batches append in arrival order
        let mut model: Vec<(i64, Vec<Part>)> = vec![];
        let mut r = Reconciler::with_clock(fixed_clock);

        for step in steps {
            let id = match &step {
                Step::Chunk(id, _) | Step::Part(id, _) | Step::Node(id, _) => *id,
            };
            let i = match model.iter().position(|(m, _)| *m == id) {
                Some(i) => i,
                None => {
                    model.push((id, vec![]));
                    model.len() - 1
                }
            };
            let parts = &mut model[i].1;
            match &step {
                Step::Chunk(_, text) => match parts.last_mut() {
                    Some(Part::Text { content: Some(existing) }) => existing.push_str(text),
                    _ => parts.push(Part::text(text.clone())),
                },
                Step::Part(_, part) => parts.push(part.clone()),
                Step::Node(_, batch) => parts.extend(batch.iter().cloned()),
            }
            r.apply(step.into_event());
        }

        let actual: Vec<(i64, Vec<Part>)> = r
            .messages()
            .iter()
            .map(|m| (m.id, m.parts.clone()))
            .collect();
        prop_assert_eq!(actual, model);
    }

    #[test]
    fn prop_node_merge_never_duplicates_keys(events in proptest::collection::vec(arb_node_event(), 0..20)) {
        let mut r = Reconciler::with_clock(fixed_clock);
        for event in events {
            r.apply(event);
        }
        for message in r.messages() {
            let mut seen = HashSet::new();
            for key in message.parts.iter().filter_map(|p| p.dedup_key()) {
                prop_assert!(seen.insert(key), "duplicate key {:?} in message {}", key, message.id);
            }
        }
    }

    #[test]
    fn prop_snapshot_for_known_id_is_noop(
        events in proptest::collection::vec(arb_any_event(), 1..30),
        text in "[a-z]{0,10}",
    ) {
        let mut r = Reconciler::with_clock(fixed_clock);
        for event in events {
            r.apply(event);
        }
        let before = r.messages().to_vec();
        for id in before.iter().map(|m| m.id) {
            r.apply(ServerEvent::Message {
                id,
                parts: vec![Part::text(text.clone())],
                role: Role::User,
                created_at: "later".into(),
                model_name: Some("other".into()),
                timestamp: None,
                content: None,
            });
        }
        prop_assert_eq!(r.messages(), before.as_slice());
    }

    #[test]
    fn prop_decode_never_panics(frame in ".{0,200}") {
        let _ = decode_frame(&frame);
    }

    #[test]
    fn prop_decode_rejects_unknown_kinds(kind in "[a-z_]{1,20}") {
        prop_assume!(!ServerEvent::KINDS.contains(&kind.as_str()));
        let frame = json!({"type": kind, "message_id": 1}).to_string();
        prop_assert!(decode_frame(&frame).is_err());
    }
}
