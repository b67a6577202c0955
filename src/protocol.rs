//! Wire format shared with the host renderer.
//!
//! Every message is one JSON object per websocket text frame.
//!
//! Outbound (client → host), one per flush:
//!
//! ```json
//! {"client_id":"gouif2","edits":[
//!   {"append_child":{"parent_id":4294967295,"object_id":2,"node":{"label":{"text":"Hi"}}}},
//!   {"replace_node":{"object_id":2,"node":{"label":{"text":"Bye"}}}}
//! ]}
//! ```
//!
//! Inbound (host → client), one event per message:
//!
//! ```json
//! {"update":{"id":"cb1","object_id":3,"node":{"text_input":{"text":"abc","on_changed":"cb1"}}}}
//! {"clicked":{"id":"cb2"}}
//! ```

use crate::error::{Result, UifError};
use crate::id::{CorrelationToken, ObjectId};
use crate::payload::{Button, ComboBox, Label, LeftToRightLayout, Payload, TextInput, Window};
use serde::{Deserialize, Serialize};

/// Serialized form of a node's payload.
///
/// At most one key is present; absent kinds are omitted rather than
/// written as `null`. Children never travel inside a snapshot: a subtree
/// is sent as one [`EditCommand::AppendChild`] per node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_input: Option<TextInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combo_box: Option<ComboBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_to_right_layout: Option<LeftToRightLayout>,
}

impl NodeSnapshot {
    /// Convert back into the single payload it carries.
    ///
    /// Returns `Ok(None)` for an empty snapshot and a decode error when
    /// more than one kind is present.
    pub fn into_payload(self) -> Result<Option<Payload>> {
        let candidates = [
            self.label.map(Payload::Label),
            self.text_input.map(Payload::TextInput),
            self.combo_box.map(Payload::ComboBox),
            self.button.map(Payload::Button),
            self.window.map(Payload::Window),
            self.left_to_right_layout.map(Payload::LeftToRightLayout),
        ];

        let mut present = candidates.into_iter().flatten();
        let first = present.next();
        if let Some(extra) = present.next() {
            return Err(UifError::Decode(format!(
                "node snapshot carries more than one payload (found `{}`)",
                extra.kind()
            )));
        }
        Ok(first)
    }
}

impl From<&Payload> for NodeSnapshot {
    fn from(payload: &Payload) -> Self {
        let mut snapshot = NodeSnapshot::default();
        match payload.clone() {
            Payload::Label(p) => snapshot.label = Some(p),
            Payload::TextInput(p) => snapshot.text_input = Some(p),
            Payload::ComboBox(p) => snapshot.combo_box = Some(p),
            Payload::Button(p) => snapshot.button = Some(p),
            Payload::Window(p) => snapshot.window = Some(p),
            Payload::LeftToRightLayout(p) => snapshot.left_to_right_layout = Some(p),
        }
        snapshot
    }
}

/// One structural or payload change, applied by the host in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditCommand {
    /// Create `object_id` as the last child of `parent_id`
    AppendChild {
        parent_id: ObjectId,
        object_id: ObjectId,
        node: NodeSnapshot,
    },
    /// Replace the whole payload of `object_id`
    ReplaceNode {
        object_id: ObjectId,
        node: NodeSnapshot,
    },
}

impl EditCommand {
    /// Node the edit creates or replaces
    pub fn object_id(&self) -> ObjectId {
        match self {
            EditCommand::AppendChild { object_id, .. } | EditCommand::ReplaceNode { object_id, .. } => {
                *object_id
            }
        }
    }
}

/// All edits recorded since the last successful flush
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub client_id: String,
    pub edits: Vec<EditCommand>,
}

impl Transaction {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            edits: Vec::new(),
        }
    }

    /// Append an edit; no coalescing is done
    pub fn push(&mut self, edit: EditCommand) {
        self.edits.push(edit);
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Drop all edits, keeping the client id
    pub fn clear(&mut self) {
        self.edits.clear();
    }

    /// Encode as one outbound message
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| UifError::Encode(e.to_string()))
    }

    /// Decode an outbound message (used by hosts and tests)
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| UifError::Decode(e.to_string()))
    }
}

/// Inbound notification from the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// Authoritative new state for a node
    Update {
        id: CorrelationToken,
        object_id: ObjectId,
        node: NodeSnapshot,
    },
    /// A button was pressed
    Clicked { id: CorrelationToken },
}

impl Event {
    /// Token the event is routed by
    pub fn token(&self) -> &CorrelationToken {
        match self {
            Event::Update { id, .. } | Event::Clicked { id } => id,
        }
    }

    /// Decode one inbound message
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| UifError::Decode(e.to_string()))
    }

    /// Encode as a host would send it
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| UifError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_label() -> Payload {
        Payload::Label(Label {
            text: "Hello".to_string(),
            heading: None,
        })
    }

    #[test]
    fn test_append_child_wire_shape() {
        let mut tx = Transaction::new("gouif2");
        tx.push(EditCommand::AppendChild {
            parent_id: ObjectId::ROOT,
            object_id: ObjectId(2),
            node: NodeSnapshot::from(&Payload::Label(Label {
                text: "Hi".to_string(),
                heading: None,
            })),
        });

        assert_eq!(
            tx.encode().unwrap(),
            r#"{"client_id":"gouif2","edits":[{"append_child":{"parent_id":4294967295,"object_id":2,"node":{"label":{"text":"Hi"}}}}]}"#
        );
    }

    #[test]
    fn test_append_child_decodes_back() {
        let mut tx = Transaction::new("gouif2");
        tx.push(EditCommand::AppendChild {
            parent_id: ObjectId::ROOT,
            object_id: ObjectId(7),
            node: NodeSnapshot::from(&hello_label()),
        });

        let decoded = Transaction::decode(&tx.encode().unwrap()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.edits[0].object_id(), ObjectId(7));
    }

    #[test]
    fn test_replace_node_wire_shape() {
        let edit = EditCommand::ReplaceNode {
            object_id: ObjectId(5),
            node: NodeSnapshot::from(&Payload::ComboBox(ComboBox {
                label: "Mode".to_string(),
                selected: "A".to_string(),
                options: vec!["A".to_string()],
                on_changed: CorrelationToken::from("cb3"),
            })),
        };

        assert_eq!(
            serde_json::to_string(&edit).unwrap(),
            r#"{"replace_node":{"object_id":5,"node":{"combo_box":{"label":"Mode","selected":"A","options":["A"],"on_changed":"cb3"}}}}"#
        );
    }

    #[test]
    fn test_snapshot_omits_absent_kinds() {
        let json = serde_json::to_string(&NodeSnapshot::from(&hello_label())).unwrap();
        assert!(!json.contains("null"));
        assert_eq!(json, r#"{"label":{"text":"Hello"}}"#);
    }

    #[test]
    fn test_snapshot_with_two_payloads_is_rejected() {
        let snapshot: NodeSnapshot =
            serde_json::from_str(r#"{"label":{"text":"a"},"window":{"title":"b"}}"#).unwrap();
        assert!(matches!(snapshot.into_payload(), Err(UifError::Decode(_))));
    }

    #[test]
    fn test_empty_snapshot_has_no_payload() {
        let snapshot: NodeSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.into_payload().unwrap(), None);
    }

    #[test]
    fn test_decode_update_event() {
        let event = Event::decode(
            r#"{"update":{"id":"cb1","object_id":3,"node":{"combo_box":{"label":"","selected":"B"}}}}"#,
        )
        .unwrap();

        match &event {
            Event::Update { id, object_id, node } => {
                assert_eq!(id.as_str(), "cb1");
                assert_eq!(*object_id, ObjectId(3));
                assert_eq!(node.combo_box.as_ref().map(|c| c.selected.as_str()), Some("B"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(event.token().as_str(), "cb1");
    }

    #[test]
    fn test_decode_clicked_event() {
        let event = Event::decode(r#"{"clicked":{"id":"cb2"}}"#).unwrap();
        assert_eq!(event, Event::Clicked { id: "cb2".into() });
    }

    #[test]
    fn test_event_with_both_kinds_is_rejected() {
        let res = Event::decode(r#"{"update":{"id":"a","object_id":1,"node":{}},"clicked":{"id":"a"}}"#);
        assert!(matches!(res, Err(UifError::Decode(_))));
    }

    #[test]
    fn test_malformed_event_is_rejected() {
        assert!(matches!(Event::decode("not json"), Err(UifError::Decode(_))));
        assert!(matches!(Event::decode("{}"), Err(UifError::Decode(_))));
    }
}
