//! Widget payloads carried by nodes
//!
//! Every [`crate::Node`] wraps exactly one [`Payload`] variant. The set of
//! kinds mirrors what the host renderer knows how to draw; adding a kind
//! means adding a variant here and a key to
//! [`crate::protocol::NodeSnapshot`].
//!
//! # Reconciliation
//!
//! The host is authoritative for fields the user edits on screen. When an
//! update event arrives, [`Payload::merge_remote`] copies exactly those
//! fields into the local payload:
//!
//! - [`TextInput`]: `text`
//! - [`ComboBox`]: `selected`
//!
//! All other kinds, and all other fields, are left untouched.

use crate::id::CorrelationToken;
use serde::{Deserialize, Serialize};

/// Static text, optionally rendered as a heading
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<bool>,
}

/// Single-line editable text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextInput {
    pub text: String,
    #[serde(default)]
    pub on_changed: CorrelationToken,
}

/// Drop-down selection from a fixed list of options
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComboBox {
    pub label: String,
    pub selected: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub on_changed: CorrelationToken,
}

/// Push button
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    #[serde(default)]
    pub on_clicked: CorrelationToken,
}

/// Top-level floating window; children render inside it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub title: String,
}

/// Container laying its children out horizontally
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeftToRightLayout {}

/// The single typed payload of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Label(Label),
    TextInput(TextInput),
    ComboBox(ComboBox),
    Button(Button),
    Window(Window),
    LeftToRightLayout(LeftToRightLayout),
}

impl Payload {
    /// Wire key of this payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Label(_) => "label",
            Payload::TextInput(_) => "text_input",
            Payload::ComboBox(_) => "combo_box",
            Payload::Button(_) => "button",
            Payload::Window(_) => "window",
            Payload::LeftToRightLayout(_) => "left_to_right_layout",
        }
    }

    /// Merge host-authoritative fields from `remote` into `self`.
    ///
    /// Returns `true` if a field was overwritten. A remote payload of a
    /// different kind is ignored.
    pub fn merge_remote(&mut self, remote: &Payload) -> bool {
        match (self, remote) {
            (Payload::TextInput(local), Payload::TextInput(remote)) => {
                local.text.clone_from(&remote.text);
                true
            }
            (Payload::ComboBox(local), Payload::ComboBox(remote)) => {
                local.selected.clone_from(&remote.selected);
                true
            }
            _ => false,
        }
    }

    /// Displayed text, for kinds that have one
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Label(l) => Some(&l.text),
            Payload::TextInput(t) => Some(&t.text),
            Payload::Button(b) => Some(&b.text),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            Payload::Label(l) => Some(&mut l.text),
            Payload::TextInput(t) => Some(&mut t.text),
            Payload::Button(b) => Some(&mut b.text),
            _ => None,
        }
    }

    /// Currently selected option of a combo box
    pub fn selected(&self) -> Option<&str> {
        match self {
            Payload::ComboBox(c) => Some(&c.selected),
            _ => None,
        }
    }

    pub(crate) fn selected_mut(&mut self) -> Option<&mut String> {
        match self {
            Payload::ComboBox(c) => Some(&mut c.selected),
            _ => None,
        }
    }

    pub(crate) fn options_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            Payload::ComboBox(c) => Some(&mut c.options),
            _ => None,
        }
    }

    pub(crate) fn title_mut(&mut self) -> Option<&mut String> {
        match self {
            Payload::Window(w) => Some(&mut w.title),
            _ => None,
        }
    }

    /// Token field the host echoes back in change events
    pub(crate) fn change_token_mut(&mut self) -> Option<&mut CorrelationToken> {
        match self {
            Payload::TextInput(t) => Some(&mut t.on_changed),
            Payload::ComboBox(c) => Some(&mut c.on_changed),
            _ => None,
        }
    }

    /// Token field the host echoes back in click events
    pub(crate) fn click_token_mut(&mut self) -> Option<&mut CorrelationToken> {
        match self {
            Payload::Button(b) => Some(&mut b.on_clicked),
            _ => None,
        }
    }
}

impl From<Label> for Payload {
    fn from(value: Label) -> Self {
        Payload::Label(value)
    }
}

impl From<TextInput> for Payload {
    fn from(value: TextInput) -> Self {
        Payload::TextInput(value)
    }
}

impl From<ComboBox> for Payload {
    fn from(value: ComboBox) -> Self {
        Payload::ComboBox(value)
    }
}

impl From<Button> for Payload {
    fn from(value: Button) -> Self {
        Payload::Button(value)
    }
}

impl From<Window> for Payload {
    fn from(value: Window) -> Self {
        Payload::Window(value)
    }
}

impl From<LeftToRightLayout> for Payload {
    fn from(value: LeftToRightLayout) -> Self {
        Payload::LeftToRightLayout(value)
    }
}
