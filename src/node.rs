//! Client-side mirror of the remote UI tree
//!
//! A [`Node`] is a cheap, cloneable handle to one UI element. Nodes are
//! built detached (no client, no parent) and become *attached* when they
//! are appended, directly or through an ancestor, under a node that
//! already belongs to a [`crate::Client`]. The client's root is attached
//! from the start.
//!
//! # Recording edits
//!
//! Only attached nodes produce edits:
//!
//! - [`Node::append`] under an attached parent records one `AppendChild`
//!   per node of the new subtree, parents before children.
//! - [`Node::modify`] and the typed setters record one `ReplaceNode`
//!   carrying the whole payload after the change.
//!
//! Building a detached subtree records nothing; its current state is
//! captured when it is attached.
//!
//! # Locking
//!
//! Appends are serialized by one process-wide link lock, taken before any
//! other. Mutations of attached nodes run inside the owning client's state lock,
//! which also guards the pending transaction. Node locks are taken after
//! it and from parent to child, never the other way round. Closures passed
//! to [`Node::modify`] run under these locks and must not call back into
//! the tree.

use crate::client::{ClientState, Shared};
use crate::dispatch::Callback;
use crate::error::{Result, UifError};
use crate::id::{CorrelationToken, IdAllocator, ObjectId};
use crate::payload::{Button, ComboBox, Label, LeftToRightLayout, Payload, TextInput, Window};
use crate::protocol::{EditCommand, Event, NodeSnapshot};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Serializes structural changes; taken before any client or node lock.
static LINK_LOCK: Mutex<()> = Mutex::new(());

pub(crate) struct NodeCell {
    pub(crate) id: ObjectId,
    pub(crate) inner: Mutex<NodeInner>,
}

pub(crate) struct NodeInner {
    /// `None` only for the root
    pub(crate) payload: Option<Payload>,
    pub(crate) children: Vec<Node>,
    pub(crate) parent: Option<Weak<NodeCell>>,
    pub(crate) client: Option<Weak<Shared>>,
}

/// Handle to one element of the UI tree.
///
/// Clones refer to the same element.
#[derive(Clone)]
pub struct Node(pub(crate) Arc<NodeCell>);

impl Node {
    /// Create a detached node with an id from the process-wide allocator.
    pub fn new(payload: impl Into<Payload>) -> Self {
        Self::new_in(IdAllocator::global(), payload)
    }

    /// Create a detached node with an id from `allocator`.
    pub fn new_in(allocator: &IdAllocator, payload: impl Into<Payload>) -> Self {
        Self::from_parts(allocator.next_object_id(), Some(payload.into()), None)
    }

    pub fn label(text: impl Into<String>) -> Self {
        Self::new(Label {
            text: text.into(),
            heading: None,
        })
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self::new(Label {
            text: text.into(),
            heading: Some(true),
        })
    }

    pub fn text_input(text: impl Into<String>) -> Self {
        Self::new(TextInput {
            text: text.into(),
            on_changed: CorrelationToken::default(),
        })
    }

    /// Combo box with the first option selected
    pub fn combo_box<I, S>(label: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        Self::new(ComboBox {
            label: label.into(),
            selected: options.first().cloned().unwrap_or_default(),
            options,
            on_changed: CorrelationToken::default(),
        })
    }

    pub fn button(text: impl Into<String>) -> Self {
        Self::new(Button {
            text: text.into(),
            on_clicked: CorrelationToken::default(),
        })
    }

    pub fn window(title: impl Into<String>) -> Self {
        Self::new(Window {
            title: title.into(),
        })
    }

    /// Horizontal container
    pub fn row() -> Self {
        Self::new(LeftToRightLayout {})
    }

    /// The sentinel root owned by a client.
    pub(crate) fn root(shared: &Arc<Shared>) -> Self {
        Self::from_parts(ObjectId::ROOT, None, Some(Arc::downgrade(shared)))
    }

    fn from_parts(id: ObjectId, payload: Option<Payload>, client: Option<Weak<Shared>>) -> Self {
        Node(Arc::new(NodeCell {
            id,
            inner: Mutex::new(NodeInner {
                payload,
                children: Vec::new(),
                parent: None,
                client,
            }),
        }))
    }

    // --- Accessors ---

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Copy of the current payload; `None` for the root
    pub fn payload(&self) -> Option<Payload> {
        self.read().payload.clone()
    }

    /// Displayed text of a label, text input or button
    pub fn text(&self) -> Option<String> {
        self.read()
            .payload
            .as_ref()
            .and_then(|p| p.text().map(str::to_string))
    }

    /// Selected option of a combo box
    pub fn selected(&self) -> Option<String> {
        self.read()
            .payload
            .as_ref()
            .and_then(|p| p.selected().map(str::to_string))
    }

    /// Children in display order
    pub fn children(&self) -> Vec<Node> {
        self.read().children.clone()
    }

    pub fn parent_id(&self) -> Option<ObjectId> {
        self.read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|cell| cell.id)
    }

    /// Whether the node belongs to a live client
    pub fn is_attached(&self) -> bool {
        self.client().is_some()
    }

    pub(crate) fn client(&self) -> Option<Arc<Shared>> {
        self.read().client.as_ref().and_then(Weak::upgrade)
    }

    // --- Tree structure ---

    /// Append `child` as the last child of `self`.
    ///
    /// `child` must not already have a parent, must not be the root and
    /// must not be an ancestor of `self`. If `self` is attached, the
    /// whole subtree under `child` becomes attached and one `AppendChild`
    /// per node is recorded, parents first.
    pub fn append(&self, child: &Node) -> Result<()> {
        if child.id().is_root() {
            return Err(UifError::InvalidChild(child.id()));
        }
        // Held across the ancestry check and the link so two appends
        // cannot each pass the check and close a cycle together.
        let _linking = LINK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        self.ensure_not_descendant_of(child)?;

        loop {
            if let Some(shared) = self.client() {
                let mut state = shared.lock()?;
                return attach_subtree(&shared, &mut state, self, child);
            }

            let mut parent = self.lock()?;
            if parent.client.is_some() {
                // Attached concurrently; take the recording path.
                continue;
            }
            child.link_parent(self)?;
            parent.children.push(child.clone());
            return Ok(());
        }
    }

    fn ensure_not_descendant_of(&self, candidate: &Node) -> Result<()> {
        let mut current = Some(self.0.clone());
        while let Some(cell) = current {
            if Arc::ptr_eq(&cell, &candidate.0) {
                return Err(UifError::CycleDetected {
                    parent: self.id(),
                    child: candidate.id(),
                });
            }
            current = Node(cell).read().parent.as_ref().and_then(Weak::upgrade);
        }
        Ok(())
    }

    fn link_parent(&self, parent: &Node) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.parent.is_some() {
            return Err(UifError::AlreadyAttached(self.id()));
        }
        inner.parent = Some(Arc::downgrade(&parent.0));
        Ok(())
    }

    // --- Payload mutation ---

    /// Record a `ReplaceNode` carrying the current payload.
    ///
    /// Requires the node to be attached.
    pub fn replace(&self) -> Result<()> {
        let shared = self.client().ok_or(UifError::NotAttached(self.id()))?;
        let mut state = shared.lock()?;
        let inner = self.lock()?;
        let payload = inner.payload.as_ref().ok_or(UifError::RootNotReplaceable)?;
        record_replace(&mut state, self.id(), payload);
        Ok(())
    }

    /// Mutate the payload in place.
    ///
    /// When attached, a `ReplaceNode` with the resulting payload is
    /// recorded if `f` succeeds.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Payload) -> Result<R>) -> Result<R> {
        loop {
            if let Some(shared) = self.client() {
                let mut state = shared.lock()?;
                let mut inner = self.lock()?;
                let payload = inner.payload.as_mut().ok_or(UifError::RootNotReplaceable)?;
                let out = f(payload)?;
                record_replace(&mut state, self.id(), payload);
                return Ok(out);
            }

            let mut inner = self.lock()?;
            if inner.client.is_some() {
                continue;
            }
            let payload = inner.payload.as_mut().ok_or(UifError::RootNotReplaceable)?;
            return f(payload);
        }
    }

    /// Set the text of a label, text input or button
    pub fn set_text(&self, text: impl Into<String>) -> Result<()> {
        let id = self.id();
        let text = text.into();
        self.modify(|payload| {
            let kind = payload.kind();
            let slot = payload.text_mut().ok_or(UifError::PayloadMismatch {
                id,
                kind,
                field: "text",
            })?;
            *slot = text;
            Ok(())
        })
    }

    /// Set the selected option of a combo box
    pub fn set_selected(&self, selected: impl Into<String>) -> Result<()> {
        let id = self.id();
        let selected = selected.into();
        self.modify(|payload| {
            let kind = payload.kind();
            let slot = payload.selected_mut().ok_or(UifError::PayloadMismatch {
                id,
                kind,
                field: "selected",
            })?;
            *slot = selected;
            Ok(())
        })
    }

    /// Replace the options of a combo box
    pub fn set_options<I, S>(&self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.id();
        let options: Vec<String> = options.into_iter().map(Into::into).collect();
        self.modify(|payload| {
            let kind = payload.kind();
            let slot = payload.options_mut().ok_or(UifError::PayloadMismatch {
                id,
                kind,
                field: "options",
            })?;
            *slot = options;
            Ok(())
        })
    }

    /// Set the title of a window
    pub fn set_title(&self, title: impl Into<String>) -> Result<()> {
        let id = self.id();
        let title = title.into();
        self.modify(|payload| {
            let kind = payload.kind();
            let slot = payload.title_mut().ok_or(UifError::PayloadMismatch {
                id,
                kind,
                field: "title",
            })?;
            *slot = title;
            Ok(())
        })
    }

    // --- Listeners ---

    /// Observe host-side edits of a text input or combo box.
    ///
    /// A fresh correlation token is stored in the payload's `on_changed`
    /// field and `callback` is registered for it. The callback runs on
    /// the read loop after the new value has been merged.
    pub fn on_changed<F>(&self, callback: F) -> Result<CorrelationToken>
    where
        F: Fn(&Node, &Event) -> Result<()> + Send + Sync + 'static,
    {
        self.bind_token("on_changed", Payload::change_token_mut, Arc::new(callback))
    }

    /// Observe clicks on a button.
    pub fn on_clicked<F>(&self, callback: F) -> Result<CorrelationToken>
    where
        F: Fn(&Node, &Event) -> Result<()> + Send + Sync + 'static,
    {
        self.bind_token("on_clicked", Payload::click_token_mut, Arc::new(callback))
    }

    fn bind_token(
        &self,
        field: &'static str,
        slot: fn(&mut Payload) -> Option<&mut CorrelationToken>,
        callback: Callback,
    ) -> Result<CorrelationToken> {
        let shared = self.client().ok_or(UifError::NotAttached(self.id()))?;
        let token = shared.tokens.next_token();
        let id = self.id();
        let assigned = token.clone();
        self.modify(move |payload| {
            let kind = payload.kind();
            let target = slot(payload).ok_or(UifError::PayloadMismatch { id, kind, field })?;
            *target = assigned;
            Ok(())
        })?;
        shared.register_listener(token.clone(), self.clone(), callback)?;
        Ok(token)
    }

    /// Flush the owning client's pending transaction.
    pub fn flush(&self) -> Result<()> {
        self.client()
            .ok_or(UifError::NotAttached(self.id()))?
            .flush()
    }

    // --- Locking ---

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, NodeInner>> {
        self.0
            .inner
            .lock()
            .map_err(|e| UifError::poisoned("node", e))
    }

    /// Read access; tolerates poisoning since readers only copy data out.
    fn read(&self) -> MutexGuard<'_, NodeInner> {
        self.0.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("kind", &inner.payload.as_ref().map(Payload::kind))
            .field("children", &inner.children.len())
            .field("attached", &inner.client.is_some())
            .finish()
    }
}

fn record_replace(state: &mut ClientState, object_id: ObjectId, payload: &Payload) {
    tracing::debug!("Recording ReplaceNode for {}", object_id);
    state.tx.push(EditCommand::ReplaceNode {
        object_id,
        node: NodeSnapshot::from(payload),
    });
}

/// Link `child` under the attached `parent` and attach its subtree.
fn attach_subtree(
    shared: &Arc<Shared>,
    state: &mut ClientState,
    parent: &Node,
    child: &Node,
) -> Result<()> {
    {
        let mut parent_inner = parent.lock()?;
        child.link_parent(parent)?;
        parent_inner.children.push(child.clone());
    }

    let client = Arc::downgrade(shared);
    let mut stack = vec![(parent.id(), child.clone())];
    while let Some((parent_id, node)) = stack.pop() {
        let mut inner = node.lock()?;
        inner.client = Some(client.clone());

        let snapshot = inner
            .payload
            .as_ref()
            .map(NodeSnapshot::from)
            .unwrap_or_default();
        tracing::debug!("Recording AppendChild {} under {}", node.id(), parent_id);
        state.tx.push(EditCommand::AppendChild {
            parent_id,
            object_id: node.id(),
            node: snapshot,
        });
        state.nodes.insert(node.id(), Arc::downgrade(&node.0));

        // Reversed so the first child is visited first.
        for grandchild in inner.children.iter().rev() {
            stack.push((node.id(), grandchild.clone()));
        }
    }
    Ok(())
}
