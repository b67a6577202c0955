//! Event dispatch and state reconciliation
//!
//! Inbound events are handled on the client's read loop thread:
//!
//! 1. The message is decoded into an [`Event`]. A malformed message ends
//!    the loop; the client's connection state becomes `Disconnected`.
//! 2. For `Update` events, the snapshot is merged into the local node
//!    (see [`crate::payload::Payload::merge_remote`]) under the client
//!    lock.
//! 3. The lock is released and every listener registered for the event's
//!    token is invoked in registration order. Callbacks may flush or
//!    mutate the tree.
//!
//! Events nobody listens for are dropped.

use crate::client::Shared;
use crate::error::{Result, UifError};
use crate::id::{CorrelationToken, ObjectId};
use crate::node::{Node, NodeCell};
use crate::protocol::Event;
use crate::transport::Inbound;
use crate::types::{ConnectionState, DisconnectReason};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// User callback invoked for a routed event.
///
/// Receives the node the listener was registered on and the event. An
/// error is logged and does not stop the read loop.
pub type Callback = Arc<dyn Fn(&Node, &Event) -> Result<()> + Send + Sync>;

/// A callback bound to a correlation token
pub(crate) struct Listener {
    token: CorrelationToken,
    node: Node,
    callback: Callback,
}

/// Ordered listener list of one client
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<Listener>,
}

impl ListenerRegistry {
    pub(crate) fn register(&mut self, token: CorrelationToken, node: Node, callback: Callback) {
        tracing::debug!(
            "Registered listener for {} on {} ({} total)",
            token,
            node.id(),
            self.len() + 1
        );
        self.listeners.push(Listener {
            token,
            node,
            callback,
        });
    }

    /// Listeners for `token`, in registration order
    pub(crate) fn matching(&self, token: &CorrelationToken) -> Vec<(Node, Callback)> {
        self.listeners
            .iter()
            .filter(|l| &l.token == token)
            .map(|l| (l.node.clone(), l.callback.clone()))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// Weak index of attached nodes by object id
pub(crate) type NodeIndex = HashMap<ObjectId, Weak<NodeCell>>;

/// Merge an update into the local tree. Caller holds the client lock.
fn reconcile(nodes: &NodeIndex, event: &Event) -> Result<()> {
    let Event::Update {
        object_id, node, ..
    } = event
    else {
        return Ok(());
    };

    let Some(remote) = node.clone().into_payload()? else {
        tracing::debug!("Update for {} carries no payload", object_id);
        return Ok(());
    };

    let Some(cell) = nodes.get(object_id).and_then(Weak::upgrade) else {
        tracing::warn!("Update for unknown node {}", object_id);
        return Ok(());
    };

    let local = Node(cell);
    let mut inner = local.lock()?;
    let Some(payload) = inner.payload.as_mut() else {
        tracing::warn!("Update targets the root");
        return Ok(());
    };
    if payload.merge_remote(&remote) {
        tracing::debug!("Merged remote {} into {}", remote.kind(), object_id);
    } else {
        tracing::debug!(
            "Remote {} not merged into local {} ({})",
            remote.kind(),
            payload.kind(),
            object_id
        );
    }
    Ok(())
}

/// Reconcile local state for `event`, then invoke its listeners.
///
/// Returns the number of callbacks invoked.
pub(crate) fn dispatch(shared: &Shared, event: &Event) -> Result<usize> {
    let targets = {
        let state = shared.lock()?;
        reconcile(&state.nodes, event)?;
        state.listeners.matching(event.token())
    };

    if targets.is_empty() {
        tracing::debug!("No listener for {}, dropping event", event.token());
        return Ok(0);
    }

    for (node, callback) in &targets {
        if let Err(e) = callback(node, event) {
            tracing::warn!("Listener for {} failed: {}", event.token(), e);
        }
    }
    Ok(targets.len())
}

/// Body of the read loop thread.
///
/// Runs until the connection closes or a message cannot be handled, then
/// publishes the final [`ConnectionState`]. It never reconnects.
pub(crate) fn run_read_loop(shared: Arc<Shared>, mut inbound: Box<dyn Inbound>) {
    tracing::debug!("Read loop started for {}", shared.client_id);

    let reason = loop {
        let text = match inbound.recv() {
            Ok(Some(text)) => text,
            Ok(None) if shared.is_closing() => break DisconnectReason::Local,
            Ok(None) => break DisconnectReason::Closed,
            Err(_) if shared.is_closing() => break DisconnectReason::Local,
            Err(e) => break DisconnectReason::Transport(e.to_string()),
        };

        let event = match Event::decode(&text) {
            Ok(event) => event,
            Err(e) => break DisconnectReason::Decode(e.to_string()),
        };

        match dispatch(&shared, &event) {
            Ok(_) => {}
            Err(UifError::Decode(msg)) => break DisconnectReason::Decode(msg),
            Err(e) => break DisconnectReason::Internal(e.to_string()),
        }
    };

    match &reason {
        DisconnectReason::Local | DisconnectReason::Closed => {
            tracing::info!("Connection {}: {}", shared.client_id, reason);
        }
        _ => tracing::error!("Read loop for {} terminated: {}", shared.client_id, reason),
    }
    shared.set_connection_state(ConnectionState::Disconnected(reason));
}
