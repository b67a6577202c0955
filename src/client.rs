//! Client: one connection, one mirrored tree, one pending transaction
//!
//! # Architecture
//!
//! Two activities share a [`Client`]:
//!
//! - **Caller thread** - builds and mutates the tree, calls [`Client::flush`]
//! - **Read loop** - a dedicated thread decoding inbound events and running
//!   listeners (see [`crate::dispatch`])
//!
//! The pending transaction, the node index, the listener list and the
//! outbound half of the connection live in a single mutex per client.
//! Every edit and every remote merge happens inside it, and a flush
//! serializes and writes the whole transaction while holding it, so
//! concurrent flushes never interleave.
//!
//! # Example
//!
//! ```ignore
//! use uif_client::{Client, ClientConfig, Node};
//!
//! let client = Client::dial(&ClientConfig::default())?;
//! let label = Node::label("Hello");
//! client.root().append(&label)?;
//!
//! let input = Node::text_input("");
//! client.root().append(&input)?;
//! let mirror = label.clone();
//! input.on_changed(move |input, _event| {
//!     mirror.set_text(input.text().unwrap_or_default())?;
//!     input.flush()
//! })?;
//!
//! client.flush()?;
//! ```

use crate::config::ClientConfig;
use crate::dispatch::{self, Callback, ListenerRegistry, NodeIndex};
use crate::error::{Result, UifError};
use crate::id::{CorrelationToken, IdAllocator};
use crate::node::Node;
use crate::protocol::{Event, Transaction};
use crate::transport::{websocket, Inbound, Outbound};
use crate::types::{ConnectionState, DisconnectReason};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// State guarded by the client's exclusive scope
pub(crate) struct ClientState {
    /// Edits since the last successful flush
    pub(crate) tx: Transaction,
    /// Attached nodes by id, for reconciliation
    pub(crate) nodes: NodeIndex,
    pub(crate) listeners: ListenerRegistry,
    outbound: Box<dyn Outbound>,
}

/// Part of a client shared with its nodes and its read loop
pub(crate) struct Shared {
    pub(crate) client_id: String,
    /// Correlation token issuer
    pub(crate) tokens: IdAllocator,
    state: Mutex<ClientState>,
    connection: Mutex<ConnectionState>,
    connection_changed: Condvar,
    state_tx: Sender<ConnectionState>,
    closing: AtomicBool,
}

impl Shared {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, ClientState>> {
        self.state
            .lock()
            .map_err(|e| UifError::poisoned("client state", e))
    }

    /// Serialize and send the pending transaction as one message.
    ///
    /// On failure the transaction is left as it was.
    pub(crate) fn flush(&self) -> Result<()> {
        let mut state = self.lock()?;
        let count = state.tx.len();
        let message = state.tx.encode()?;

        if let Err(e) = state.outbound.send(&message) {
            tracing::warn!("Flush of {} edits failed: {}", count, e);
            return Err(e);
        }

        state.tx.clear();
        tracing::debug!("Flushed {} edits for {}", count, self.client_id);
        Ok(())
    }

    pub(crate) fn register_listener(
        &self,
        token: CorrelationToken,
        node: Node,
        callback: Callback,
    ) -> Result<()> {
        self.lock()?.listeners.register(token, node, callback);
        Ok(())
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    pub(crate) fn set_connection_state(&self, new_state: ConnectionState) {
        {
            let mut current = self
                .connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *current = new_state.clone();
        }
        self.connection_changed.notify_all();
        // Nobody listening is fine.
        let _ = self.state_tx.send(new_state);
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Connection to a host plus the tree mirrored over it
pub struct Client {
    shared: Arc<Shared>,
    root: Node,
    state_rx: Receiver<ConnectionState>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connect to the host named by `config` over websocket.
    pub fn dial(config: &ClientConfig) -> Result<Self> {
        tracing::info!("Dialing {}", config.url);
        let (outbound, inbound) = websocket::connect(&config.url)?;
        let client = Self::with_transport(config, outbound, inbound)?;
        tracing::info!("Connected to {} as {}", config.url, config.client_id);
        Ok(client)
    }

    /// Connect to `url` with default settings.
    pub fn connect(url: &str) -> Result<Self> {
        Self::dial(&ClientConfig::default().with_url(url))
    }

    /// Build a client over an already established connection and start
    /// its read loop.
    pub fn with_transport<O, I>(config: &ClientConfig, outbound: O, inbound: I) -> Result<Self>
    where
        O: Outbound + 'static,
        I: Inbound + 'static,
    {
        let (state_tx, state_rx) = unbounded();
        let shared = Arc::new(Shared {
            client_id: config.client_id.clone(),
            tokens: IdAllocator::new(),
            state: Mutex::new(ClientState {
                tx: Transaction::new(config.client_id.clone()),
                nodes: NodeIndex::new(),
                listeners: ListenerRegistry::default(),
                outbound: Box::new(outbound),
            }),
            connection: Mutex::new(ConnectionState::Connected),
            connection_changed: Condvar::new(),
            state_tx,
            closing: AtomicBool::new(false),
        });
        let root = Node::root(&shared);

        let reader_shared = shared.clone();
        let inbound: Box<dyn Inbound> = Box::new(inbound);
        let handle = std::thread::Builder::new()
            .name(config.read_thread_name.clone())
            .spawn(move || dispatch::run_read_loop(reader_shared, inbound))?;

        Ok(Self {
            shared,
            root,
            state_rx,
            reader: Mutex::new(Some(handle)),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    /// The sentinel root; top-level nodes are appended here
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Send all pending edits as one transaction.
    ///
    /// On success the pending transaction starts over empty. On failure
    /// it is kept unchanged and the call may be retried.
    pub fn flush(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Number of edits waiting for the next flush
    pub fn pending_edits(&self) -> Result<usize> {
        Ok(self.shared.lock()?.tx.len())
    }

    /// Copy of the pending transaction
    pub fn pending_transaction(&self) -> Result<Transaction> {
        Ok(self.shared.lock()?.tx.clone())
    }

    /// Register `callback` for events carrying `token`.
    ///
    /// `node` must belong to this client. Several callbacks may share a
    /// token; they run in registration order.
    pub fn on_update<F>(&self, node: &Node, token: CorrelationToken, callback: F) -> Result<()>
    where
        F: Fn(&Node, &Event) -> Result<()> + Send + Sync + 'static,
    {
        let owned = node
            .client()
            .is_some_and(|shared| Arc::ptr_eq(&shared, &self.shared));
        if !owned {
            return Err(UifError::NotAttached(node.id()));
        }
        self.shared
            .register_listener(token, node.clone(), Arc::new(callback))
    }

    /// Issue a fresh correlation token
    pub fn next_token(&self) -> CorrelationToken {
        self.shared.tokens.next_token()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.connection_state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// Receiver of connection state transitions.
    ///
    /// All receivers share one queue; each transition is delivered once.
    pub fn state_changes(&self) -> Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Block until the read loop stops or `timeout` elapses.
    pub fn wait_for_disconnect(&self, timeout: Duration) -> Option<DisconnectReason> {
        let guard = self
            .shared
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .shared
            .connection_changed
            .wait_timeout_while(guard, timeout, |state| state.is_connected())
            .unwrap_or_else(PoisonError::into_inner);

        match &*guard {
            ConnectionState::Disconnected(reason) => Some(reason.clone()),
            ConnectionState::Connected => None,
        }
    }

    /// Close the connection and stop the read loop.
    ///
    /// Pending edits are not flushed. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Closing connection {}", self.shared.client_id);

        self.shared.lock()?.outbound.close()?;

        let handle = self
            .reader
            .lock()
            .map_err(|e| UifError::poisoned("reader handle", e))?
            .take();
        if let Some(handle) = handle {
            // A listener may close the client from the read loop itself.
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                tracing::warn!("Read loop for {} panicked", self.shared.client_id);
            }
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close {}: {}", self.shared.client_id, e);
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("client_id", &self.shared.client_id)
            .field("connection", &self.connection_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EditCommand;
    use crate::transport::memory::{self, HostEnd};
    use crate::transport::MockOutbound;
    use std::sync::atomic::AtomicUsize;

    const WAIT: Duration = Duration::from_millis(500);

    fn memory_client() -> (Client, HostEnd) {
        let (outbound, inbound, host) = memory::pair();
        let client = Client::with_transport(&ClientConfig::default(), outbound, inbound).unwrap();
        (client, host)
    }

    /// Outbound whose first `failures` sends fail; successful sends are recorded.
    fn flaky_outbound(failures: usize, sent: Arc<Mutex<Vec<String>>>) -> MockOutbound {
        let calls = AtomicUsize::new(0);
        let mut mock = MockOutbound::new();
        mock.expect_send().returning(move |text| {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                Err(UifError::Transport("connection reset".to_string()))
            } else {
                sent.lock().unwrap().push(text.to_string());
                Ok(())
            }
        });
        mock.expect_close().returning(|| Ok(()));
        mock
    }

    #[test]
    fn test_flush_clears_pending_edits() {
        let (client, host) = memory_client();
        client.root().append(&Node::label("a")).unwrap();
        client.root().append(&Node::label("b")).unwrap();
        assert_eq!(client.pending_edits().unwrap(), 2);

        client.flush().unwrap();

        assert_eq!(client.pending_edits().unwrap(), 0);
        let tx = host.recv_transaction(WAIT).unwrap();
        assert_eq!(tx.client_id, "gouif2");
        assert_eq!(tx.len(), 2);
        assert_eq!(client.pending_transaction().unwrap().client_id, "gouif2");
    }

    #[test]
    fn test_failed_flush_keeps_transaction() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        // The memory writer is unused; dropping it lets the read loop end.
        let (unused, inbound, _host) = memory::pair();
        drop(unused);
        let client = Client::with_transport(
            &ClientConfig::default(),
            flaky_outbound(1, sent.clone()),
            inbound,
        )
        .unwrap();

        let label = Node::label("Hi");
        client.root().append(&label).unwrap();
        label.set_text("Hello").unwrap();
        let before = client.pending_transaction().unwrap();

        let err = client.flush().unwrap_err();
        assert!(matches!(err, UifError::Transport(_)));
        assert_eq!(client.pending_transaction().unwrap(), before);

        client.flush().unwrap();
        assert_eq!(client.pending_edits().unwrap(), 0);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(Transaction::decode(&sent[0]).unwrap(), before);
    }

    #[test]
    fn test_empty_flush_still_sends() {
        let (client, host) = memory_client();
        client.flush().unwrap();
        let tx = host.recv_transaction(WAIT).unwrap();
        assert!(tx.is_empty());
    }

    #[test]
    fn test_replace_records_whole_payload() {
        let (client, _host) = memory_client();
        let combo = Node::combo_box("Mode", ["A", "B"]);
        client.root().append(&combo).unwrap();
        client.flush().unwrap();

        combo.set_selected("B").unwrap();
        combo.set_selected("A").unwrap();

        let tx = client.pending_transaction().unwrap();
        assert_eq!(tx.len(), 2, "redundant replaces are kept");
        match &tx.edits[0] {
            EditCommand::ReplaceNode { object_id, node } => {
                assert_eq!(*object_id, combo.id());
                let payload = node.combo_box.as_ref().unwrap();
                assert_eq!(payload.selected, "B");
                assert_eq!(payload.options, vec!["A", "B"]);
                assert_eq!(payload.label, "Mode");
            }
            other => panic!("unexpected edit {:?}", other),
        }
    }

    #[test]
    fn test_root_cannot_be_replaced() {
        let (client, _host) = memory_client();
        assert!(matches!(
            client.root().replace(),
            Err(UifError::RootNotReplaceable)
        ));
        assert!(matches!(
            client.root().append(client.root()),
            Err(UifError::InvalidChild(_))
        ));
    }

    #[test]
    fn test_on_update_requires_own_node() {
        let (client, _host) = memory_client();
        let (other, _other_host) = memory_client();
        let label = Node::label("x");
        other.root().append(&label).unwrap();

        let res = client.on_update(&label, client.next_token(), |_, _| Ok(()));
        assert!(matches!(res, Err(UifError::NotAttached(_))));
        assert!(other
            .on_update(&label, other.next_token(), |_, _| Ok(()))
            .is_ok());
    }

    #[test]
    fn test_close_reports_local_disconnect() {
        let (client, _host) = memory_client();
        assert!(client.is_connected());
        client.close().unwrap();

        assert_eq!(
            client.wait_for_disconnect(WAIT),
            Some(DisconnectReason::Local)
        );
        client.close().unwrap();
    }

    #[test]
    fn test_state_changes_reports_transition() {
        let (client, mut host) = memory_client();
        let changes = client.state_changes();
        host.close();

        let state = changes.recv_timeout(WAIT).unwrap();
        assert_eq!(state, ConnectionState::Disconnected(DisconnectReason::Closed));
    }
}
