//! In-process transport
//!
//! [`pair`] creates a client-side connection plus the [`HostEnd`] that
//! plays the host: it sees every flushed transaction and can inject
//! events. Used by the integration tests.

use super::{Inbound, Outbound};
use crate::error::{Result, UifError};
use crate::protocol::{Event, Transaction};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Client writer half of an in-process connection
#[derive(Debug)]
pub struct MemoryOutbound {
    sent: Sender<String>,
    shutdown: Option<Sender<()>>,
}

/// Client reader half of an in-process connection
#[derive(Debug)]
pub struct MemoryInbound {
    events: Receiver<String>,
    shutdown: Receiver<()>,
}

/// Host side of an in-process connection
#[derive(Debug)]
pub struct HostEnd {
    sent: Receiver<String>,
    events: Option<Sender<String>>,
}

/// Create a connected in-process transport.
pub fn pair() -> (MemoryOutbound, MemoryInbound, HostEnd) {
    let (sent_tx, sent_rx) = unbounded();
    let (events_tx, events_rx) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded();

    (
        MemoryOutbound {
            sent: sent_tx,
            shutdown: Some(shutdown_tx),
        },
        MemoryInbound {
            events: events_rx,
            shutdown: shutdown_rx,
        },
        HostEnd {
            sent: sent_rx,
            events: Some(events_tx),
        },
    )
}

impl Outbound for MemoryOutbound {
    fn send(&mut self, text: &str) -> Result<()> {
        if self.shutdown.is_none() {
            return Err(UifError::Transport("connection closed".to_string()));
        }
        self.sent
            .send(text.to_string())
            .map_err(|_| UifError::Transport("host end dropped".to_string()))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the sender disconnects the reader's shutdown channel.
        self.shutdown.take();
        Ok(())
    }
}

impl Inbound for MemoryInbound {
    fn recv(&mut self) -> Result<Option<String>> {
        crossbeam_channel::select! {
            recv(self.events) -> msg => Ok(msg.ok()),
            recv(self.shutdown) -> _ => Ok(None),
        }
    }
}

impl HostEnd {
    /// Deliver an event to the client.
    pub fn send_event(&self, event: &Event) -> Result<()> {
        self.send_raw(&event.encode()?)
    }

    /// Deliver an arbitrary (possibly malformed) message to the client.
    pub fn send_raw(&self, text: &str) -> Result<()> {
        let events = self
            .events
            .as_ref()
            .ok_or_else(|| UifError::Transport("host end closed".to_string()))?;
        events
            .send(text.to_string())
            .map_err(|_| UifError::Transport("client reader dropped".to_string()))
    }

    /// Wait for the next flushed transaction.
    pub fn recv_transaction(&self, timeout: Duration) -> Result<Transaction> {
        let text = self.recv_raw(timeout)?;
        Transaction::decode(&text)
    }

    /// Wait for the next raw outbound message.
    pub fn recv_raw(&self, timeout: Duration) -> Result<String> {
        self.sent.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => {
                UifError::Transport("timed out waiting for a transaction".to_string())
            }
            RecvTimeoutError::Disconnected => {
                UifError::Transport("client writer dropped".to_string())
            }
        })
    }

    /// Drain every message flushed so far without blocking.
    pub fn drain(&self) -> Vec<String> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.sent.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    /// Close the host side; the client's read loop sees a clean close.
    pub fn close(&mut self) {
        self.events.take();
    }
}
