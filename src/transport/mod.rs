//! Transport layer for the persistent host connection
//!
//! A connection is split into two halves so the read loop can block on
//! inbound messages while the caller's thread flushes:
//!
//! - [`Outbound`] - owned by the [`crate::Client`]; one call per flushed transaction
//! - [`Inbound`] - owned by the read loop thread
//!
//! # Implementations
//!
//! - [`websocket`] - tungstenite websocket over plain TCP, used by [`crate::Client::dial`]
//! - [`memory`] - in-process channel pair for tests and demos

pub mod memory;
pub mod websocket;

use crate::error::Result;

/// Writer half of a connection.
#[cfg_attr(test, mockall::automock)]
pub trait Outbound: Send {
    /// Send one complete message.
    ///
    /// Either the whole message is handed to the connection or an error
    /// is returned.
    fn send(&mut self, text: &str) -> Result<()>;

    /// Close the connection, unblocking the reader half.
    fn close(&mut self) -> Result<()>;
}

/// Reader half of a connection.
pub trait Inbound: Send {
    /// Block until the next message arrives.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    fn recv(&mut self) -> Result<Option<String>>;
}
