//! Core data types shared across the client

use std::fmt;

/// Why the inbound read loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The host closed the connection
    Closed,
    /// The local side closed the connection
    Local,
    /// An inbound message could not be decoded
    Decode(String),
    /// Reading from the connection failed
    Transport(String),
    /// Client state became unusable (poisoned lock)
    Internal(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Closed => write!(f, "closed by host"),
            DisconnectReason::Local => write!(f, "closed locally"),
            DisconnectReason::Decode(msg) => write!(f, "malformed message: {}", msg),
            DisconnectReason::Transport(msg) => write!(f, "read failed: {}", msg),
            DisconnectReason::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

/// State of a client's connection, as observed by the read loop.
///
/// Once `Disconnected`, no further events are delivered for that
/// connection. Outbound flushes are still attempted and report their own
/// errors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Connected and receiving events
    #[default]
    Connected,
    /// The read loop has terminated
    Disconnected(DisconnectReason),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected(reason) => write!(f, "Disconnected ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        let state = ConnectionState::Disconnected(DisconnectReason::Decode("eof".to_string()));
        assert_eq!(state.to_string(), "Disconnected (malformed message: eof)");
        assert!(!state.is_connected());
    }
}
