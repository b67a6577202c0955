//! Error handling for the UIF client
//!
//! This module defines the crate error type and a Result alias used by
//! every fallible operation in the library.

use crate::id::ObjectId;
use thiserror::Error;

/// Main error type for UIF client operations
#[derive(Error, Debug)]
pub enum UifError {
    /// Dialing the host failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Writing to (or reading from) an established connection failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// An inbound message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// An outbound transaction could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation needs a node that is part of a connected tree
    #[error("Node {0} is not attached to a client")]
    NotAttached(ObjectId),

    /// The node already has a parent
    #[error("Node {0} already has a parent")]
    AlreadyAttached(ObjectId),

    /// Appending would make a node its own ancestor
    #[error("Appending node {child} under {parent} would create a cycle")]
    CycleDetected { parent: ObjectId, child: ObjectId },

    /// The root cannot be appended anywhere
    #[error("Node {0} cannot be used as a child")]
    InvalidChild(ObjectId),

    /// The root carries no payload and cannot be replaced
    #[error("The root node has no payload to replace")]
    RootNotReplaceable,

    /// The payload variant does not have the requested field
    #[error("Payload of node {id} is a {kind}, which has no `{field}`")]
    PayloadMismatch {
        id: ObjectId,
        kind: &'static str,
        field: &'static str,
    },

    /// A mutex guarding client or node state was poisoned
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<UifError>,
    },
}

impl UifError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        UifError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a lock error from a poisoned guard
    pub(crate) fn poisoned<E: std::fmt::Display>(what: &str, err: E) -> Self {
        UifError::LockPoisoned(format!("{}: {}", what, err))
    }
}

/// Result type alias for UIF client operations
pub type Result<T> = std::result::Result<T, UifError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
