//! Identity types for the node tree.
//!
//! Object ids are newtypes over `u32` shared with the host. The value
//! `0xFFFF_FFFF` is reserved for the root and is never handed out by an
//! [`IdAllocator`]. Correlation tokens are opaque strings that link an
//! inbound event to the listeners registered for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Wire id of a node, unique for the lifetime of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Implicit parent of every top-level node.
    pub const ROOT: ObjectId = ObjectId(0xff_ff_ff_ff);

    #[inline]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "ObjectId(ROOT)")
        } else {
            write!(f, "ObjectId({})", self.0)
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Opaque string routing an event to its listeners.
///
/// Tokens are scoped per node field, so two fields of the same node can
/// be observed independently.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(pub String);

impl CorrelationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// First value the object counter holds; the first id issued is one above it.
const FIRST_OBJECT_COUNTER: u32 = 1;

/// Prefix of generated correlation tokens.
const TOKEN_PREFIX: &str = "cb";

/// Monotonic issuer of object ids and correlation tokens.
///
/// Both counters are atomics, so an allocator can be shared between the
/// thread building the tree and callbacks running on the read loop. Ids
/// are never reclaimed.
#[derive(Debug)]
pub struct IdAllocator {
    next_object: AtomicU32,
    next_token: AtomicU64,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self {
            next_object: AtomicU32::new(FIRST_OBJECT_COUNTER),
            next_token: AtomicU64::new(0),
        }
    }

    /// The process-wide allocator used by [`crate::Node`] constructors.
    pub fn global() -> &'static IdAllocator {
        static GLOBAL: IdAllocator = IdAllocator::new();
        &GLOBAL
    }

    /// Issue the next object id.
    ///
    /// # Panics
    ///
    /// Panics once every id below the reserved root id has been issued.
    /// The counter stays exhausted; it never wraps to reissue ids.
    pub fn next_object_id(&self) -> ObjectId {
        let previous = self
            .next_object
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                n.checked_add(1).filter(|&id| id != ObjectId::ROOT.0)
            })
            .unwrap_or_else(|_| panic!("object id space exhausted"));
        ObjectId(previous + 1)
    }

    /// Issue the next correlation token.
    pub fn next_token(&self) -> CorrelationToken {
        let n = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        CorrelationToken(format!("{}{}", TOKEN_PREFIX, n))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
