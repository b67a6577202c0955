//! # UIF Client: Remote UI Tree Mirror
//!
//! A client library that builds a tree of UI elements locally and keeps a
//! host renderer in sync with it over a persistent websocket connection.
//! The host draws; the client owns an addressable mirror of the tree and
//! a log of edits not yet sent.
//!
//! ## Architecture
//!
//! - **Identity**: process-unique object ids and per-client correlation tokens ([`id`])
//! - **Node Tree**: cloneable [`Node`] handles, each wrapping one [`Payload`] ([`node`])
//! - **Transactions**: every tree change becomes an [`EditCommand`] in the pending [`Transaction`] ([`protocol`])
//! - **Transport**: a writer half owned by the client and a reader half owned by the read loop ([`transport`])
//! - **Dispatch**: inbound [`Event`]s are merged into local payloads, then routed to listeners ([`dispatch`])
//!
//! ## Concurrency
//!
//! The caller's thread and the read loop share one mutex per client
//! guarding the pending transaction, node payloads and the connection
//! writer. Listener callbacks run on the read loop without the lock held
//! and may flush or mutate the tree.
//!
//! ## Example
//!
//! ```ignore
//! use uif_client::{Client, ClientConfig, Node};
//!
//! let client = Client::dial(&ClientConfig::load_or_default())?;
//!
//! let label = Node::label("Hello");
//! client.root().append(&label)?;
//!
//! let input = Node::text_input("");
//! client.root().append(&input)?;
//!
//! let mirror = label.clone();
//! input.on_changed(move |input, _event| {
//!     mirror.set_text(input.text().unwrap_or_default())?;
//!     input.flush()
//! })?;
//!
//! client.flush()?;
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod id;
pub mod node;
pub mod payload;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::Client;
pub use config::ClientConfig;
pub use dispatch::Callback;
pub use error::{Result, ResultExt, UifError};
pub use id::{CorrelationToken, IdAllocator, ObjectId};
pub use node::Node;
pub use payload::{Button, ComboBox, Label, LeftToRightLayout, Payload, TextInput, Window};
pub use protocol::{EditCommand, Event, NodeSnapshot, Transaction};
pub use types::{ConnectionState, DisconnectReason};
