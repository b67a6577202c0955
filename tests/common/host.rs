//! Helpers standing in for the host renderer

use uif_client::transport::memory::{self, HostEnd};
use uif_client::{Client, ClientConfig, EditCommand, Event, NodeSnapshot, ObjectId, Transaction};

/// Client wired to an in-process host
pub fn memory_client() -> (Client, HostEnd) {
    memory_client_with_id("gouif2")
}

pub fn memory_client_with_id(client_id: &str) -> (Client, HostEnd) {
    let (outbound, inbound, host) = memory::pair();
    let config = ClientConfig::default().with_client_id(client_id);
    let client = Client::with_transport(&config, outbound, inbound).expect("client should start");
    (client, host)
}

/// Update event as the host sends it after a user edit
pub fn update_event(token: &str, object_id: ObjectId, node: NodeSnapshot) -> Event {
    Event::Update {
        id: token.into(),
        object_id,
        node,
    }
}

/// `(parent, object)` pairs of every AppendChild in `tx`
pub fn appended(tx: &Transaction) -> Vec<(ObjectId, ObjectId)> {
    tx.edits
        .iter()
        .filter_map(|edit| match edit {
            EditCommand::AppendChild {
                parent_id,
                object_id,
                ..
            } => Some((*parent_id, *object_id)),
            EditCommand::ReplaceNode { .. } => None,
        })
        .collect()
}
