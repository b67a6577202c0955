//! Integration tests for tree mutation and flushing
//!
//! These tests validate how local tree changes reach the host:
//! - Edits are only recorded for nodes reachable from the root
//! - Subtrees are sent parent-first, one AppendChild per node
//! - Flush sends everything once and starts a fresh transaction

mod common;

use common::builders::FormBuilder;
use common::host::{appended, memory_client};
use common::test_timeout;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use uif_client::{EditCommand, Node, ObjectId, Transaction, UifError};

#[test]
fn test_detached_building_records_nothing() {
    let (client, _host) = memory_client();

    let (window, fields) = FormBuilder::new("Detached")
        .label("a")
        .text_input("b")
        .build();
    fields[0].set_text("changed").unwrap();
    let row = Node::row();
    window.append(&row).unwrap();
    row.append(&Node::button("c")).unwrap();

    assert_eq!(client.pending_edits().unwrap(), 0);
    assert!(!window.is_attached());
}

#[test]
fn test_attaching_subtree_emits_one_edit_per_node_top_down() {
    let (client, _host) = memory_client();

    let window = Node::window("Main");
    let label = Node::label("Name");
    let row = Node::row();
    let ok = Node::button("OK");
    let cancel = Node::button("Cancel");
    window.append(&label).unwrap();
    window.append(&row).unwrap();
    row.append(&ok).unwrap();
    row.append(&cancel).unwrap();

    client.root().append(&window).unwrap();

    let tx = client.pending_transaction().unwrap();
    assert_eq!(
        appended(&tx),
        vec![
            (ObjectId::ROOT, window.id()),
            (window.id(), label.id()),
            (window.id(), row.id()),
            (row.id(), ok.id()),
            (row.id(), cancel.id()),
        ]
    );

    let ids: Vec<_> = appended(&tx).into_iter().map(|(_, id)| id).collect();
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
    assert!(ids.iter().all(|id| !id.is_root()));
    // Built in creation order, so the ids increase along the edit log.
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    for node in [&window, &label, &row, &ok, &cancel] {
        assert!(node.is_attached());
    }
}

#[test]
fn test_hello_label_wire_message() {
    let (client, host) = memory_client();
    let label = Node::label("Hi");
    client.root().append(&label).unwrap();
    client.flush().unwrap();

    let message = host.recv_raw(test_timeout()).unwrap();
    let expected = format!(
        r#"{{"client_id":"gouif2","edits":[{{"append_child":{{"parent_id":4294967295,"object_id":{},"node":{{"label":{{"text":"Hi"}}}}}}}}]}}"#,
        label.id().0
    );
    assert_eq!(message, expected);
}

#[test]
fn test_flush_sends_edits_in_order_and_resets() {
    let (client, host) = memory_client();
    let label = Node::label("one");
    client.root().append(&label).unwrap();
    label.set_text("two").unwrap();
    label.set_text("three").unwrap();
    let pending = client.pending_transaction().unwrap();
    assert_eq!(pending.len(), 3);

    client.flush().unwrap();
    assert_eq!(client.pending_edits().unwrap(), 0);

    let sent = host.recv_transaction(test_timeout()).unwrap();
    assert_eq!(sent, pending);
    let texts: Vec<_> = sent
        .edits
        .iter()
        .filter_map(|edit| match edit {
            EditCommand::ReplaceNode { node, .. } => node.label.as_ref().map(|l| l.text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["two", "three"]);

    client.flush().unwrap();
    assert!(host.recv_transaction(test_timeout()).unwrap().is_empty());
}

#[test]
fn test_detached_changes_are_captured_on_attach() {
    let (client, _host) = memory_client();
    let label = Node::label("draft");
    label.set_text("final").unwrap();
    client.root().append(&label).unwrap();

    let tx = client.pending_transaction().unwrap();
    assert_eq!(tx.len(), 1);
    match &tx.edits[0] {
        EditCommand::AppendChild { node, .. } => {
            assert_eq!(node.label.as_ref().unwrap().text, "final");
        }
        other => panic!("unexpected edit {:?}", other),
    }
}

#[test]
fn test_appending_under_attached_node_uses_its_id() {
    let (client, _host) = memory_client();
    let window = Node::window("W");
    client.root().append(&window).unwrap();
    client.flush().unwrap();

    let label = Node::label("late");
    window.append(&label).unwrap();

    let tx = client.pending_transaction().unwrap();
    assert_eq!(appended(&tx), vec![(window.id(), label.id())]);
    assert_eq!(label.parent_id(), Some(window.id()));
}

#[test]
fn test_double_append_is_rejected_without_edits() {
    let (client, _host) = memory_client();
    let label = Node::label("once");
    client.root().append(&label).unwrap();
    let before = client.pending_edits().unwrap();

    let err = client.root().append(&label).unwrap_err();
    assert!(matches!(err, UifError::AlreadyAttached(id) if id == label.id()));
    assert_eq!(client.pending_edits().unwrap(), before);
    assert_eq!(client.root().children().len(), 1);
}

#[test]
fn test_concurrent_mutation_and_flush_never_interleave() {
    const THREADS: usize = 4;
    const NODES_PER_THREAD: usize = 25;

    let (client, host) = memory_client();
    let client = Arc::new(client);

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let client = client.clone();
            thread::spawn(move || {
                for i in 0..NODES_PER_THREAD {
                    let label = Node::label(format!("{}-{}", t, i));
                    client.root().append(&label).unwrap();
                    label.set_text(format!("{}-{}!", t, i)).unwrap();
                    if i % 5 == 0 {
                        client.flush().unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    client.flush().unwrap();

    let transactions: Vec<Transaction> = host
        .drain()
        .iter()
        .map(|msg| Transaction::decode(msg).expect("every message is one whole transaction"))
        .collect();

    let total: usize = transactions.iter().map(Transaction::len).sum();
    assert_eq!(total, THREADS * NODES_PER_THREAD * 2);

    // Each node's append precedes its replace in the global order.
    let mut seen = HashSet::new();
    for edit in transactions.iter().flat_map(|tx| tx.edits.iter()) {
        match edit {
            EditCommand::AppendChild { object_id, .. } => assert!(seen.insert(*object_id)),
            EditCommand::ReplaceNode { object_id, .. } => assert!(seen.contains(object_id)),
        }
    }
}
