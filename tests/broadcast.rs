mod common;

use std::sync::Arc;

use common::{addrs, shared_node, LocalTransport, Script, ScriptedTransport};
use votenode::audit::{Decision, Direction, EventKind};
use votenode::raft::{MessageBroadcaster, NodeRole};

#[tokio::test]
async fn repeated_broadcasts_are_independent() {
    let (sender, sender_audit) = shared_node(4001, addrs(&[4002]), 1, NodeRole::Follower, 1);
    let (receiver, receiver_audit) = shared_node(4002, addrs(&[4001]), 1, NodeRole::Follower, 1);

    let transport =
        Arc::new(LocalTransport::new().with_node("0.0.0.0:4002", Arc::clone(&receiver)));
    let broadcaster = MessageBroadcaster::new(Arc::clone(&sender), transport);

    let first = broadcaster.broadcast_once().await;
    let second = broadcaster.broadcast_once().await;

    assert_eq!(first.delivered, vec!["0.0.0.0:4002"]);
    assert_eq!(second.delivered, vec!["0.0.0.0:4002"]);
    assert_eq!(first.term, 2);
    assert_eq!(second.term, 3);

    // Two deliveries, two ticks and two records on the receiving side.
    assert_eq!(receiver.lock().await.current_term(), 3);
    let received = receiver_audit.events();
    assert_eq!(received.len(), 2);
    assert!(received
        .iter()
        .all(|e| e.direction == Direction::Received && e.kind == EventKind::Message));
    assert_eq!(received[0].term, 1);
    assert_eq!(received[1].term, 2);

    assert_eq!(sender_audit.len(), 2);
}

#[tokio::test]
async fn failed_peer_is_skipped_and_logged() {
    let peers = addrs(&[4002, 4003, 4004]);
    let (sender, audit) = shared_node(4001, peers.clone(), 2, NodeRole::Leader, 1);
    let transport = Arc::new(ScriptedTransport::new(&[
        ("0.0.0.0:4002", Script::Grant),
        ("0.0.0.0:4003", Script::Unreachable),
        ("0.0.0.0:4004", Script::Grant),
    ]));

    let report = MessageBroadcaster::new(Arc::clone(&sender), Arc::clone(&transport))
        .broadcast_once()
        .await;

    assert_eq!(report.delivered, vec!["0.0.0.0:4002", "0.0.0.0:4004"]);
    assert_eq!(report.failed, vec!["0.0.0.0:4003"]);
    assert_eq!(transport.contacted(), peers);
    assert_eq!(report.term, 3);

    let decisions: Vec<Decision> = audit.events().iter().map(|e| e.decision).collect();
    assert_eq!(
        decisions,
        vec![Decision::Delivered, Decision::Failed, Decision::Delivered]
    );
    // Broadcasting never changes the role.
    assert_eq!(sender.lock().await.role(), NodeRole::Leader);
}

#[tokio::test]
async fn each_message_carries_the_latest_term() {
    let (sender, audit) = shared_node(4001, addrs(&[4002, 4003]), 2, NodeRole::Follower, 7);
    let transport = Arc::new(ScriptedTransport::new(&[]));

    MessageBroadcaster::new(sender, transport).broadcast_once().await;

    let sent_terms: Vec<u64> = audit.events().iter().map(|e| e.term).collect();
    assert_eq!(sent_terms, vec![7, 8]);
}

#[tokio::test]
async fn mismatched_reply_is_reported_as_failure() {
    let peers = addrs(&[4002, 4003]);
    let (sender, audit) = shared_node(4001, peers, 1, NodeRole::Leader, 1);
    let transport = Arc::new(ScriptedTransport::new(&[
        ("0.0.0.0:4002", Script::Mismatched),
        ("0.0.0.0:4003", Script::Grant),
    ]));

    let report = MessageBroadcaster::new(Arc::clone(&sender), transport)
        .broadcast_once()
        .await;

    assert_eq!(report.failed, vec!["0.0.0.0:4002"]);
    assert_eq!(report.delivered, vec!["0.0.0.0:4003"]);
    // Only the well-formed reply moved the term.
    assert_eq!(report.term, 2);

    let decisions: Vec<Decision> = audit.events().iter().map(|e| e.decision).collect();
    assert_eq!(decisions, vec![Decision::Failed, Decision::Delivered]);
}
