//! Tests for Node request dispatch
//!
//! These tests verify:
//! - Wire commands reach the right component and produce typed bodies
//! - The replication marker suppresses fan-out
//! - Failures map onto response statuses

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use quorumkv::cluster::ClusterStatus;
use quorumkv::kv::{BatchItem, PutOutcome, ScanPage, ScanRequest};
use quorumkv::protocol::{Command, Request, Status};
use quorumkv::{Config, Entry, KvError, Node};

use crate::common::{Behavior, FakeTransport, PEER_A, PEER_B};

fn node_with_peers(transport: Arc<FakeTransport>) -> Node {
    let config = Config::builder()
        .peers([PEER_A, PEER_B])
        .retry_delay(Duration::ZERO)
        .build();
    Node::builder(config).transport(transport).build().unwrap()
}

fn put(key: &str, value: &'static str) -> Command {
    Command::Put {
        key: key.to_string(),
        value: Bytes::from_static(value.as_bytes()),
    }
}

#[test]
fn test_client_put_is_replicated() {
    let transport = FakeTransport::new();
    let node = node_with_peers(transport.clone());

    let response = node.execute(Request::new(put("k", "v")));

    assert_eq!(response.status, Status::Ok);
    let outcome: PutOutcome = response.into_body().unwrap();
    assert!(outcome.created);
    assert_eq!(transport.replicate_calls(PEER_A), 1);
    assert_eq!(transport.replicate_calls(PEER_B), 1);
}

#[test]
fn test_replicated_put_stays_local() {
    let transport = FakeTransport::new();
    let node = node_with_peers(transport.clone());

    let response = node.execute(Request::replicated(put("k", "v")));

    assert!(response.is_ok());
    assert_eq!(transport.replicate_calls(PEER_A), 0);
    assert_eq!(transport.replicate_calls(PEER_B), 0);
    assert_eq!(node.get("k").unwrap().version, 1);
}

#[test]
fn test_get_and_delete_round_trip() {
    let node = node_with_peers(FakeTransport::new());
    node.execute(Request::new(put("k", "v")));

    let entry: Entry = node
        .execute(Request::new(Command::Get { key: "k".into() }))
        .into_body()
        .unwrap();
    assert_eq!(entry.value, Bytes::from_static(b"v"));

    let deleted: bool = node
        .execute(Request::new(Command::Delete { key: "k".into() }))
        .into_body()
        .unwrap();
    assert!(deleted);

    let response = node.execute(Request::new(Command::Get { key: "k".into() }));
    assert_eq!(response.status, Status::NotFound);
}

#[test]
fn test_delete_of_missing_key_is_ok_false() {
    let node = node_with_peers(FakeTransport::new());
    let deleted: bool = node
        .execute(Request::new(Command::Delete { key: "nope".into() }))
        .into_body()
        .unwrap();
    assert!(!deleted);
}

#[test]
fn test_invalid_key_rejected() {
    let node = node_with_peers(FakeTransport::new());

    let response = node.execute(Request::new(put("", "v")));
    assert_eq!(response.status, Status::Invalid);

    let long = "k".repeat(256);
    let response = node.execute(Request::new(Command::Get { key: long }));
    assert_eq!(response.status, Status::Invalid);
}

#[test]
fn test_quorum_failure_status() {
    let transport = FakeTransport::new();
    transport.set(PEER_A, Behavior::Down);
    transport.set(PEER_B, Behavior::Down);
    let node = node_with_peers(transport);

    let response = node.execute(Request::new(put("k", "v")));

    assert_eq!(response.status, Status::QuorumFailed);
    assert!(response.message().contains("1/2"));
    match response.into_unit() {
        Err(KvError::Remote { status, .. }) => assert_eq!(status, Status::QuorumFailed),
        other => panic!("expected remote error, got {:?}", other),
    }
}

#[test]
fn test_scan_and_batch_dispatch() {
    let node = node_with_peers(FakeTransport::new());

    let items: Vec<BatchItem> = node
        .execute(Request::new(Command::BatchPut {
            items: vec![
                ("b".to_string(), Bytes::from_static(b"2")),
                ("a".to_string(), Bytes::from_static(b"1")),
            ],
        }))
        .into_body()
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].entry.key, "b");

    let page: ScanPage = node
        .execute(Request::new(Command::Scan(ScanRequest::new("a", "z").limit(1))))
        .into_body()
        .unwrap();
    assert_eq!(page.entries[0].key, "a");
    assert_eq!(page.next_cursor.as_deref(), Some("a"));

    let response = node.execute(Request::new(Command::Scan(ScanRequest::new("z", "a"))));
    assert_eq!(response.status, Status::Invalid);
}

#[test]
fn test_duplicate_batch_rejected() {
    let transport = FakeTransport::new();
    let node = node_with_peers(transport.clone());

    let response = node.execute(Request::new(Command::BatchPut {
        items: vec![
            ("a".to_string(), Bytes::from_static(b"1")),
            ("a".to_string(), Bytes::from_static(b"2")),
        ],
    }));

    assert_eq!(response.status, Status::Invalid);
    assert_eq!(transport.replicate_calls(PEER_A), 0);
}

#[test]
fn test_ping_and_status() {
    let transport = FakeTransport::new();
    transport.set(PEER_B, Behavior::Down);
    let node = node_with_peers(transport);

    assert!(node.execute(Request::new(Command::Ping)).into_unit().is_ok());

    let status: ClusterStatus = node
        .execute(Request::new(Command::ClusterStatus { probe: true }))
        .into_body()
        .unwrap();
    assert_eq!(status.total_nodes, 3);
    assert_eq!(status.healthy_nodes, 2);
    assert!(status.can_accept_writes);
}

#[test]
fn test_build_rejects_bad_config() {
    let config = Config::builder().retry_attempts(0).build();
    assert!(matches!(
        Node::builder(config).build(),
        Err(KvError::Config(_))
    ));

    let config = Config::builder()
        .listen_addr("127.0.0.1:7070")
        .peers(["127.0.0.1:7070"])
        .build();
    assert!(Node::builder(config).build().is_err());
}
