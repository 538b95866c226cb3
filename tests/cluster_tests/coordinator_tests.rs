//! Tests for ReplicationCoordinator
//!
//! These tests verify:
//! - Quorum arithmetic with 0, 1 and 2 peers down in a 3-node cluster
//! - Bounded retries and the health marking that follows exhaustion
//! - Writes from peers are never fanned out again
//! - Delete and batch specifics

use std::time::Duration;

use bytes::Bytes;
use quorumkv::cluster::{Origin, PeerHealth, WriteOp, WriteResult};
use quorumkv::KvError;

use crate::common::{fast_policy, Behavior, Harness, PEER_A, PEER_B};

fn put(key: &str, value: &'static str) -> WriteOp {
    WriteOp::Put {
        key: key.to_string(),
        value: Bytes::from_static(value.as_bytes()),
    }
}

#[test]
fn test_all_peers_up() {
    let h = Harness::new(&[PEER_A, PEER_B]);

    let ack = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert_eq!(ack.acks, 3);
    assert_eq!(ack.required, 2);
    assert_eq!(ack.total_nodes, 3);
    assert!(ack.failed_peers.is_empty());
    assert_eq!(h.transport.replicate_calls(PEER_A), 1);
    assert_eq!(h.transport.replicate_calls(PEER_B), 1);
    assert_eq!(h.transport.ops(PEER_A), vec![put("k", "v")]);
}

#[test]
fn test_one_peer_down_still_reaches_quorum() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.transport.set(PEER_B, Behavior::Down);

    let ack = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert_eq!(ack.acks, 2);
    assert_eq!(ack.failed_peers, vec![PEER_B.to_string()]);
    assert!(matches!(
        ack.result,
        WriteResult::Put(ref outcome) if outcome.entry.version == 1
    ));
}

#[test]
fn test_two_peers_down_fails_quorum_but_keeps_local_write() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.transport.set(PEER_A, Behavior::Down);
    h.transport.set(PEER_B, Behavior::Down);

    let err = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap_err();

    assert!(matches!(
        err,
        KvError::QuorumFailure {
            achieved: 1,
            required: 2
        }
    ));
    // No rollback: the local copy stays
    assert_eq!(h.store.get("k").unwrap().unwrap().version, 1);
}

#[test]
fn test_retries_are_bounded() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.transport.set(PEER_B, Behavior::Down);

    h.coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert_eq!(h.transport.replicate_calls(PEER_A), 1);
    assert_eq!(h.transport.replicate_calls(PEER_B), 3);
}

#[test]
fn test_flaky_peer_acks_within_retries() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.transport.set(PEER_A, Behavior::Down);
    h.transport.set(PEER_B, Behavior::FlakyFor(2));

    let ack = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert_eq!(ack.acks, 2);
    assert_eq!(h.transport.replicate_calls(PEER_B), 3);
    assert!(matches!(
        h.coordinator.health().health(PEER_B),
        PeerHealth::Healthy { .. }
    ));
}

#[test]
fn test_exhausted_peer_marked_unhealthy() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.transport.set(PEER_B, Behavior::Down);

    h.coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert!(!h.coordinator.health().is_healthy(PEER_B));
    assert!(h.coordinator.health().is_healthy(PEER_A));
}

#[test]
fn test_unhealthy_peer_is_still_attempted() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.coordinator.health().mark_unhealthy(PEER_B);

    let ack = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert_eq!(ack.acks, 3);
    assert_eq!(h.transport.replicate_calls(PEER_B), 1);
    assert!(h.coordinator.health().is_healthy(PEER_B));
}

#[test]
fn test_replica_origin_never_fans_out() {
    let h = Harness::new(&[PEER_A, PEER_B]);

    let ack = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Replica)
        .unwrap();

    assert_eq!(ack.acks, 1);
    assert_eq!(ack.required, 1);
    assert_eq!(h.transport.replicate_calls(PEER_A), 0);
    assert_eq!(h.transport.replicate_calls(PEER_B), 0);
    assert!(h.store.get("k").unwrap().is_some());
}

#[test]
fn test_single_node_needs_no_peers() {
    let h = Harness::new(&[]);
    assert!(!h.coordinator.replication_enabled());

    let ack = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap();

    assert_eq!(ack.acks, 1);
    assert_eq!(ack.total_nodes, 1);
}

#[test]
fn test_local_failure_aborts_before_fan_out() {
    let h = Harness::new(&[PEER_A, PEER_B]);

    let err = h
        .coordinator
        .replicated_write(WriteOp::BatchPut { items: Vec::new() }, Origin::Client)
        .unwrap_err();

    assert!(matches!(err, KvError::Validation(_)));
    assert_eq!(h.transport.replicate_calls(PEER_A), 0);
}

#[test]
fn test_delete_not_found_on_peer_counts_as_ack() {
    let h = Harness::new(&[PEER_A, PEER_B]);
    h.transport.set(PEER_A, Behavior::MissingKeys);
    h.transport.set(PEER_B, Behavior::MissingKeys);

    let ack = h
        .coordinator
        .replicated_write(
            WriteOp::Delete {
                key: "gone".to_string(),
            },
            Origin::Client,
        )
        .unwrap();

    assert_eq!(ack.acks, 3);
    assert_eq!(ack.result, WriteResult::Delete(false));
    assert_eq!(h.transport.replicate_calls(PEER_A), 1);
}

#[test]
fn test_batch_uses_long_timeout() {
    let h = Harness::new(&[PEER_A]);

    h.coordinator
        .replicated_write(put("single", "v"), Origin::Client)
        .unwrap();
    h.coordinator
        .replicated_write(
            WriteOp::BatchPut {
                items: vec![
                    ("a".to_string(), Bytes::from_static(b"1")),
                    ("b".to_string(), Bytes::from_static(b"2")),
                ],
            },
            Origin::Client,
        )
        .unwrap();

    assert_eq!(
        h.transport.timeouts(PEER_A),
        vec![Duration::from_secs(5), Duration::from_secs(30)]
    );
}

#[test]
fn test_single_attempt_policy() {
    let h = Harness::with_policy(&[PEER_A, PEER_B], fast_policy(1));
    h.transport.set(PEER_A, Behavior::FlakyFor(1));
    h.transport.set(PEER_B, Behavior::FlakyFor(1));

    let err = h
        .coordinator
        .replicated_write(put("k", "v"), Origin::Client)
        .unwrap_err();

    assert!(matches!(err, KvError::QuorumFailure { achieved: 1, .. }));
    assert_eq!(h.transport.replicate_calls(PEER_A), 1);
}
