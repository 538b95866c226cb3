//! Replication Coordinator
//!
//! Orchestrates one client write across the cluster.
//!
//! ## Write path
//! 1. Apply locally. A local failure aborts before any peer is contacted.
//! 2. Fan out to every peer concurrently, each with bounded retries and a fixed
//!    delay between attempts. A peer that exhausts its retries is marked unhealthy.
//! 3. Count `1 + acks` against `floor(total/2) + 1`.
//!
//! There is no compensation: when quorum is missed, the local write and any peer
//! that acknowledged keep the new value. Callers retry idempotently.
//!
//! Requests that arrive with the replication marker are applied locally only.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use crate::config::Config;
use crate::error::{KvError, Result};
use crate::kv::{BatchOutcome, BatchProcessor, PutOutcome, VersionEngine};
use crate::protocol::Command;

use super::health::{quorum_threshold, ClusterStatus, HealthMonitor, NodeStatus};
use super::peer::{PeerAttempt, PeerHealth};
use super::transport::PeerTransport;

/// A write that is replicated to peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: Bytes },
    Delete { key: String },
    BatchPut { items: Vec<(String, Bytes)> },
}

impl WriteOp {
    /// The wire command that carries this write
    pub fn to_command(&self) -> Command {
        match self {
            WriteOp::Put { key, value } => Command::Put {
                key: key.clone(),
                value: value.clone(),
            },
            WriteOp::Delete { key } => Command::Delete { key: key.clone() },
            WriteOp::BatchPut { items } => Command::BatchPut {
                items: items.clone(),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            WriteOp::Put { key, .. } => format!("PUT {:?}", key),
            WriteOp::Delete { key } => format!("DELETE {:?}", key),
            WriteOp::BatchPut { items } => format!("BATCH_PUT ({} items)", items.len()),
        }
    }
}

/// Where a write came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// An ordinary client; the write is fanned out
    Client,
    /// A peer's fan-out; applied locally only
    Replica,
}

/// Local result of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Put(PutOutcome),
    Delete(bool),
    Batch(BatchOutcome),
}

/// A write that reached quorum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    pub result: WriteResult,
    /// Nodes that applied the write, this one included
    pub acks: usize,
    pub required: usize,
    pub total_nodes: usize,
    /// Peers that exhausted their retries
    pub failed_peers: Vec<String>,
}

/// Retry and timeout settings for peer calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub peer_timeout: Duration,
    pub batch_peer_timeout: Duration,
    pub probe_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            delay: config.retry_delay,
            peer_timeout: config.peer_timeout,
            batch_peer_timeout: config.batch_peer_timeout,
            probe_timeout: config.probe_timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Local commit plus majority-quorum fan-out
pub struct ReplicationCoordinator {
    version: Arc<VersionEngine>,
    batch: Arc<BatchProcessor>,
    health: HealthMonitor,
    transport: Arc<dyn PeerTransport>,
    policy: RetryPolicy,
}

impl ReplicationCoordinator {
    pub fn new(
        version: Arc<VersionEngine>,
        batch: Arc<BatchProcessor>,
        health: HealthMonitor,
        transport: Arc<dyn PeerTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            version,
            batch,
            health,
            transport,
            policy,
        }
    }

    pub fn replication_enabled(&self) -> bool {
        self.health.peer_count() > 0
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Apply `op` locally and, for client writes, replicate it to a majority
    pub fn replicated_write(&self, op: WriteOp, origin: Origin) -> Result<WriteAck> {
        let result = self.apply_local(&op)?;
        let total_nodes = self.health.total_nodes();

        if origin == Origin::Replica || !self.replication_enabled() {
            return Ok(WriteAck {
                result,
                acks: 1,
                required: 1,
                total_nodes,
                failed_peers: Vec::new(),
            });
        }

        let peers = self.health.peers();
        let timeout = match op {
            WriteOp::BatchPut { .. } => self.policy.batch_peer_timeout,
            _ => self.policy.peer_timeout,
        };

        tracing::info!("Replicating {} to {} peer(s)", op.describe(), peers.len());

        let outcomes = self.fan_out(&peers, &op, timeout);

        let mut acks = 1;
        let mut failed_peers = Vec::new();
        for (peer, state) in outcomes {
            if state.is_acked() {
                acks += 1;
            } else {
                failed_peers.push(peer);
            }
        }

        let required = quorum_threshold(total_nodes);
        if acks < required {
            tracing::error!(
                "Replication of {} failed: only {}/{} nodes, needed {}",
                op.describe(),
                acks,
                total_nodes,
                required
            );
            return Err(KvError::QuorumFailure {
                achieved: acks,
                required,
            });
        }

        tracing::info!(
            "Replication of {} succeeded: {}/{} nodes",
            op.describe(),
            acks,
            total_nodes
        );

        Ok(WriteAck {
            result,
            acks,
            required,
            total_nodes,
            failed_peers,
        })
    }

    /// Health report. With `probe`, every peer is pinged first and the cache refreshed.
    pub fn cluster_status(&self, probe: bool) -> ClusterStatus {
        let mut status = if probe {
            let peers = self.health.peers();
            let results = self.probe_all(&peers);
            let nodes = peers
                .into_iter()
                .zip(results)
                .map(|(addr, healthy)| NodeStatus { addr, healthy })
                .collect();
            self.health.status_from(nodes)
        } else {
            self.health.cluster_status()
        };
        status.retry_attempts = self.policy.attempts;
        status
    }

    /// Peers currently believed healthy; peers without a fresh record are probed
    pub fn healthy_peers(&self) -> Vec<String> {
        let peers = self.health.peers();
        let unknown: Vec<String> = peers
            .iter()
            .filter(|p| self.health.health(p) == PeerHealth::Unknown)
            .cloned()
            .collect();
        self.probe_all(&unknown);

        peers
            .into_iter()
            .filter(|p| self.health.is_healthy(p))
            .collect()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn apply_local(&self, op: &WriteOp) -> Result<WriteResult> {
        match op {
            WriteOp::Put { key, value } => {
                self.version.put(key, value.clone()).map(WriteResult::Put)
            }
            WriteOp::Delete { key } => self.version.delete(key).map(WriteResult::Delete),
            WriteOp::BatchPut { items } => {
                self.batch.batch_put(items.clone()).map(WriteResult::Batch)
            }
        }
    }

    /// One scoped thread per peer; returns once every peer reached a final state
    fn fan_out(&self, peers: &[String], op: &WriteOp, timeout: Duration) -> Vec<(String, PeerAttempt)> {
        thread::scope(|scope| {
            let handles: Vec<_> = peers
                .iter()
                .map(|peer| (peer, scope.spawn(move || self.replicate_to(peer, op, timeout))))
                .collect();

            handles
                .into_iter()
                .map(|(peer, handle)| {
                    let state = handle.join().unwrap_or_else(|_| {
                        self.health.mark_unhealthy(peer);
                        PeerAttempt::NotAttempted.exhaust("replication thread panicked".to_string())
                    });
                    (peer.clone(), state)
                })
                .collect()
        })
    }

    fn replicate_to(&self, peer: &str, op: &WriteOp, timeout: Duration) -> PeerAttempt {
        let mut state = PeerAttempt::NotAttempted;

        loop {
            state = state.next();
            let attempt = state.attempts();

            let error = match self.transport.replicate(peer, op, timeout) {
                Ok(()) => None,
                // The key is already gone on that peer
                Err(KvError::KeyNotFound) if matches!(op, WriteOp::Delete { .. }) => None,
                Err(e) => Some(e),
            };

            match error {
                None => {
                    tracing::debug!("Replicated to {} on attempt {}", peer, attempt);
                    self.health.mark_healthy(peer);
                    return state.ack();
                }
                Some(e) => {
                    tracing::warn!(
                        "Error replicating to {} on attempt {}/{}: {}",
                        peer,
                        attempt,
                        self.policy.attempts,
                        e
                    );
                    if attempt >= self.policy.attempts {
                        self.health.mark_unhealthy(peer);
                        return state.exhaust(e.to_string());
                    }
                    thread::sleep(self.policy.delay);
                }
            }
        }
    }

    /// Ping `peers` concurrently, record the outcome, return it in order
    fn probe_all(&self, peers: &[String]) -> Vec<bool> {
        if peers.is_empty() {
            return Vec::new();
        }

        thread::scope(|scope| {
            let handles: Vec<_> = peers
                .iter()
                .map(|peer| scope.spawn(move || self.probe(peer)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(false))
                .collect()
        })
    }

    fn probe(&self, peer: &str) -> bool {
        match self.transport.ping(peer, self.policy.probe_timeout) {
            Ok(()) => {
                self.health.mark_healthy(peer);
                true
            }
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", peer, e);
                self.health.mark_unhealthy(peer);
                false
            }
        }
    }
}
