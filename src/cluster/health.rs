//! Node Health Monitor
//!
//! A TTL-bound health record per configured peer. There is no heartbeat thread:
//! records are written as a side effect of replication attempts and probes, and a
//! peer without a fresh record is assumed healthy.
//!
//! Each peer has its own slot behind its own lock, so marking one peer never
//! contends with reads of another.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

use super::peer::PeerHealth;

/// Acknowledgements needed out of `total_nodes`
pub fn quorum_threshold(total_nodes: usize) -> usize {
    total_nodes / 2 + 1
}

#[derive(Debug, Clone, Copy)]
struct HealthRecord {
    healthy: bool,
    checked_at: u64,
}

struct PeerSlot {
    addr: String,
    record: Mutex<Option<HealthRecord>>,
}

/// Health of one peer in a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub addr: String,
    pub healthy: bool,
}

/// Cluster-wide health report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub replication_enabled: bool,
    /// Peers plus this node
    pub total_nodes: usize,
    /// Healthy peers plus this node
    pub healthy_nodes: usize,
    pub unhealthy_nodes: usize,
    pub quorum_threshold: usize,
    pub has_quorum: bool,
    pub can_accept_writes: bool,
    pub retry_attempts: u32,
    pub nodes: Vec<NodeStatus>,
}

/// TTL cache of per-peer health
pub struct HealthMonitor {
    slots: Vec<PeerSlot>,
    index: HashMap<String, usize>,
    ttl: Duration,
    clock: SharedClock,
}

impl HealthMonitor {
    pub fn new<I, S>(peers: I, ttl: Duration, clock: SharedClock) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots: Vec<PeerSlot> = peers
            .into_iter()
            .map(|addr| PeerSlot {
                addr: addr.into(),
                record: Mutex::new(None),
            })
            .collect();
        let index = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.addr.clone(), i))
            .collect();

        Self {
            slots,
            index,
            ttl,
            clock,
        }
    }

    /// Configured peer addresses, in configuration order
    pub fn peers(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.addr.clone()).collect()
    }

    pub fn peer_count(&self) -> usize {
        self.slots.len()
    }

    pub fn total_nodes(&self) -> usize {
        self.slots.len() + 1
    }

    /// Current belief about `peer`. Unknown peers and expired records read as `Unknown`.
    pub fn health(&self, peer: &str) -> PeerHealth {
        let Some(slot) = self.slot(peer) else {
            return PeerHealth::Unknown;
        };
        let now = self.clock.now_millis();
        let record = *slot.record.lock();

        match record {
            Some(r) if self.is_fresh(r, now) => {
                if r.healthy {
                    PeerHealth::Healthy {
                        checked_at: r.checked_at,
                    }
                } else {
                    PeerHealth::Unhealthy {
                        checked_at: r.checked_at,
                    }
                }
            }
            _ => PeerHealth::Unknown,
        }
    }

    /// Fresh cached value, or `true` when there is none
    pub fn is_healthy(&self, peer: &str) -> bool {
        self.health(peer).is_healthy()
    }

    pub fn mark_unhealthy(&self, peer: &str) {
        self.record(peer, false);
        tracing::warn!("peer {} marked unhealthy for {:?}", peer, self.ttl);
    }

    pub fn mark_healthy(&self, peer: &str) {
        self.record(peer, true);
    }

    /// Report from cached records only
    pub fn cluster_status(&self) -> ClusterStatus {
        let nodes = self
            .slots
            .iter()
            .map(|slot| NodeStatus {
                addr: slot.addr.clone(),
                healthy: self.is_healthy(&slot.addr),
            })
            .collect();
        self.status_from(nodes)
    }

    /// Assemble a report from explicit per-peer results
    pub fn status_from(&self, nodes: Vec<NodeStatus>) -> ClusterStatus {
        let total_nodes = self.total_nodes();
        let healthy_nodes = 1 + nodes.iter().filter(|n| n.healthy).count();
        let threshold = quorum_threshold(total_nodes);
        let has_quorum = healthy_nodes >= threshold;

        ClusterStatus {
            replication_enabled: !self.slots.is_empty(),
            total_nodes,
            healthy_nodes,
            unhealthy_nodes: total_nodes - healthy_nodes,
            quorum_threshold: threshold,
            has_quorum,
            can_accept_writes: has_quorum,
            retry_attempts: 0,
            nodes,
        }
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn slot(&self, peer: &str) -> Option<&PeerSlot> {
        self.index.get(peer).map(|&i| &self.slots[i])
    }

    fn is_fresh(&self, record: HealthRecord, now: u64) -> bool {
        now.saturating_sub(record.checked_at) < self.ttl.as_millis() as u64
    }

    fn record(&self, peer: &str, healthy: bool) {
        let Some(slot) = self.slot(peer) else {
            tracing::debug!("ignoring health update for unconfigured peer {}", peer);
            return;
        };
        *slot.record.lock() = Some(HealthRecord {
            healthy,
            checked_at: self.clock.now_millis(),
        });
    }
}
