//! Cluster Module
//!
//! Majority-quorum synchronous replication to a fixed set of peers.
//!
//! ## Components
//! - [`HealthMonitor`]: lazily refreshed, TTL-bound view of peer health
//! - [`PeerTransport`]: how a write or probe reaches a peer
//! - [`ReplicationCoordinator`]: local commit, concurrent fan-out, quorum decision
//!
//! This is not a consensus protocol. A write succeeds when a majority of the
//! attempted replicas applied it; nothing reconciles replicas that diverge.

mod coordinator;
mod health;
mod peer;
mod transport;

pub use coordinator::{
    Origin, ReplicationCoordinator, RetryPolicy, WriteAck, WriteOp, WriteResult,
};
pub use health::{quorum_threshold, ClusterStatus, HealthMonitor, NodeStatus};
pub use peer::{PeerAttempt, PeerHealth};
pub use transport::{PeerTransport, TcpTransport};
