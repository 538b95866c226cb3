//! Configuration for QuorumKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{KvError, Result};

/// Main configuration for a QuorumKV node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files (WAL, SSTables, etc.)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Request Limits
    // -------------------------------------------------------------------------
    /// Largest accepted BatchPut
    pub max_batch_size: usize,

    /// Server-side clamp for scan page size
    pub max_range_size: usize,

    /// Items per atomically committed batch chunk
    pub chunk_size: usize,

    /// Rows per internal store read during a scan, independent of the page size
    pub scan_chunk_size: usize,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Hot cache entry lifetime
    pub cache_ttl: Duration,

    /// Max entries held by the hot cache (0 disables it)
    pub cache_capacity: usize,

    // -------------------------------------------------------------------------
    // Replication Configuration
    // -------------------------------------------------------------------------
    /// Peer node addresses (host:port), excluding this node
    pub peers: Vec<String>,

    /// How long a peer health record stays fresh
    pub health_ttl: Duration,

    /// Attempts per peer per write
    pub retry_attempts: u32,

    /// Fixed pause between attempts to the same peer
    pub retry_delay: Duration,

    /// Bound on a single Put/Delete attempt to a peer
    pub peer_timeout: Duration,

    /// Bound on a single BatchPut attempt to a peer
    pub batch_peer_timeout: Duration,

    /// Bound on an active health probe
    pub probe_timeout: Duration,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Per-operation timeout applied to client connections
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./quorumkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            max_batch_size: 10_000,
            max_range_size: 10_000,
            chunk_size: 1_000,
            scan_chunk_size: 1_000,
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
            peers: Vec::new(),
            health_ttl: Duration::from_secs(10),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(500),
            peer_timeout: Duration::from_secs(5),
            batch_peer_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(3),
            listen_addr: "127.0.0.1:7070".to_string(),
            max_connections: 1024,
            read_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Total cluster size, this node included
    pub fn total_nodes(&self) -> usize {
        self.peers.len() + 1
    }

    /// Reject settings the node cannot run with
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_batch_size", self.max_batch_size),
            ("max_range_size", self.max_range_size),
            ("chunk_size", self.chunk_size),
            ("scan_chunk_size", self.scan_chunk_size),
            ("max_connections", self.max_connections),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(KvError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.retry_attempts == 0 {
            return Err(KvError::Config("retry_attempts must be at least 1".to_string()));
        }

        if self.peers.iter().any(|p| p == &self.listen_addr) {
            return Err(KvError::Config(format!(
                "peer list contains this node's own address {}",
                self.listen_addr
            )));
        }

        for (i, peer) in self.peers.iter().enumerate() {
            if peer.trim().is_empty() {
                return Err(KvError::Config(format!("peer #{} has an empty address", i)));
            }
            if self.peers[..i].contains(peer) {
                return Err(KvError::Config(format!("peer {} listed twice", peer)));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size;
        self
    }

    pub fn max_range_size(mut self, size: usize) -> Self {
        self.config.max_range_size = size;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    pub fn scan_chunk_size(mut self, size: usize) -> Self {
        self.config.scan_chunk_size = size;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the peer addresses (replaces any previous list)
    pub fn peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.peers = peers.into_iter().map(Into::into).collect();
        self
    }

    pub fn health_ttl(mut self, ttl: Duration) -> Self {
        self.config.health_ttl = ttl;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn peer_timeout(mut self, timeout: Duration) -> Self {
        self.config.peer_timeout = timeout;
        self
    }

    pub fn batch_peer_timeout(mut self, timeout: Duration) -> Self {
        self.config.batch_peer_timeout = timeout;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set both connection timeouts from a single per-operation bound
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        self.config.read_timeout_ms = ms;
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
