//! Node
//!
//! One cluster member: the local key-value core, the replication coordinator and
//! the dispatch from wire requests to both.
//!
//! ## Responsibilities
//! - Build every component from a [`Config`]
//! - Validate keys at the edge
//! - Route reads to the local core and writes through the coordinator
//! - Honor the replication marker on incoming requests
//! - Map results and errors onto wire responses

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::{BestEffortCache, HotCache, NoopCache, TtlCache};
use crate::clock::{system_clock, SharedClock};
use crate::cluster::{
    ClusterStatus, HealthMonitor, Origin, PeerTransport, ReplicationCoordinator, RetryPolicy,
    TcpTransport, WriteAck, WriteOp, WriteResult,
};
use crate::config::Config;
use crate::entry::{validate_key, Entry};
use crate::error::{KvError, Result};
use crate::kv::{BatchOutcome, BatchProcessor, PutOutcome, RangeScanner, ScanPage, ScanRequest, VersionEngine};
use crate::protocol::{Command, Request, Response};
use crate::store::{MemStore, SharedStore};

/// A single QuorumKV node
pub struct Node {
    config: Config,
    version: Arc<VersionEngine>,
    scanner: RangeScanner,
    coordinator: ReplicationCoordinator,
}

impl Node {
    pub fn builder(config: Config) -> NodeBuilder {
        NodeBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &ReplicationCoordinator {
        &self.coordinator
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Upsert a key; client-origin writes are replicated
    pub fn put(&self, key: &str, value: Bytes, origin: Origin) -> Result<WriteAck> {
        validate_key(key)?;
        self.coordinator.replicated_write(
            WriteOp::Put {
                key: key.to_string(),
                value,
            },
            origin,
        )
    }

    pub fn get(&self, key: &str) -> Result<Entry> {
        validate_key(key)?;
        self.version.get(key)
    }

    /// Delete a key. Replicated whether or not it existed locally.
    pub fn delete(&self, key: &str, origin: Origin) -> Result<WriteAck> {
        validate_key(key)?;
        self.coordinator.replicated_write(
            WriteOp::Delete {
                key: key.to_string(),
            },
            origin,
        )
    }

    pub fn scan(&self, request: &ScanRequest) -> Result<ScanPage> {
        self.scanner.scan(request)
    }

    pub fn batch_put(&self, items: Vec<(String, Bytes)>, origin: Origin) -> Result<WriteAck> {
        self.coordinator
            .replicated_write(WriteOp::BatchPut { items }, origin)
    }

    pub fn cluster_status(&self, probe: bool) -> ClusterStatus {
        self.coordinator.cluster_status(probe)
    }

    // =========================================================================
    // Wire dispatch
    // =========================================================================

    /// Execute a decoded request and build its response
    pub fn execute(&self, request: Request) -> Response {
        let origin = if request.is_replication() {
            Origin::Replica
        } else {
            Origin::Client
        };

        match self.dispatch(request.command, origin) {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    KvError::KeyNotFound | KvError::Validation(_) => {
                        tracing::debug!("Request rejected: {}", e)
                    }
                    _ => tracing::warn!("Request failed: {}", e),
                }
                Response::from_error(&e)
            }
        }
    }

    fn dispatch(&self, command: Command, origin: Origin) -> Result<Response> {
        match command {
            Command::Get { key } => Response::ok(&self.get(&key)?),
            Command::Put { key, value } => {
                let ack = self.put(&key, value, origin)?;
                Response::ok(&put_outcome(ack)?)
            }
            Command::Delete { key } => {
                let ack = self.delete(&key, origin)?;
                match ack.result {
                    WriteResult::Delete(deleted) => Response::ok(&deleted),
                    other => Err(unexpected_result("DELETE", other)),
                }
            }
            Command::Ping => Ok(Response::empty()),
            Command::Scan(request) => Response::ok(&self.scan(&request)?),
            Command::BatchPut { items } => {
                let ack = self.batch_put(items, origin)?;
                Response::ok(&batch_outcome(ack)?.items)
            }
            Command::ClusterStatus { probe } => Response::ok(&self.cluster_status(probe)),
        }
    }
}

fn put_outcome(ack: WriteAck) -> Result<PutOutcome> {
    match ack.result {
        WriteResult::Put(outcome) => Ok(outcome),
        other => Err(unexpected_result("PUT", other)),
    }
}

fn batch_outcome(ack: WriteAck) -> Result<BatchOutcome> {
    match ack.result {
        WriteResult::Batch(outcome) => Ok(outcome),
        other => Err(unexpected_result("BATCH_PUT", other)),
    }
}

fn unexpected_result(command: &str, result: WriteResult) -> KvError {
    KvError::Protocol(format!("{} produced unexpected result {:?}", command, result))
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`Node`]; every collaborator has a default
pub struct NodeBuilder {
    config: Config,
    store: Option<SharedStore>,
    cache: Option<Arc<dyn HotCache>>,
    transport: Option<Arc<dyn PeerTransport>>,
    clock: Option<SharedClock>,
}

impl NodeBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            cache: None,
            transport: None,
            clock: None,
        }
    }

    /// Durable store (default: an in-memory store)
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Hot cache backend (default: a TTL cache sized by `cache_capacity`)
    pub fn cache(mut self, cache: Arc<dyn HotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Peer transport (default: TCP)
    pub fn transport(mut self, transport: Arc<dyn PeerTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Time source (default: system clock)
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Node> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(system_clock);
        let store = self.store.unwrap_or_else(|| Arc::new(MemStore::new()));
        let cache_backend: Arc<dyn HotCache> = match self.cache {
            Some(cache) => cache,
            None if config.cache_capacity > 0 => {
                Arc::new(TtlCache::new(config.cache_capacity, clock.clone()))
            }
            None => Arc::new(NoopCache),
        };
        let cache = BestEffortCache::new(cache_backend, config.cache_ttl);
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TcpTransport::new()));

        let version = Arc::new(VersionEngine::new(
            store.clone(),
            cache.clone(),
            clock.clone(),
        ));
        let batch = Arc::new(BatchProcessor::new(
            store.clone(),
            cache,
            clock.clone(),
            config.max_batch_size,
            config.chunk_size,
        ));
        let scanner = RangeScanner::new(store, config.max_range_size, config.scan_chunk_size);
        let health = HealthMonitor::new(config.peers.iter().cloned(), config.health_ttl, clock);
        let coordinator = ReplicationCoordinator::new(
            version.clone(),
            batch,
            health,
            transport,
            RetryPolicy::from_config(&config),
        );

        tracing::info!(
            "Node ready: listen={} peers={} quorum={}/{}",
            config.listen_addr,
            config.peers.len(),
            crate::cluster::quorum_threshold(config.total_nodes()),
            config.total_nodes()
        );

        Ok(Node {
            config,
            version,
            scanner,
            coordinator,
        })
    }
}
