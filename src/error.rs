//! Error types for QuorumKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for QuorumKV operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Key not found")]
    KeyNotFound,

    /// A concurrent writer changed a key between a chunk's fetch and its commit
    #[error("Write conflict on key {0:?}")]
    Conflict(String),

    // -------------------------------------------------------------------------
    // Request Errors
    // -------------------------------------------------------------------------
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(
        "Batch partially applied: {committed_chunks} chunk(s) / {committed_entries} entries committed before failure: {source}"
    )]
    PartialBatch {
        committed_chunks: usize,
        committed_entries: usize,
        #[source]
        source: Box<KvError>,
    },

    // -------------------------------------------------------------------------
    // Replication Errors
    // -------------------------------------------------------------------------
    #[error("Quorum not reached: {achieved}/{required} acknowledgements")]
    QuorumFailure { achieved: usize, required: usize },

    #[error("Peer {0} unreachable")]
    PeerUnreachable(String),

    #[error("Peer {0} timed out")]
    PeerTimeout(String),

    #[error("Peer {peer} rejected request: {message}")]
    PeerRejected { peer: String, message: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Failure reported by the server at the other end of a connection
    #[error("Server returned {status:?}: {message}")]
    Remote {
        status: crate::protocol::Status,
        message: String,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Request rejected before touching storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("batch must contain at least one item")]
    EmptyBatch,

    #[error("batch of {size} items exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("batch encodes to {size} bytes, over the {max} byte frame limit")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("duplicate key {0:?} in batch")]
    DuplicateKey(String),

    #[error("start key {start:?} must be <= end key {end:?}")]
    InvalidRange { start: String, end: String },

    #[error("limit must be at least 1")]
    InvalidLimit,

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Hot cache failure. Never surfaced to callers.
#[derive(Debug, Error)]
#[error("cache error: {0}")]
pub struct CacheError(pub String);

impl From<bincode::Error> for KvError {
    fn from(e: bincode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl KvError {
    /// Map low-level persistence failures onto `StoreUnavailable`.
    ///
    /// Request-level outcomes (not found, conflicts, validation) pass through untouched.
    pub fn into_store_error(self) -> KvError {
        match self {
            KvError::Io(e) => KvError::StoreUnavailable(e.to_string()),
            KvError::WalCorruption(msg) | KvError::Storage(msg) => KvError::StoreUnavailable(msg),
            other => other,
        }
    }

    /// True for failures the caller may retry unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KvError::StoreUnavailable(_)
                | KvError::QuorumFailure { .. }
                | KvError::PeerUnreachable(_)
                | KvError::PeerTimeout(_)
                | KvError::Conflict(_)
                | KvError::Remote {
                    status: crate::protocol::Status::QuorumFailed
                        | crate::protocol::Status::Unavailable,
                    ..
                }
        )
    }
}
