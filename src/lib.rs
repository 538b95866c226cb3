//! # QuorumKV
//!
//! A durable key-value store with majority-quorum synchronous replication:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with partial write handling
//! - Atomic per-key upserts with a monotonic version counter
//! - Cursor-paged range scans and chunked batch writes with bounded memory
//! - Synchronous fan-out to peers with retries and lazy health tracking
//! - TCP-based client protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                             │
//! │               (Clients and peer nodes)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Node                                 │
//! │        reads → kv core   writes → coordinator               │
//! └──────────┬─────────────────────────────────┬────────────────┘
//!            │                                 │
//!            ▼                                 ▼
//!   ┌──────────────────┐             ┌──────────────────┐
//!   │     KV core      │◀────────────│   Coordinator    │──▶ peers
//!   │ version/scan/    │  local      │ health + quorum  │
//!   │ batch + cache    │  commit     └──────────────────┘
//!   └────────┬─────────┘
//!            ▼
//!   ┌──────────────────┐
//!   │      Store       │
//!   │ WAL → MemTable → │
//!   │     SSTables     │
//!   └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;

pub mod memtable;
pub mod storage;
pub mod store;
pub mod wal;

pub mod cache;
pub mod cluster;
pub mod kv;

pub mod network;
pub mod node;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use entry::Entry;
pub use error::{KvError, Result};
pub use node::Node;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of QuorumKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
