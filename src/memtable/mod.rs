//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and range scans
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation and range reads)
//! - Simple and correct first, optimize later

mod table;

pub use table::{MemTable, MemTableIterator};

use crate::entry::Entry;

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Entry),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    pub fn live(self) -> Option<Entry> {
        match self {
            MemTableEntry::Value(entry) => Some(entry),
            MemTableEntry::Tombstone => None,
        }
    }
}
