//! Store Module
//!
//! The durable ordered store the key-value core is written against.
//!
//! ## Contract
//! - Every method is atomic for the keys it touches
//! - `update` is a single conditional statement: match the key, replace the
//!   value, bump the version. No read-then-write round trip on the caller side
//! - `commit_chunk` applies all of its writes or none of them
//! - `scan_chunk` never holds more than a bounded number of rows in memory
//!
//! ## Implementations
//! - [`DiskStore`]: WAL + MemTable + SSTables
//! - [`MemStore`]: BTreeMap, for tests and throwaway nodes

mod disk;
mod mem;

pub use disk::DiskStore;
pub use mem::MemStore;

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;

use crate::entry::Entry;
use crate::error::Result;
use crate::memtable::MemTableEntry;

/// Durable ordered key-value store with per-key atomicity
pub trait Store: Send + Sync {
    /// Read one entry
    fn get(&self, key: &str) -> Result<Option<Entry>>;

    /// Read several entries in one round trip; missing keys are omitted
    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>>;

    /// Replace the value of an existing key and bump its version.
    /// `None` when no row matched.
    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>>;

    /// Insert a new entry if the key is absent. `false` if it already exists.
    fn insert(&self, entry: Entry) -> Result<bool>;

    /// Remove a key. `false` if it did not exist.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Read at most `max` live entries in key order
    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk>;

    /// Atomically apply inserts and version-checked updates.
    ///
    /// Fails with `Conflict` and applies nothing if an insert's key exists or an
    /// update's current version differs from the expected one.
    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()>;
}

/// Shared handle to a store
pub type SharedStore = Arc<dyn Store>;

/// An update that only applies on top of a known version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedUpdate {
    pub expected_version: u64,
    pub entry: Entry,
}

/// One bounded read from [`Store::scan_chunk`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanChunk {
    /// Live entries in ascending key order
    pub entries: Vec<Entry>,

    /// Where the next chunk must start (exclusive). `None` once the range is exhausted.
    /// May be set while `entries` is short or empty when deletions were skipped.
    pub resume_after: Option<String>,
}

// =============================================================================
// Key Ranges
// =============================================================================

/// A contiguous interval of keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    lower: Bound<String>,
    upper: Bound<String>,
}

impl KeyRange {
    /// Half-open `[start, end)`
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            lower: Bound::Included(start.into()),
            upper: Bound::Excluded(end.into()),
        }
    }

    /// Every key
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// The part of this range strictly after `key`
    pub fn after(&self, key: &str) -> Self {
        let tighter = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(lower) => key >= lower.as_str(),
            Bound::Excluded(lower) => key > lower.as_str(),
        };
        let lower = if tighter {
            Bound::Excluded(key.to_string())
        } else {
            self.lower.clone()
        };
        Self {
            lower,
            upper: self.upper.clone(),
        }
    }

    pub fn as_bounds(&self) -> (Bound<&str>, Bound<&str>) {
        (as_str_bound(&self.lower), as_str_bound(&self.upper))
    }

    pub fn contains(&self, key: &str) -> bool {
        let above = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(l) => key >= l.as_str(),
            Bound::Excluded(l) => key > l.as_str(),
        };
        let below = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(u) => key <= u.as_str(),
            Bound::Excluded(u) => key < u.as_str(),
        };
        above && below
    }

    /// True when no key can fall inside the range
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => false,
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
        }
    }
}

fn as_str_bound(bound: &Bound<String>) -> Bound<&str> {
    match bound {
        Bound::Included(s) => Bound::Included(s.as_str()),
        Bound::Excluded(s) => Bound::Excluded(s.as_str()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

// =============================================================================
// Chunk merging
// =============================================================================

/// Merge per-source range reads into one chunk, newest source first.
///
/// Each source was read with the same `max`. A source that returned `max` rows may
/// hold more beyond its last key, so only keys up to the smallest such last key are
/// settled; that key becomes the resume point.
pub(crate) fn merge_sources(sources: Vec<Vec<(String, MemTableEntry)>>, max: usize) -> ScanChunk {
    let settled_until: Option<String> = sources
        .iter()
        .filter(|rows| rows.len() >= max)
        .filter_map(|rows| rows.last().map(|(k, _)| k.clone()))
        .min();

    let mut merged: BTreeMap<String, MemTableEntry> = BTreeMap::new();
    for rows in sources {
        for (key, record) in rows {
            if let Some(limit) = &settled_until {
                if &key > limit {
                    break;
                }
            }
            merged.entry(key).or_insert(record);
        }
    }

    let mut entries: Vec<Entry> = merged.into_values().filter_map(MemTableEntry::live).collect();
    let mut resume_after = settled_until;

    if entries.len() > max {
        entries.truncate(max);
        resume_after = entries.last().map(|e| e.key.clone());
    }

    ScanChunk {
        entries,
        resume_after,
    }
}
