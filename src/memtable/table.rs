//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::MemTableEntry;
use crate::entry::Entry;
use crate::store::KeyRange;

/// Bytes charged for a tombstone beyond its key
const TOMBSTONE_OVERHEAD: usize = 8;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<String, MemTableEntry>>,
    /// Approximate size in bytes
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key (read lock)
    ///
    /// `None` means the memtable knows nothing about the key; a tombstone means it
    /// was deleted after anything older storage holds.
    pub fn get(&self, key: &str) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Insert or replace a live entry, returning the new approximate size
    pub fn put(&self, entry: Entry) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, entry.key.clone(), MemTableEntry::Value(entry))
    }

    /// Record a deletion, returning the new approximate size
    pub fn delete(&self, key: String) -> usize {
        let mut data = self.data.write();
        self.insert_locked(&mut data, key, MemTableEntry::Tombstone)
    }

    /// Insert several entries under one write lock
    pub fn put_all(&self, entries: Vec<Entry>) -> usize {
        let mut data = self.data.write();
        let mut size = self.size.load(Ordering::SeqCst);
        for entry in entries {
            size = self.insert_locked(&mut data, entry.key.clone(), MemTableEntry::Value(entry));
        }
        size
    }

    fn insert_locked(
        &self,
        data: &mut BTreeMap<String, MemTableEntry>,
        key: String,
        value: MemTableEntry,
    ) -> usize {
        let added = Self::footprint(&key, &value);
        let removed = data
            .get(&key)
            .map(|old| Self::footprint(&key, old))
            .unwrap_or(0);
        data.insert(key, value);

        if added >= removed {
            self.size.fetch_add(added - removed, Ordering::SeqCst) + (added - removed)
        } else {
            self.size.fetch_sub(removed - added, Ordering::SeqCst) - (removed - added)
        }
    }

    fn footprint(key: &str, value: &MemTableEntry) -> usize {
        match value {
            MemTableEntry::Value(entry) => key.len() + entry.approximate_size(),
            MemTableEntry::Tombstone => key.len() + TOMBSTONE_OVERHEAD,
        }
    }

    /// Up to `max` entries (tombstones included) within the range, in key order
    pub fn range(&self, range: &KeyRange, max: usize) -> Vec<(String, MemTableEntry)> {
        if range.is_empty() {
            return Vec::new();
        }
        let data = self.data.read();
        data.range::<str, _>(range.as_bounds())
            .take(max)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Snapshot of all entries in sorted key order (for flush)
    pub fn iter(&self) -> MemTableIterator {
        let snapshot: Vec<_> = self
            .data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        MemTableIterator {
            inner: snapshot.into_iter(),
        }
    }

    /// Clear all entries (after successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a point-in-time copy of the MemTable
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(String, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (String, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
