//! In-memory store
//!
//! `BTreeMap` behind a `RwLock`. Nothing survives a restart.

use std::collections::BTreeMap;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::entry::Entry;
use crate::error::{KvError, Result};

use super::{KeyRange, ScanChunk, Store, VersionedUpdate};

/// Volatile [`Store`] implementation
#[derive(Default)]
pub struct MemStore {
    data: RwLock<BTreeMap<String, Entry>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Store for MemStore {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>> {
        let data = self.data.read();
        Ok(keys.iter().filter_map(|k| data.get(k).cloned()).collect())
    }

    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        let mut data = self.data.write();
        Ok(data.get_mut(key).map(|current| {
            *current = current.next_version(value, now);
            current.clone()
        }))
    }

    fn insert(&self, entry: Entry) -> Result<bool> {
        let mut data = self.data.write();
        if data.contains_key(&entry.key) {
            return Ok(false);
        }
        data.insert(entry.key.clone(), entry);
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().remove(key).is_some())
    }

    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk> {
        if range.is_empty() || max == 0 {
            return Ok(ScanChunk::default());
        }

        let data = self.data.read();
        let entries: Vec<Entry> = data
            .range::<str, _>(range.as_bounds())
            .take(max)
            .map(|(_, e)| e.clone())
            .collect();

        let resume_after = if entries.len() == max {
            entries.last().map(|e| e.key.clone())
        } else {
            None
        };

        Ok(ScanChunk {
            entries,
            resume_after,
        })
    }

    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        let mut data = self.data.write();

        for entry in &inserts {
            if data.contains_key(&entry.key) {
                return Err(KvError::Conflict(entry.key.clone()));
            }
        }
        for update in &updates {
            match data.get(&update.entry.key) {
                Some(current) if current.version == update.expected_version => {}
                _ => return Err(KvError::Conflict(update.entry.key.clone())),
            }
        }

        for entry in inserts {
            data.insert(entry.key.clone(), entry);
        }
        for update in updates {
            data.insert(update.entry.key.clone(), update.entry);
        }
        Ok(())
    }
}
