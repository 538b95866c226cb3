//! Version Engine
//!
//! Atomic upsert with a monotonic per-key version counter.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::BestEffortCache;
use crate::clock::SharedClock;
use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::store::SharedStore;

/// Update/insert rounds before a put gives up on a key that keeps changing shape
const MAX_UPSERT_ROUNDS: usize = 8;

/// Result of a local put
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOutcome {
    pub entry: Entry,
    /// True when this put created the key
    pub created: bool,
}

/// Local single-key write and read path
pub struct VersionEngine {
    store: SharedStore,
    cache: BestEffortCache,
    clock: SharedClock,
}

impl VersionEngine {
    pub fn new(store: SharedStore, cache: BestEffortCache, clock: SharedClock) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    /// Upsert a key
    ///
    /// Tries the conditional update first. When no row matched, inserts at version 1;
    /// if a concurrent writer created the key in between, the update is retried.
    pub fn put(&self, key: &str, value: Bytes) -> Result<PutOutcome> {
        let now = self.clock.now_millis();

        for _ in 0..MAX_UPSERT_ROUNDS {
            if let Some(entry) = self.store.update(key, value.clone(), now)? {
                self.cache.invalidate(key);
                tracing::debug!("put {:?} -> v{}", key, entry.version);
                return Ok(PutOutcome {
                    entry,
                    created: false,
                });
            }

            let fresh = Entry::new(key, value.clone(), now);
            if self.store.insert(fresh.clone())? {
                self.cache.invalidate(key);
                tracing::debug!("put {:?} -> created", key);
                return Ok(PutOutcome {
                    entry: fresh,
                    created: true,
                });
            }

            tracing::debug!("put {:?} lost a create race, retrying update", key);
        }

        Err(KvError::Conflict(key.to_string()))
    }

    /// Read a key, cache first
    pub fn get(&self, key: &str) -> Result<Entry> {
        if let Some(entry) = self.cache.get(key) {
            return Ok(entry);
        }

        let ticket = self.cache.ticket(key);
        let entry = self.store.get(key)?.ok_or(KvError::KeyNotFound)?;
        self.cache.populate(&entry, ticket);
        Ok(entry)
    }

    /// Remove a key. The cache is invalidated whether or not it existed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        let result = self.store.delete(key);
        self.cache.invalidate(key);
        let deleted = result?;
        tracing::debug!("delete {:?} -> {}", key, deleted);
        Ok(deleted)
    }
}
