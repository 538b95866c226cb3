//! Batch Processor
//!
//! Bulk upserts split into contiguous chunks. Each chunk is one bulk fetch plus one
//! atomic commit; the batch as a whole is not atomic. A failing chunk stops the
//! batch and earlier chunks stay applied.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::cache::BestEffortCache;
use crate::clock::SharedClock;
use crate::entry::{validate_key, Entry};
use crate::error::{KvError, Result, ValidationError};
use crate::protocol::MAX_PAYLOAD_SIZE;
use crate::store::{SharedStore, VersionedUpdate};

/// Commit attempts for a chunk that keeps losing to concurrent writers
const CHUNK_CONFLICT_RETRIES: usize = 3;

/// Bytes a result item adds to its key and value when encoded:
/// version, created_at, updated_at and the created flag
const RESULT_OVERHEAD_PER_ITEM: u64 = 3 * 8 + 1;

/// Per-item result, in input order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub entry: Entry,
    pub created: bool,
}

/// A fully applied batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub items: Vec<BatchItem>,
    pub chunks_committed: usize,
}

impl BatchOutcome {
    pub fn entries(&self) -> Vec<Entry> {
        self.items.iter().map(|i| i.entry.clone()).collect()
    }
}

/// Chunked bulk writer
pub struct BatchProcessor {
    store: SharedStore,
    cache: BestEffortCache,
    clock: SharedClock,
    max_batch_size: usize,
    chunk_size: usize,
}

impl BatchProcessor {
    pub fn new(
        store: SharedStore,
        cache: BestEffortCache,
        clock: SharedClock,
        max_batch_size: usize,
        chunk_size: usize,
    ) -> Self {
        Self {
            store,
            cache,
            clock,
            max_batch_size,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Reject a batch without touching storage
    pub fn validate(&self, items: &[(String, Bytes)]) -> Result<()> {
        if items.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        if items.len() > self.max_batch_size {
            return Err(ValidationError::BatchTooLarge {
                size: items.len(),
                max: self.max_batch_size,
            }
            .into());
        }

        // The result frame is the larger of the two a batch produces, and the
        // request is forwarded to peers unchanged.
        let request_size = bincode::serialized_size(items)?;
        let result_size = request_size + items.len() as u64 * RESULT_OVERHEAD_PER_ITEM;
        if result_size > u64::from(MAX_PAYLOAD_SIZE) {
            return Err(ValidationError::PayloadTooLarge {
                size: result_size,
                max: u64::from(MAX_PAYLOAD_SIZE),
            }
            .into());
        }

        let mut seen = HashSet::with_capacity(items.len());
        for (key, _) in items {
            validate_key(key)?;
            if !seen.insert(key.as_str()) {
                return Err(ValidationError::DuplicateKey(key.clone()).into());
            }
        }
        Ok(())
    }

    /// Apply `items` in order, one atomic chunk at a time
    ///
    /// If chunk *k* fails after earlier chunks committed, the error is
    /// `PartialBatch` reporting what was applied. A failure in the first chunk is
    /// returned as-is since nothing was written.
    pub fn batch_put(&self, items: Vec<(String, Bytes)>) -> Result<BatchOutcome> {
        self.validate(&items)?;

        let total = items.len();
        let mut outcome = BatchOutcome {
            items: Vec::with_capacity(total),
            chunks_committed: 0,
        };

        for (index, chunk) in items.chunks(self.chunk_size).enumerate() {
            match self.commit_chunk(chunk) {
                Ok(results) => {
                    outcome.items.extend(results);
                    outcome.chunks_committed += 1;
                }
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "batch chunk {} failed after {} committed chunk(s): {}",
                        index,
                        outcome.chunks_committed,
                        e
                    );
                    return Err(KvError::PartialBatch {
                        committed_chunks: outcome.chunks_committed,
                        committed_entries: outcome.items.len(),
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::debug!(
            "batch of {} items committed in {} chunk(s)",
            total,
            outcome.chunks_committed
        );
        Ok(outcome)
    }

    fn commit_chunk(&self, chunk: &[(String, Bytes)]) -> Result<Vec<BatchItem>> {
        let keys: Vec<String> = chunk.iter().map(|(k, _)| k.clone()).collect();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_commit_chunk(chunk, &keys) {
                Ok(results) => {
                    self.cache.invalidate_many(&keys);
                    return Ok(results);
                }
                Err(KvError::Conflict(key)) if attempt < CHUNK_CONFLICT_RETRIES => {
                    tracing::debug!("chunk conflict on {:?}, refetching (attempt {})", key, attempt);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_commit_chunk(&self, chunk: &[(String, Bytes)], keys: &[String]) -> Result<Vec<BatchItem>> {
        let existing: HashMap<String, Entry> = self
            .store
            .get_many(keys)?
            .into_iter()
            .map(|e| (e.key.clone(), e))
            .collect();

        let now = self.clock.now_millis();
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        let mut results = Vec::with_capacity(chunk.len());

        for (key, value) in chunk {
            match existing.get(key) {
                Some(current) => {
                    let next = current.next_version(value.clone(), now);
                    results.push(BatchItem {
                        entry: next.clone(),
                        created: false,
                    });
                    updates.push(VersionedUpdate {
                        expected_version: current.version,
                        entry: next,
                    });
                }
                None => {
                    let fresh = Entry::new(key.clone(), value.clone(), now);
                    results.push(BatchItem {
                        entry: fresh.clone(),
                        created: true,
                    });
                    inserts.push(fresh);
                }
            }
        }

        self.store.commit_chunk(inserts, updates)?;
        Ok(results)
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
