//! Hot Cache Module
//!
//! Best-effort read cache in front of the store.
//!
//! ## Rules
//! - A cache failure never fails a request: it is logged and treated as a miss
//! - Writes invalidate, they never populate (reads populate on miss)
//! - A read only fills the cache if no invalidation of its key landed between
//!   taking a [`FillTicket`] and the fill
//!
//! The store-facing components only see [`BestEffortCache`], which wraps any
//! [`HotCache`] and applies those rules in one place.

mod ttl;

pub use ttl::TtlCache;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::entry::Entry;
use crate::error::CacheError;

/// Result type for cache backends
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Cache capability: get, set, invalidate, invalidate-many
pub trait HotCache: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<Entry>>;

    fn set(&self, entry: &Entry, ttl: Duration) -> CacheResult<()>;

    fn invalidate(&self, key: &str) -> CacheResult<()>;

    /// Drop several keys in one call
    fn invalidate_many(&self, keys: &[String]) -> CacheResult<()>;
}

/// A cache that never holds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl HotCache for NoopCache {
    fn get(&self, _key: &str) -> CacheResult<Option<Entry>> {
        Ok(None)
    }

    fn set(&self, _entry: &Entry, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    fn invalidate(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    fn invalidate_many(&self, _keys: &[String]) -> CacheResult<()> {
        Ok(())
    }
}

/// Number of invalidation generation stripes. Keys hash onto a stripe, so an
/// unrelated write can occasionally skip a fill but never the other way round.
const GENERATION_STRIPES: usize = 64;

/// Invalidation generation observed before a store read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket {
    stripe: usize,
    generation: u64,
}

/// Wraps a cache backend so that every failure is swallowed
#[derive(Clone)]
pub struct BestEffortCache {
    inner: Arc<dyn HotCache>,
    ttl: Duration,
    generations: Arc<[AtomicU64]>,
}

impl BestEffortCache {
    pub fn new(inner: Arc<dyn HotCache>, ttl: Duration) -> Self {
        let generations = (0..GENERATION_STRIPES).map(|_| AtomicU64::new(0)).collect();
        Self {
            inner,
            ttl,
            generations,
        }
    }

    /// A wrapper around [`NoopCache`]
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopCache), Duration::ZERO)
    }

    /// Cached entry, or `None` on miss or failure
    pub fn get(&self, key: &str) -> Option<Entry> {
        match self.inner.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!("cache get for {:?} failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    /// Take before reading the store for a later [`populate`](Self::populate)
    pub fn ticket(&self, key: &str) -> FillTicket {
        let stripe = stripe_of(key);
        FillTicket {
            stripe,
            generation: self.generations[stripe].load(Ordering::SeqCst),
        }
    }

    /// Fill the cache with a value read from the store.
    ///
    /// The entry is set first and the generation checked afterwards. If an
    /// invalidation ran since `ticket` was taken the fill is dropped again,
    /// and an invalidation that bumps after the check removes it itself.
    pub fn populate(&self, entry: &Entry, ticket: FillTicket) {
        if self.generation(ticket.stripe) != ticket.generation {
            tracing::trace!("skipping stale cache fill for {:?}", entry.key);
            return;
        }
        if let Err(e) = self.inner.set(entry, self.ttl) {
            tracing::warn!("cache set for {:?} failed: {}", entry.key, e);
            return;
        }
        if self.generation(ticket.stripe) != ticket.generation {
            tracing::trace!("cache fill for {:?} raced a write, dropping it", entry.key);
            if let Err(e) = self.inner.invalidate(&entry.key) {
                tracing::warn!("cache invalidate for {:?} failed: {}", entry.key, e);
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.bump(stripe_of(key));
        if let Err(e) = self.inner.invalidate(key) {
            tracing::warn!("cache invalidate for {:?} failed: {}", key, e);
        }
    }

    pub fn invalidate_many(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        for key in keys {
            self.bump(stripe_of(key));
        }
        if let Err(e) = self.inner.invalidate_many(keys) {
            tracing::warn!("cache invalidate of {} keys failed: {}", keys.len(), e);
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn generation(&self, stripe: usize) -> u64 {
        self.generations[stripe].load(Ordering::SeqCst)
    }

    fn bump(&self, stripe: usize) {
        self.generations[stripe].fetch_add(1, Ordering::SeqCst);
    }
}

fn stripe_of(key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % GENERATION_STRIPES as u64) as usize
}
