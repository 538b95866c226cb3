//! Shared fixtures for the key-value core tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use bytes::Bytes;
use quorumkv::cache::{BestEffortCache, CacheResult, HotCache, TtlCache};
use quorumkv::clock::{ManualClock, SharedClock};
use quorumkv::entry::Entry;
use quorumkv::error::CacheError;
use quorumkv::store::{KeyRange, MemStore, ScanChunk, SharedStore, Store, VersionedUpdate};
use quorumkv::{KvError, Result};

pub const START_MILLIS: u64 = 1_700_000_000_000;

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MILLIS))
}

pub fn shared(clock: &Arc<ManualClock>) -> SharedClock {
    clock.clone()
}

pub fn ttl_cache(clock: &Arc<ManualClock>) -> BestEffortCache {
    BestEffortCache::new(
        Arc::new(TtlCache::new(1024, shared(clock))),
        Duration::from_secs(60),
    )
}

pub fn value(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

/// Populate `store` with `key -> "v"` for every key
pub fn seed(store: &dyn Store, keys: &[&str]) {
    for key in keys {
        assert!(store.insert(Entry::new(*key, "v", START_MILLIS)).unwrap());
    }
}

pub fn keys_of(entries: &[Entry]) -> Vec<String> {
    entries.iter().map(|e| e.key.clone()).collect()
}

// =============================================================================
// Failure injection
// =============================================================================

/// A cache backend that fails every call
pub struct BrokenCache;

impl HotCache for BrokenCache {
    fn get(&self, _key: &str) -> CacheResult<Option<Entry>> {
        Err(CacheError("connection refused".to_string()))
    }

    fn set(&self, _entry: &Entry, _ttl: Duration) -> CacheResult<()> {
        Err(CacheError("connection refused".to_string()))
    }

    fn invalidate(&self, _key: &str) -> CacheResult<()> {
        Err(CacheError("connection refused".to_string()))
    }

    fn invalidate_many(&self, _keys: &[String]) -> CacheResult<()> {
        Err(CacheError("connection refused".to_string()))
    }
}

/// MemStore whose `commit_chunk` starts failing after a number of successful calls
pub struct FlakyStore {
    inner: MemStore,
    commits_before_failure: usize,
    commits: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_after(commits_before_failure: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemStore::new(),
            commits_before_failure,
            commits: AtomicUsize::new(0),
        })
    }

    pub fn inner(&self) -> &MemStore {
        &self.inner
    }
}

impl Store for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        self.inner.get(key)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>> {
        self.inner.get_many(keys)
    }

    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        self.inner.update(key, value, now)
    }

    fn insert(&self, entry: Entry) -> Result<bool> {
        self.inner.insert(entry)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key)
    }

    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk> {
        self.inner.scan_chunk(range, max)
    }

    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        if self.commits.fetch_add(1, Ordering::SeqCst) >= self.commits_before_failure {
            return Err(KvError::StoreUnavailable("disk went away".to_string()));
        }
        self.inner.commit_chunk(inserts, updates)
    }
}

/// MemStore that counts how many rows each scan asks for
pub struct CountingStore {
    inner: MemStore,
    pub largest_chunk: AtomicUsize,
    pub chunk_calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemStore::new(),
            largest_chunk: AtomicUsize::new(0),
            chunk_calls: AtomicUsize::new(0),
        })
    }

    pub fn as_shared(self: &Arc<Self>) -> SharedStore {
        self.clone()
    }
}

impl Store for CountingStore {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        self.inner.get(key)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>> {
        self.inner.get_many(keys)
    }

    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        self.inner.update(key, value, now)
    }

    fn insert(&self, entry: Entry) -> Result<bool> {
        self.inner.insert(entry)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key)
    }

    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk> {
        self.chunk_calls.fetch_add(1, Ordering::SeqCst);
        self.largest_chunk.fetch_max(max, Ordering::SeqCst);
        self.inner.scan_chunk(range, max)
    }

    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        self.inner.commit_chunk(inserts, updates)
    }
}

/// MemStore whose next `get` stalls after it has read, until the test releases it
pub struct GatedStore {
    inner: MemStore,
    armed: AtomicBool,
    read_done: Barrier,
    release: Barrier,
}

impl GatedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemStore::new(),
            armed: AtomicBool::new(false),
            read_done: Barrier::new(2),
            release: Barrier::new(2),
        })
    }

    pub fn as_shared(self: &Arc<Self>) -> SharedStore {
        self.clone()
    }

    /// Stall the next `get` once its read has completed
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Block until the stalled `get` has read its value
    pub fn wait_for_read(&self) {
        self.read_done.wait();
    }

    /// Let the stalled `get` return
    pub fn release(&self) {
        self.release.wait();
    }
}

impl Store for GatedStore {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        let found = self.inner.get(key)?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.read_done.wait();
            self.release.wait();
        }
        Ok(found)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>> {
        self.inner.get_many(keys)
    }

    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        self.inner.update(key, value, now)
    }

    fn insert(&self, entry: Entry) -> Result<bool> {
        self.inner.insert(entry)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key)
    }

    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk> {
        self.inner.scan_chunk(range, max)
    }

    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        self.inner.commit_chunk(inserts, updates)
    }
}

/// MemStore where another writer touches the first key of a chunk between
/// the batch's read and its commit, so the commit sees a version conflict.
pub struct InterferingStore {
    inner: MemStore,
    clean_commits: usize,
    interferences_left: AtomicUsize,
    commits: AtomicUsize,
    pub get_many_calls: AtomicUsize,
}

impl InterferingStore {
    /// Let `clean_commits` chunks through, then interfere with the next `times` commits
    pub fn new(clean_commits: usize, times: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemStore::new(),
            clean_commits,
            interferences_left: AtomicUsize::new(times),
            commits: AtomicUsize::new(0),
            get_many_calls: AtomicUsize::new(0),
        })
    }

    pub fn as_shared(self: &Arc<Self>) -> SharedStore {
        self.clone()
    }

    fn interfere(&self, key: &str) -> Result<()> {
        if self.inner.update(key, value("racer"), START_MILLIS)?.is_none() {
            self.inner.insert(Entry::new(key, "racer", START_MILLIS))?;
        }
        Ok(())
    }
}

impl Store for InterferingStore {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        self.inner.get(key)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>> {
        self.get_many_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many(keys)
    }

    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        self.inner.update(key, value, now)
    }

    fn insert(&self, entry: Entry) -> Result<bool> {
        self.inner.insert(entry)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key)
    }

    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk> {
        self.inner.scan_chunk(range, max)
    }

    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        let commit = self.commits.fetch_add(1, Ordering::SeqCst);
        let interfere = commit >= self.clean_commits
            && self
                .interferences_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if interfere {
            let target = updates
                .first()
                .map(|u| u.entry.key.clone())
                .or_else(|| inserts.first().map(|e| e.key.clone()));
            if let Some(key) = target {
                self.interfere(&key)?;
            }
        }
        self.inner.commit_chunk(inserts, updates)
    }
}
