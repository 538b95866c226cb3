//! Disk Store
//!
//! The persistent store that coordinates the WAL, MemTable and SSTables.
//!
//! ## Responsibilities
//! - Log every mutation to the WAL before it becomes visible
//! - Serve reads from MemTable first, then SSTables newest → oldest
//! - Flush the MemTable when it outgrows its limit
//! - Replay the WAL on startup

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::Config;
use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

use super::{merge_sources, KeyRange, ScanChunk, Store, VersionedUpdate};

/// WAL + MemTable + SSTable store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (update/insert/delete/commit_chunk/flush): serialized by `write_lock`.
///   The check and the write of a conditional operation happen under the same
///   guard, which is what makes each of them atomic.
/// - **Reads** (get/get_many/scan_chunk): no write lock. MemTable and StorageManager
///   take their own short read locks. MemTable is always read before SSTables so a
///   concurrent flush can only make a row visible twice, never zero times.
pub struct DiskStore {
    data_dir: PathBuf,

    /// Directory for SSTables
    storage_dir: PathBuf,

    memtable_size_limit: usize,

    /// Write-ahead log for durability
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl DiskStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create a store under `config.data_dir`
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL and flush what it held
    /// 4. Ready to serve requests
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            for entry in entries {
                match entry.operation {
                    Operation::Upsert(e) => {
                        memtable.put(e);
                    }
                    Operation::Delete { key } => {
                        memtable.delete(key);
                    }
                    Operation::Chunk(entries) => {
                        memtable.put_all(entries);
                    }
                }
            }

            // Make recovered data durable in an SSTable before the WAL is cut
            if !memtable.is_empty() {
                tracing::info!(
                    "Flushing {} recovered entries to SSTable",
                    memtable.entry_count()
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.truncate()?;

        Ok(Self {
            data_dir: config.data_dir.clone(),
            storage_dir,
            memtable_size_limit: config.memtable_size_limit,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(&config)
    }

    /// Newest record for a key: MemTable first, then SSTables
    fn lookup(&self, key: &str) -> Result<Option<Entry>> {
        if let Some(record) = self.memtable.get(key) {
            return Ok(record.live());
        }
        Ok(self.storage.get(key)?.and_then(MemTableEntry::live))
    }

    /// Log and apply one operation. Caller holds `write_lock`.
    fn apply_locked(&self, operation: Operation) -> Result<()> {
        self.wal.lock().append(operation.clone())?;

        let new_size = match operation {
            Operation::Upsert(entry) => self.memtable.put(entry),
            Operation::Delete { key } => self.memtable.delete(key),
            Operation::Chunk(entries) => self.memtable.put_all(entries),
        };

        // The operation is durable once the WAL append returns. A failed flush
        // leaves the MemTable in place and the next write tries again.
        if new_size >= self.memtable_size_limit {
            if let Err(e) = self.flush_locked() {
                tracing::warn!(
                    "memtable flush at {} bytes failed, keeping it in memory: {}",
                    new_size,
                    e
                );
            }
        }
        Ok(())
    }

    /// Flush memtable to disk
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_locked()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_locked(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        self.storage.flush(&self.memtable)?;
        self.memtable.clear();
        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the store gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }
}

impl Store for DiskStore {
    fn get(&self, key: &str) -> Result<Option<Entry>> {
        self.lookup(key).map_err(KvError::into_store_error)
    }

    fn get_many(&self, keys: &[String]) -> Result<Vec<Entry>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.lookup(key).map_err(KvError::into_store_error)? {
                found.push(entry);
            }
        }
        Ok(found)
    }

    fn update(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        let _write_guard = self.write_lock.lock();
        self.update_locked(key, value, now)
            .map_err(KvError::into_store_error)
    }

    fn insert(&self, entry: Entry) -> Result<bool> {
        let _write_guard = self.write_lock.lock();
        self.insert_locked(entry).map_err(KvError::into_store_error)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let _write_guard = self.write_lock.lock();
        self.delete_locked(key).map_err(KvError::into_store_error)
    }

    fn scan_chunk(&self, range: &KeyRange, max: usize) -> Result<ScanChunk> {
        if range.is_empty() || max == 0 {
            return Ok(ScanChunk::default());
        }

        let mut sources = Vec::with_capacity(self.storage.sstable_count() + 1);
        sources.push(self.memtable.range(range, max));
        sources.extend(
            self.storage
                .range(range, max)
                .map_err(KvError::into_store_error)?,
        );

        Ok(merge_sources(sources, max))
    }

    fn commit_chunk(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.commit_chunk_locked(inserts, updates)
            .map_err(KvError::into_store_error)
    }
}

// =============================================================================
// Write paths (called with write lock held)
// =============================================================================

impl DiskStore {
    fn update_locked(&self, key: &str, value: Bytes, now: u64) -> Result<Option<Entry>> {
        let Some(current) = self.lookup(key)? else {
            return Ok(None);
        };
        let next = current.next_version(value, now);
        self.apply_locked(Operation::Upsert(next.clone()))?;
        Ok(Some(next))
    }

    fn insert_locked(&self, entry: Entry) -> Result<bool> {
        if self.lookup(&entry.key)?.is_some() {
            return Ok(false);
        }
        self.apply_locked(Operation::Upsert(entry))?;
        Ok(true)
    }

    fn delete_locked(&self, key: &str) -> Result<bool> {
        if self.lookup(key)?.is_none() {
            return Ok(false);
        }
        self.apply_locked(Operation::Delete {
            key: key.to_string(),
        })?;
        Ok(true)
    }

    fn commit_chunk_locked(&self, inserts: Vec<Entry>, updates: Vec<VersionedUpdate>) -> Result<()> {
        for entry in &inserts {
            if self.lookup(&entry.key)?.is_some() {
                return Err(KvError::Conflict(entry.key.clone()));
            }
        }
        for update in &updates {
            match self.lookup(&update.entry.key)? {
                Some(current) if current.version == update.expected_version => {}
                _ => return Err(KvError::Conflict(update.entry.key.clone())),
            }
        }

        let mut entries = inserts;
        entries.extend(updates.into_iter().map(|u| u.entry));
        if entries.is_empty() {
            return Ok(());
        }
        self.apply_locked(Operation::Chunk(entries))
    }
}
