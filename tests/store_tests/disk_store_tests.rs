//! Tests for DiskStore
//!
//! These tests verify:
//! - Directory layout on open
//! - Flush to SSTable
//! - Crash recovery from the WAL, including a torn tail
//! - Reads that merge the memtable with SSTables

use std::fs::OpenOptions;
use std::io::Write;

use bytes::Bytes;
use quorumkv::config::{Config, WalSyncStrategy};
use quorumkv::entry::Entry;
use quorumkv::store::{DiskStore, KeyRange, Store, VersionedUpdate};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &std::path::Path, memtable_limit: usize) -> Config {
    Config::builder()
        .data_dir(dir)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite) // Sync every write for test reliability
        .memtable_size_limit(memtable_limit)
        .build()
}

fn setup_temp_store() -> (TempDir, DiskStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_open_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("mydb");

    let _store = DiskStore::open_path(&data_dir).unwrap();

    assert!(data_dir.exists());
    assert!(data_dir.join("sstables").exists());
    assert!(data_dir.join("wal.log").exists());
}

#[test]
fn test_flush_moves_memtable_to_sstable() {
    let (_temp, store) = setup_temp_store();
    store.insert(Entry::new("a", "1", 1)).unwrap();
    store.insert(Entry::new("b", "2", 1)).unwrap();
    assert_eq!(store.memtable_entry_count(), 2);

    store.flush().unwrap();

    assert_eq!(store.memtable_entry_count(), 0);
    assert_eq!(store.sstable_count(), 1);
    assert_eq!(store.get("a").unwrap().unwrap().value, Bytes::from_static(b"1"));
}

#[test]
fn test_small_memtable_triggers_flush() {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskStore::open(&config(temp_dir.path(), 100)).unwrap();

    for i in 0..10 {
        store
            .insert(Entry::new(format!("key{}", i), vec![b'x'; 64], 1))
            .unwrap();
    }

    assert!(store.sstable_count() > 0);
    for i in 0..10 {
        assert!(store.get(&format!("key{}", i)).unwrap().is_some());
    }
}

#[test]
fn test_failed_threshold_flush_keeps_write_acknowledged() {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskStore::open(&config(temp_dir.path(), 100)).unwrap();
    std::fs::remove_dir_all(store.storage_dir()).unwrap();

    // Crosses the limit, but there is nowhere to write the SSTable
    assert!(store.insert(Entry::new("a", vec![b'x'; 80], 1)).unwrap());
    let updated = store
        .update("a", Bytes::from(vec![b'y'; 80]), 2)
        .unwrap()
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(store.sstable_count(), 0);
    assert_eq!(store.get("a").unwrap().unwrap().version, 2);

    // Once the directory is back the next write flushes everything
    std::fs::create_dir_all(store.storage_dir()).unwrap();
    assert!(store.insert(Entry::new("b", vec![b'z'; 80], 3)).unwrap());
    assert_eq!(store.sstable_count(), 1);
    assert_eq!(store.memtable_entry_count(), 0);
    assert_eq!(store.get("a").unwrap().unwrap().version, 2);
    assert!(store.get("b").unwrap().is_some());
}

#[test]
fn test_delete_hides_flushed_value() {
    let (_temp, store) = setup_temp_store();
    store.insert(Entry::new("a", "1", 1)).unwrap();
    store.flush().unwrap();

    assert!(store.delete("a").unwrap());
    assert!(store.get("a").unwrap().is_none());

    store.flush().unwrap();
    assert!(store.get("a").unwrap().is_none());
    assert!(store
        .scan_chunk(&KeyRange::all(), 10)
        .unwrap()
        .entries
        .is_empty());
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
        store.insert(Entry::new("flushed", "1", 1)).unwrap();
        store.flush().unwrap();
        store.insert(Entry::new("logged", "2", 1)).unwrap();
        store.update("logged", Bytes::from_static(b"3"), 2).unwrap();
        store
            .commit_chunk(
                vec![Entry::new("chunked", "4", 3)],
                vec![VersionedUpdate {
                    expected_version: 1,
                    entry: Entry::new("flushed", "1", 1).next_version(Bytes::from_static(b"5"), 3),
                }],
            )
            .unwrap();
        // Dropped without close: the WAL is all that protects the last writes
    }

    let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
    let logged = store.get("logged").unwrap().unwrap();
    assert_eq!(logged.version, 2);
    assert_eq!(logged.value, Bytes::from_static(b"3"));
    assert_eq!(store.get("chunked").unwrap().unwrap().version, 1);
    assert_eq!(store.get("flushed").unwrap().unwrap().version, 2);
}

#[test]
fn test_torn_wal_tail_is_discarded() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
        store.insert(Entry::new("a", "1", 1)).unwrap();
    }

    // Half-written frame at the end of the log
    let mut wal = OpenOptions::new()
        .append(true)
        .open(temp_dir.path().join("wal.log"))
        .unwrap();
    wal.write_all(&[7u8; 11]).unwrap();
    drop(wal);

    let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
    assert!(store.get("a").unwrap().is_some());

    // Writes after recovery land on a clean log
    store.insert(Entry::new("b", "2", 1)).unwrap();
    drop(store);
    let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
    assert!(store.get("b").unwrap().is_some());
}

#[test]
fn test_scan_merges_memtable_and_sstables() {
    let (_temp, store) = setup_temp_store();
    for key in ["a", "c", "e"] {
        store.insert(Entry::new(key, "old", 1)).unwrap();
    }
    store.flush().unwrap();

    store.update("c", Bytes::from_static(b"new"), 2).unwrap();
    store.insert(Entry::new("b", "fresh", 2)).unwrap();
    store.delete("e").unwrap();

    let chunk = store.scan_chunk(&KeyRange::all(), 10).unwrap();
    let got: Vec<(String, u64)> = chunk
        .entries
        .into_iter()
        .map(|e| (e.key, e.version))
        .collect();
    assert_eq!(
        got,
        vec![
            ("a".to_string(), 1),
            ("b".to_string(), 1),
            ("c".to_string(), 2),
        ]
    );
    assert_eq!(chunk.resume_after, None);
}

#[test]
fn test_every_flush_adds_a_table_and_scans_merge_them_all() {
    let (_temp, store) = setup_temp_store();
    for i in 0..12u64 {
        if i == 0 {
            store.insert(Entry::new("k", "0", 1)).unwrap();
        } else {
            store.update("k", Bytes::from(i.to_string()), i + 1).unwrap();
        }
        store.insert(Entry::new(format!("t{:02}", i), "v", i + 1)).unwrap();
        store.flush().unwrap();
    }
    store.delete("t00").unwrap();
    store.flush().unwrap();

    // Tables are never merged
    assert_eq!(store.sstable_count(), 13);

    let chunk = store.scan_chunk(&KeyRange::all(), 5).unwrap();
    assert!(!chunk.entries.is_empty() && chunk.entries.len() <= 5);
    assert_eq!(chunk.entries[0].key, "k");
    assert_eq!(chunk.entries[0].version, 12);
    assert!(chunk.entries.iter().all(|e| e.key != "t00"));
    assert!(chunk.entries.windows(2).all(|w| w[0].key < w[1].key));
}

#[test]
fn test_close_flushes() {
    let temp_dir = TempDir::new().unwrap();
    let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
    store.insert(Entry::new("a", "1", 1)).unwrap();
    store.close().unwrap();

    let wal_len = std::fs::metadata(temp_dir.path().join("wal.log")).unwrap().len();
    assert_eq!(wal_len, 0);

    let store = DiskStore::open(&config(temp_dir.path(), 1024 * 1024)).unwrap();
    assert_eq!(store.sstable_count(), 1);
}
