//! Tests for MemTable
//!
//! These tests verify:
//! - Put/get/delete with tombstones
//! - Size accounting and flush threshold
//! - Ordered, bounded range reads
//! - Snapshot iteration

use quorumkv::entry::Entry;
use quorumkv::memtable::{MemTable, MemTableEntry};
use quorumkv::store::KeyRange;

fn entry(key: &str, value: &str) -> Entry {
    Entry::new(key, value.as_bytes().to_vec(), 1)
}

#[test]
fn test_put_get() {
    let table = MemTable::new();
    table.put(entry("a", "1"));

    assert_eq!(table.get("a"), Some(MemTableEntry::Value(entry("a", "1"))));
    assert_eq!(table.get("b"), None);
}

#[test]
fn test_delete_leaves_tombstone() {
    let table = MemTable::new();
    table.put(entry("a", "1"));
    table.delete("a".to_string());

    assert_eq!(table.get("a"), Some(MemTableEntry::Tombstone));
    assert_eq!(table.entry_count(), 1);
}

#[test]
fn test_should_flush() {
    let table = MemTable::new();
    assert!(table.is_empty());
    assert!(!table.should_flush(100));

    table.put(entry("key", &"v".repeat(200)));
    assert!(table.should_flush(100));
}

#[test]
fn test_put_all_applies_every_entry() {
    let table = MemTable::new();
    table.put_all(vec![entry("x", "1"), entry("y", "2"), entry("z", "3")]);
    assert_eq!(table.entry_count(), 3);
    assert!(table.size() > 0);
}

#[test]
fn test_range_is_ordered_and_bounded() {
    let table = MemTable::new();
    for key in ["d", "b", "a", "c", "e"] {
        table.put(entry(key, key));
    }
    table.delete("c".to_string());

    let rows = table.range(&KeyRange::new("b", "e"), 10);
    let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["b", "c", "d"]);
    assert_eq!(rows[1].1, MemTableEntry::Tombstone);

    let limited = table.range(&KeyRange::all(), 2);
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].0, "a");
}

#[test]
fn test_range_on_empty_interval() {
    let table = MemTable::new();
    table.put(entry("a", "1"));
    assert!(table.range(&KeyRange::new("z", "a"), 10).is_empty());
}

#[test]
fn test_iter_is_snapshot() {
    let table = MemTable::new();
    table.put(entry("a", "1"));
    let iter = table.iter();
    table.put(entry("b", "2"));

    assert_eq!(iter.count(), 1);
}

#[test]
fn test_clear() {
    let table = MemTable::new();
    table.put(entry("a", "1"));
    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.size(), 0);
}
