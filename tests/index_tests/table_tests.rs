//! Index Tests
//!
//! Tests verify:
//! - Upsert/lookup semantics
//! - Tombstones keep their key
//! - Replay application (last write wins)
//! - Wholesale replacement after a rebuild
//! - Concurrent access patterns

use std::sync::Arc;
use std::thread;

use walkv::index::{Index, IndexEntry};
use walkv::wal::{Operation, WalEntry};

fn set(key: &str, value: &str) -> WalEntry {
    WalEntry::new(
        0,
        Operation::Set {
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        },
    )
}

fn delete(key: &str) -> WalEntry {
    WalEntry::new(0, Operation::Delete { key: key.as_bytes().to_vec() })
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_index_is_empty() {
    let index = Index::new();
    assert!(index.is_empty());
    assert_eq!(index.len(), 0);
    assert_eq!(index.live_count(), 0);
    assert_eq!(index.tombstone_count(), 0);
}

#[test]
fn test_upsert_and_get() {
    let index = Index::new();

    assert_eq!(index.upsert(b"key1".to_vec(), IndexEntry::live(0)), None);

    assert_eq!(index.get(b"key1"), Some(IndexEntry::live(0)));
    assert!(index.is_live(b"key1"));
}

#[test]
fn test_get_nonexistent_key() {
    let index = Index::new();

    assert_eq!(index.get(b"nonexistent"), None);
    assert!(!index.is_live(b"nonexistent"));
}

#[test]
fn test_upsert_overwrites_and_returns_previous() {
    let index = Index::new();

    index.upsert(b"k".to_vec(), IndexEntry::live(0));
    let previous = index.upsert(b"k".to_vec(), IndexEntry::live(40));

    assert_eq!(previous, Some(IndexEntry::live(0)));
    assert_eq!(index.get(b"k"), Some(IndexEntry::live(40)));
    assert_eq!(index.len(), 1);
}

// =============================================================================
// Tombstone Tests
// =============================================================================

#[test]
fn test_tombstone_keeps_key() {
    let index = Index::new();

    index.upsert(b"k".to_vec(), IndexEntry::live(0));
    index.upsert(b"k".to_vec(), IndexEntry::tombstone(30));

    assert_eq!(index.get(b"k"), Some(IndexEntry { offset: 30, is_live: false }));
    assert!(!index.is_live(b"k"));
    assert_eq!(index.len(), 1);
    assert_eq!(index.live_count(), 0);
    assert_eq!(index.tombstone_count(), 1);
}

#[test]
fn test_live_keys_are_sorted_and_skip_tombstones() {
    let index = Index::new();

    index.upsert(b"cherry".to_vec(), IndexEntry::live(0));
    index.upsert(b"apple".to_vec(), IndexEntry::live(10));
    index.upsert(b"banana".to_vec(), IndexEntry::tombstone(20));

    assert_eq!(index.live_keys(), vec![b"apple".to_vec(), b"cherry".to_vec()]);
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_apply_last_write_wins() {
    let index = Index::new();

    index.apply(0, set("a", "1"));
    index.apply(30, set("b", "2"));
    index.apply(60, delete("a"));
    index.apply(90, set("b", "3"));

    assert_eq!(index.get(b"a"), Some(IndexEntry::tombstone(60)));
    assert_eq!(index.get(b"b"), Some(IndexEntry::live(90)));
}

#[test]
fn test_apply_set_after_delete_revives_key() {
    let index = Index::new();

    index.apply(0, set("a", "1"));
    index.apply(30, delete("a"));
    index.apply(60, set("a", "again"));

    assert_eq!(index.get(b"a"), Some(IndexEntry::live(60)));
}

#[test]
fn test_replace_with_swaps_contents() {
    let index = Index::new();
    index.upsert(b"stale".to_vec(), IndexEntry::live(0));

    let rebuilt = Index::new();
    rebuilt.apply(0, set("fresh", "1"));
    index.replace_with(rebuilt);

    assert_eq!(index.get(b"stale"), None);
    assert!(index.is_live(b"fresh"));
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_concurrent_upserts_on_disjoint_keys() {
    let index = Arc::new(Index::new());

    let mut handles = vec![];
    for t in 0..8u64 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            for i in 0..100u64 {
                let key = format!("t{}_k{}", t, i).into_bytes();
                index.upsert(key, IndexEntry::live(t * 1000 + i));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.live_count(), 800);
    assert_eq!(index.get(b"t3_k42"), Some(IndexEntry::live(3042)));
}

#[test]
fn test_concurrent_reads_during_writes() {
    let index = Arc::new(Index::new());
    index.upsert(b"stable".to_vec(), IndexEntry::live(7));

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for i in 0..1000u64 {
                index.upsert(format!("k{}", i).into_bytes(), IndexEntry::live(i));
            }
        })
    };

    let mut readers = vec![];
    for _ in 0..4 {
        let index = Arc::clone(&index);
        readers.push(thread::spawn(move || {
            for _ in 0..1000 {
                assert_eq!(index.get(b"stable"), Some(IndexEntry::live(7)));
            }
        }));
    }

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(index.live_count(), 1001);
}
