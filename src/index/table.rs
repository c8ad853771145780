//! Index implementation
//!
//! HashMap-based index with RwLock for concurrency.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::wal::{Operation, WalEntry};

use super::IndexEntry;

/// In-memory key → record offset map
///
/// Entries are only ever inserted or overwritten; a delete keeps the key with
/// `is_live == false`.
#[derive(Debug, Default)]
pub struct Index {
    entries: RwLock<HashMap<Vec<u8>, IndexEntry>>,
}

impl Index {
    /// Create a new empty Index
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<IndexEntry> {
        self.entries.read().get(key).copied()
    }

    /// Whether the key currently has a value
    pub fn is_live(&self, key: &[u8]) -> bool {
        self.get(key).is_some_and(|entry| entry.is_live)
    }

    /// Insert or overwrite a key (write lock), returning the previous entry
    pub fn upsert(&self, key: Vec<u8>, entry: IndexEntry) -> Option<IndexEntry> {
        self.entries.write().insert(key, entry)
    }

    /// Apply one replayed WAL record found at `offset`
    pub fn apply(&self, offset: u64, entry: WalEntry) {
        let is_live = entry.operation.is_set();
        let key = match entry.operation {
            Operation::Set { key, .. } | Operation::Delete { key } => key,
        };
        self.upsert(key, IndexEntry { offset, is_live });
    }

    /// Swap in the contents of a freshly rebuilt index
    pub fn replace_with(&self, rebuilt: Index) {
        *self.entries.write() = rebuilt.entries.into_inner();
    }

    /// Number of keys tracked, tombstones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of keys with a current value
    pub fn live_count(&self) -> usize {
        self.entries.read().values().filter(|e| e.is_live).count()
    }

    /// Number of deleted keys still tracked
    pub fn tombstone_count(&self) -> usize {
        self.entries.read().values().filter(|e| !e.is_live).count()
    }

    /// Live keys in sorted order
    pub fn live_keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self
            .entries
            .read()
            .iter()
            .filter(|(_, e)| e.is_live)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}
