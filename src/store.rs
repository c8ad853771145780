//! Store Module
//!
//! The key-value façade that coordinates the WAL and the Index.
//!
//! ## Responsibilities
//! - Log every mutation before it becomes visible
//! - Serve reads from the Index + one WAL read
//! - Rebuild the Index from the WAL on open (and on demand)

use std::fs;
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::index::{Index, IndexEntry};
use crate::wal::{Operation, RecoveryReport, WalReader, WalWriter};

/// An embedded key-value store backed by a single write-ahead log
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/delete/recover): Serialized by the `writer` mutex
///   - The append and the Index update happen under the same mutex, so the
///     Index always reflects the log in append order
///   - Across processes, appends serialize on the exclusive WAL file lock,
///     held for one record at a time
///
/// - **Reads** (get): Concurrent
///   - Index read lock for the lookup only
///   - Shared WAL file lock on a private handle for the seek + read
///   - A read racing a write on the same key returns the old or the new
///     state, never a torn record
pub struct Store {
    config: Config,

    /// Appends to the WAL (exclusive access needed)
    writer: Mutex<WalWriter>,

    /// Point reads from the WAL (no shared state)
    reader: WalReader,

    /// Key → offset of the current record (internal RwLock)
    index: Index,
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub live_keys: usize,
    pub tombstones: usize,
    /// Bytes of valid log
    pub wal_bytes: u64,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Validate config and create parent directories
    /// 2. Open/create the WAL file
    /// 3. Replay the WAL into a fresh Index
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        if config.create_dirs {
            if let Some(parent) = config.wal_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let writer = WalWriter::open(&config.wal_path, config.sync_policy, config.lock_timeout)?;
        let reader = WalReader::open(&config.wal_path, config.lock_timeout)?;

        let store = Self {
            config,
            writer: Mutex::new(writer),
            reader,
            index: Index::new(),
        };

        let report = store.recover()?;
        info!(
            path = %store.config.wal_path.display(),
            records = report.records_replayed,
            live_keys = store.index.live_count(),
            "store opened"
        );

        Ok(store)
    }

    /// Open with a WAL path (convenience method)
    ///
    /// Uses default config with the specified WAL file
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Config::builder().wal_path(path.as_ref()).build())
    }

    /// Set a key to a value
    ///
    /// Returns once the record is in the log (synced per the sync policy).
    /// On error neither the log nor the Index changed.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        validate_key(key)?;

        let mut writer = self.writer.lock();
        let offset = writer.append(Operation::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        self.index.upsert(key.to_vec(), IndexEntry::live(offset));

        debug!(key = %String::from_utf8_lossy(key), offset, "set");
        Ok(())
    }

    /// Get a value by key
    ///
    /// Returns `Ok(None)` when the key was never set or is deleted.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.index.get(key) else {
            debug!(key = %String::from_utf8_lossy(key), "get: key not found");
            return Ok(None);
        };
        if !entry.is_live {
            debug!(key = %String::from_utf8_lossy(key), "get: key is deleted");
            return Ok(None);
        }

        let record = self.reader.read_at(entry.offset)?;
        if record.key() != key {
            return Err(StoreError::corruption(
                entry.offset,
                format!(
                    "index expects key {:?}, record holds {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(record.key())
                ),
            ));
        }

        match record.operation {
            Operation::Set { value, .. } => Ok(Some(value)),
            Operation::Delete { .. } => Err(StoreError::corruption(
                entry.offset,
                "live index entry points at a delete record",
            )),
        }
    }

    /// Delete a key
    ///
    /// Returns `Ok(false)` without logging anything when the key has no
    /// current value; otherwise appends a tombstone and returns `Ok(true)`.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        validate_key(key)?;

        let mut writer = self.writer.lock();
        if !self.index.is_live(key) {
            debug!(key = %String::from_utf8_lossy(key), "delete: key not found");
            return Ok(false);
        }

        let offset = writer.append(Operation::Delete { key: key.to_vec() })?;
        self.index.upsert(key.to_vec(), IndexEntry::tombstone(offset));

        debug!(key = %String::from_utf8_lossy(key), offset, "delete");
        Ok(true)
    }

    /// Rebuild the Index by replaying the WAL from offset 0
    ///
    /// Holds the writer mutex and the exclusive file lock throughout. A torn
    /// tail is cut off; corruption before it aborts recovery and leaves the
    /// current Index untouched. Safe to call repeatedly.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let mut writer = self.writer.lock();

        let rebuilt = Index::new();
        let report = writer.replay(|offset, entry| rebuilt.apply(offset, entry))?;
        self.index.replace_with(rebuilt);

        Ok(report)
    }

    /// Force unsynced records to disk
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().sync()
    }

    /// Close the store, syncing the WAL
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Whether the key currently has a value (no WAL read)
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.index.is_live(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.index.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys in sorted order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.index.live_keys()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            live_keys: self.index.live_count(),
            tombstones: self.index.tombstone_count(),
            wal_bytes: self.writer.lock().cursor(),
        }
    }

    pub fn wal_path(&self) -> &Path {
        &self.config.wal_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidArgument("key cannot be empty".to_string()));
    }
    Ok(())
}
