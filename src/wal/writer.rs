//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, warn};

use crate::config::SyncPolicy;
use crate::error::Result;

use super::{LockedFile, Operation, RecoveryReport, WalEntry, WalRecovery};

/// Appends records to the WAL file
///
/// Every append seeks to the current end of file under the exclusive lock, so
/// several writers (threads holding separate handles, or other processes)
/// interleave whole records and never overwrite each other.
pub struct WalWriter {
    path: PathBuf,
    file: LockedFile,
    sync_policy: SyncPolicy,
    /// Records written since the last sync
    unsynced: usize,
    /// End of the last record this writer appended or replayed
    cursor: u64,
    last_timestamp: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// The file is not scanned here; call [`WalWriter::replay`] (via
    /// `Store::recover`) before trusting `cursor()`.
    pub fn open(
        path: &Path,
        sync_policy: SyncPolicy,
        lock_timeout: Option<Duration>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let cursor = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: LockedFile::new(file, lock_timeout),
            sync_policy,
            unsynced: 0,
            cursor,
            last_timestamp: 0,
        })
    }

    /// Append an operation, returning the offset its record starts at
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let entry = WalEntry::new(self.next_timestamp(), operation);
        self.append_entry(&entry)
    }

    /// Append a pre-built entry, returning the offset its record starts at
    ///
    /// If the write or the sync fails, the partial record is cut off again and
    /// the error is returned: the append did not happen.
    pub fn append_entry(&mut self, entry: &WalEntry) -> Result<u64> {
        let record = entry.encode()?;
        let sync_now = self.sync_policy.is_due(self.unsynced + 1);

        let offset = self.file.exclusive(|file| {
            let offset = file.seek(SeekFrom::End(0))?;
            if let Err(err) = write_record(file, &record, sync_now) {
                error!(offset, error = %err, "WAL append failed");
                rollback(file, offset);
                return Err(err.into());
            }
            Ok(offset)
        })?;

        self.cursor = offset + record.len() as u64;
        self.unsynced = if sync_now { 0 } else { self.unsynced + 1 };
        debug!(offset, len = record.len(), synced = sync_now, "appended WAL record");

        Ok(offset)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.exclusive(|file| Ok(file.sync_data()?))?;
        self.unsynced = 0;
        Ok(())
    }

    /// Rebuild state from the log under the exclusive lock.
    ///
    /// `visit` sees every complete record in file order. A torn tail is cut
    /// off so the next append starts right after the last good record.
    pub fn replay<F>(&mut self, visit: F) -> Result<RecoveryReport>
    where
        F: FnMut(u64, WalEntry),
    {
        let report = self.file.exclusive(|file| WalRecovery::replay(file, visit))?;

        self.cursor = report.valid_len;
        self.unsynced = 0;
        self.last_timestamp = self.last_timestamp.max(report.last_timestamp);

        Ok(report)
    }

    /// Offset right after the last record this writer appended or replayed
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        self.sync_policy
    }

    /// Wall-clock millis, never going backwards for this writer
    fn next_timestamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_timestamp
    }
}

/// Syncs a pending batch on drop, but never waits for the file lock: if
/// another handle holds it, the batch is left to the OS and a warning is
/// logged. Call [`WalWriter::sync`] first for a guaranteed flush.
impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.unsynced == 0 {
            return;
        }
        match self.file.try_exclusive(|file| Ok(file.sync_data()?)) {
            Ok(Some(())) => self.unsynced = 0,
            Ok(None) => warn!(
                path = %self.path.display(),
                unsynced = self.unsynced,
                "WAL lock held elsewhere, skipping sync on close"
            ),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to sync WAL on close")
            }
        }
    }
}

fn write_record(file: &mut File, record: &[u8], sync: bool) -> io::Result<()> {
    file.write_all(record)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

/// Best effort: drop whatever part of a failed record reached the file
fn rollback(file: &mut File, offset: u64) {
    if let Err(err) = file.set_len(offset) {
        warn!(offset, error = %err, "could not roll back partial WAL record");
    }
}
