//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;

use super::{LockedFile, WalEntry, WalIterator};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery (or verification) scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Number of complete records replayed
    pub records_replayed: u64,

    /// How many of those were Set records
    pub sets: u64,

    /// How many of those were Delete records
    pub deletes: u64,

    /// Length of the valid log (offset where the next append lands)
    pub valid_len: u64,

    /// Bytes of torn tail found after `valid_len`
    pub truncated_bytes: u64,

    /// Largest record timestamp seen
    pub last_timestamp: u64,
}

impl RecoveryReport {
    /// Whether an incomplete final record was found (and, for recovery, cut off)
    pub fn was_truncated(&self) -> bool {
        self.truncated_bytes > 0
    }

    fn record(&mut self, entry: &WalEntry) {
        self.records_replayed += 1;
        if entry.operation.is_set() {
            self.sets += 1;
        } else {
            self.deletes += 1;
        }
        self.last_timestamp = self.last_timestamp.max(entry.timestamp);
    }
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Take the exclusive lock
    /// 2. Read all complete records in order
    /// 3. Truncate a partial write at the end
    /// 4. Return every record with its offset
    ///
    /// Corruption before the tail is fatal: nothing after it can be trusted.
    pub fn recover(path: &Path) -> Result<(Vec<(u64, WalEntry)>, RecoveryReport)> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut file = LockedFile::new(file, None);

        let mut entries = Vec::new();
        let report = file.exclusive(|file| {
            Self::replay(file, |offset, entry| entries.push((offset, entry)))
        })?;

        Ok((entries, report))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryReport> {
        let file = LockedFile::new(File::open(path)?, None);

        file.shared(|handle| {
            let file_len = handle.metadata()?.len();
            Self::scan(BufReader::new(handle), file_len, |_, _| {})
        })
    }

    /// Replay through a handle the caller holds the exclusive lock on.
    pub(crate) fn replay<F>(file: &mut File, visit: F) -> Result<RecoveryReport>
    where
        F: FnMut(u64, WalEntry),
    {
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;

        let report = Self::scan(BufReader::new(&mut *file), file_len, visit)?;

        if report.was_truncated() {
            warn!(
                valid_len = report.valid_len,
                truncated_bytes = report.truncated_bytes,
                "discarding incomplete record at WAL tail"
            );
            file.set_len(report.valid_len)?;
            file.sync_all()?;
        }

        info!(
            records = report.records_replayed,
            sets = report.sets,
            deletes = report.deletes,
            valid_len = report.valid_len,
            "WAL replay complete"
        );

        Ok(report)
    }

    fn scan<R, F>(reader: R, file_len: u64, mut visit: F) -> Result<RecoveryReport>
    where
        R: Read,
        F: FnMut(u64, WalEntry),
    {
        let mut iter = WalIterator::new(reader, file_len);
        let mut report = RecoveryReport::default();

        for item in iter.by_ref() {
            let (offset, entry) = item?;
            report.record(&entry);
            visit(offset, entry);
        }

        report.valid_len = iter.position();
        report.truncated_bytes = file_len - report.valid_len;

        Ok(report)
    }
}
