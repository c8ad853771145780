//! WAL Reader
//!
//! Handles reading records from the WAL file.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, StoreError};

use super::{decode_one, Decoded, LockedFile, WalEntry};

/// Reads records from the WAL file
///
/// Each call opens its own handle, so concurrent readers never share a file
/// position or a lock.
#[derive(Debug, Clone)]
pub struct WalReader {
    path: PathBuf,
    lock_timeout: Option<Duration>,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path, lock_timeout: Option<Duration>) -> Result<Self> {
        // Fail early on a missing file rather than on the first read
        fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            lock_timeout,
        })
    }

    /// Read the single record starting at `offset`, under the shared lock
    pub fn read_at(&self, offset: u64) -> Result<WalEntry> {
        let file = LockedFile::new(File::open(&self.path)?, self.lock_timeout);

        file.shared(|mut handle| {
            let file_len = handle.metadata()?.len();
            handle.seek(SeekFrom::Start(offset))?;
            trace!(offset, file_len, "reading WAL record");

            match decode_one(&mut handle, offset, file_len)? {
                Decoded::Record { entry, .. } => Ok(entry),
                Decoded::EndOfLog => Err(StoreError::corruption(
                    offset,
                    "offset points past the end of the log",
                )),
                Decoded::TruncatedTail => Err(StoreError::corruption(
                    offset,
                    "offset points at an incomplete record",
                )),
            }
        })
    }

    /// Iterate over all records from offset 0.
    ///
    /// No lock is held while iterating; the scan covers the file as long as it
    /// was when this was called, and a record still being appended shows up
    /// as a truncated tail. Call again to restart from the beginning.
    pub fn entries(&self) -> Result<WalIterator<BufReader<File>>> {
        let file = File::open(&self.path)?;
        let file_len = file.metadata()?.len();
        Ok(WalIterator::new(BufReader::new(file), file_len))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Why a [`WalIterator`] stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEnd {
    /// Every byte belonged to a complete record
    Clean,

    /// An incomplete record starts at `offset`
    TruncatedTail { offset: u64 },
}

/// Lazy iterator over `(offset, entry)` pairs, in append order
///
/// Stops at the end of the log, at a torn tail, or after yielding the first
/// error.
pub struct WalIterator<R> {
    reader: R,
    offset: u64,
    file_len: u64,
    end: Option<LogEnd>,
    failed: bool,
}

impl<R: Read> WalIterator<R> {
    /// `reader` must be positioned at offset 0
    pub fn new(reader: R, file_len: u64) -> Self {
        Self {
            reader,
            offset: 0,
            file_len,
            end: None,
            failed: false,
        }
    }

    /// Offset of the next record to decode; once stopped, the valid log length
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// `None` until the iterator stopped without an error
    pub fn end(&self) -> Option<LogEnd> {
        self.end
    }
}

impl<R: Read> Iterator for WalIterator<R> {
    type Item = Result<(u64, WalEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end.is_some() || self.failed {
            return None;
        }

        match decode_one(&mut self.reader, self.offset, self.file_len) {
            Ok(Decoded::Record { entry, next_offset }) => {
                let offset = self.offset;
                self.offset = next_offset;
                Some(Ok((offset, entry)))
            }
            Ok(Decoded::EndOfLog) => {
                self.end = Some(LogEnd::Clean);
                None
            }
            Ok(Decoded::TruncatedTail) => {
                self.end = Some(LogEnd::TruncatedTail {
                    offset: self.offset,
                });
                None
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
