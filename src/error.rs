//! Error types for walkv
//!
//! Provides a unified error type for all operations.
//!
//! "Not found" is deliberately absent: a missing or deleted key is a normal
//! outcome (`get` returns `Ok(None)`, `delete` returns `Ok(false)`), and a
//! torn record at the end of the log is reported through
//! [`Decoded::TruncatedTail`](crate::wal::Decoded::TruncatedTail).

use std::time::Duration;

use thiserror::Error;

use crate::wal::LockMode;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for walkv operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("{mode} lock on WAL not acquired within {waited:?}")]
    LockUnavailable { mode: LockMode, waited: Duration },

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        StoreError::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only lock contention qualifies; nothing was written when it is returned.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::LockUnavailable { .. })
    }
}
