//! Index Module
//!
//! In-memory map from key to the WAL record that currently defines it.
//!
//! ## Responsibilities
//! - O(1) key lookups without touching the log
//! - Single-writer/multi-reader access pattern
//! - Keep tombstoned keys so a replay reproduces the same state
//!
//! Values are not cached: a hit costs one seek + read in the WAL.

mod table;

pub use table::Index;

/// Entry stored in the Index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Start of the record that is this key's current source of truth
    pub offset: u64,

    /// `false` once the key's latest record is a Delete
    pub is_live: bool,
}

impl IndexEntry {
    pub fn live(offset: u64) -> Self {
        Self {
            offset,
            is_live: true,
        }
    }

    pub fn tombstone(offset: u64) -> Self {
        Self {
            offset,
            is_live: false,
        }
    }
}
