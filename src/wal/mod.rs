//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append one record per mutation, synced before the call returns
//! - CRC32 checksums to tell a torn tail from mid-log corruption
//! - Advisory file locks: exclusive for appends/replay, shared for reads
//! - Crash recovery and replay
//!
//! ## File Format
//! All integers are little-endian and unsigned.
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────────┐
//! │ Record 1                                                                   │
//! │ ┌────────┬──────────┬──────────┬────────┬──────────┬─────────┬─────┬─────┐ │
//! │ │ TS (8) │ KLen (4) │ VLen (4) │ Op (1) │ HCRC (4) │ CRC (4) │ Key │ Val │ │
//! │ └────────┴──────────┴──────────┴────────┴──────────┴─────────┴─────┴─────┘ │
//! ├────────────────────────────────────────────────────────────────────────────┤
//! │ Record 2 ...                                                               │
//! └────────────────────────────────────────────────────────────────────────────┘
//! ```
//! `Op` is 1 for Set and 2 for Delete; a Delete always has `VLen == 0`.
//! `HCRC` covers the first 17 header bytes, so a damaged length is caught
//! before it is used.
//! `CRC` covers the first 17 header bytes, the key and the value.

mod entry;
mod lock;
mod reader;
mod recovery;
mod writer;

pub use entry::{decode_one, encode_record, Decoded, Operation, WalEntry, HEADER_SIZE};
pub use lock::LockMode;
pub use reader::{LogEnd, WalIterator, WalReader};
pub use recovery::{RecoveryReport, WalRecovery};
pub use writer::WalWriter;

pub(crate) use lock::LockedFile;
