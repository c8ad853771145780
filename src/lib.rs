//! # walkv
//!
//! A minimal embedded key-value store with:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with torn-tail handling
//! - Single-writer/multi-reader concurrency model
//! - Advisory file locks for processes sharing one log
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                            Store                              │
//! │              set / get / delete / recover                     │
//! └──────────────┬────────────────────────────────┬───────────────┘
//!                │ writes (Mutex)                 │ reads
//!                ▼                                ▼
//!   ┌─────────────────────────┐       ┌────────────────────────┐
//!   │        WalWriter        │       │         Index          │
//!   │ exclusive lock + append │──────▶│ key → offset (RwLock)  │
//!   └────────────┬────────────┘       └───────────┬────────────┘
//!                │                                │ offset
//!                ▼                                ▼
//!   ┌────────────────────────────────────────────────────────────┐
//!   │                  WAL file (append-only)                    │
//!   │       shared lock + seek + read via WalReader              │
//!   └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use walkv::Store;
//!
//! let store = Store::open_path("data/write_ahead.log")?;
//! store.set(b"key1", b"value1")?;
//! assert_eq!(store.get(b"key1")?, Some(b"value1".to_vec()));
//! store.delete(b"key1")?;
//! assert_eq!(store.get(b"key1")?, None);
//! # Ok::<(), walkv::StoreError>(())
//! ```
//!
//! The log grows without bound; there is no compaction.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod index;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SyncPolicy};
pub use error::{Result, StoreError};
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of walkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
