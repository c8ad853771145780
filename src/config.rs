//! Configuration for walkv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Main configuration for a Store instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Path of the write-ahead log file (the only file the store owns)
    pub wal_path: PathBuf,

    /// Sync strategy: how often to fsync the WAL
    pub sync_policy: SyncPolicy,

    // -------------------------------------------------------------------------
    // Locking Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on waiting for the WAL file lock.
    /// `None` blocks until the lock is granted.
    pub lock_timeout: Option<Duration>,

    /// Create missing parent directories of `wal_path` on open
    pub create_dirs: bool,
}

/// WAL sync policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPolicy {
    /// fsync after every write. A successful `set`/`delete` survives a crash.
    EveryWrite,

    /// fsync after N unsynced entries. Up to N-1 acknowledged writes may be
    /// lost on power failure.
    EveryNEntries { count: usize },
}

impl SyncPolicy {
    /// Whether a sync is due once `pending` entries are unsynced
    pub(crate) fn is_due(&self, pending: usize) -> bool {
        match *self {
            SyncPolicy::EveryWrite => true,
            SyncPolicy::EveryNEntries { count } => pending >= count,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal_path: PathBuf::from("write_ahead.log"),
            sync_policy: SyncPolicy::EveryWrite,
            lock_timeout: None,
            create_dirs: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration before any file is touched
    pub fn validate(&self) -> Result<()> {
        if self.wal_path.as_os_str().is_empty() {
            return Err(StoreError::Config("WAL path cannot be empty".to_string()));
        }
        if let SyncPolicy::EveryNEntries { count: 0 } = self.sync_policy {
            return Err(StoreError::Config(
                "EveryNEntries sync policy needs a count of at least 1".to_string(),
            ));
        }
        if self.lock_timeout == Some(Duration::ZERO) {
            return Err(StoreError::Config(
                "lock timeout must be non-zero (use None to block)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the WAL file path
    pub fn wal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal_path = path.into();
        self
    }

    /// Set the WAL sync policy
    pub fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.sync_policy = policy;
        self
    }

    /// Bound how long lock acquisition may wait
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = Some(timeout);
        self
    }

    /// Toggle creation of missing parent directories
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.config.create_dirs = create;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
