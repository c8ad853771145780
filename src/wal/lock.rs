//! Advisory WAL file locks
//!
//! Cross-process coordination over the log file. Appends and replay hold the
//! exclusive lock, point reads hold the shared lock. The lock is only held for
//! the duration of a closure, so it is released on every exit path.
//!
//! Locks are advisory and bound to the open file description (`flock` on
//! Unix, `LockFileEx` on Windows): two handles opened separately in the same
//! process contend exactly like two processes would.

use std::fmt;
use std::fs::File;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use fd_lock::RwLock;
use tracing::trace;

use crate::error::{Result, StoreError};

/// Longest single sleep while polling a contended lock
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Which advisory lock a caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => f.write_str("shared"),
            LockMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// A file handle that is only reachable while holding its advisory lock
pub(crate) struct LockedFile {
    lock: RwLock<File>,
    /// `None` blocks until the lock is granted
    timeout: Option<Duration>,
}

impl LockedFile {
    pub(crate) fn new(file: File, timeout: Option<Duration>) -> Self {
        Self {
            lock: RwLock::new(file),
            timeout,
        }
    }

    /// Run `f` while holding the exclusive lock
    pub(crate) fn exclusive<T>(&mut self, f: impl FnOnce(&mut File) -> Result<T>) -> Result<T> {
        let Some(timeout) = self.timeout else {
            let mut guard = self.lock.write()?;
            return f(&mut guard);
        };

        let deadline = Deadline::new(LockMode::Exclusive, timeout);
        loop {
            match self.lock.try_write() {
                Ok(mut guard) => return f(&mut guard),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => deadline.wait()?,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Run `f` under the exclusive lock if it is free right now.
    ///
    /// Returns `Ok(None)` without waiting when another handle holds the lock.
    pub(crate) fn try_exclusive<T>(
        &mut self,
        f: impl FnOnce(&mut File) -> Result<T>,
    ) -> Result<Option<T>> {
        match self.lock.try_write() {
            Ok(mut guard) => f(&mut guard).map(Some),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Run `f` while holding the shared lock
    pub(crate) fn shared<T>(&self, f: impl FnOnce(&File) -> Result<T>) -> Result<T> {
        let Some(timeout) = self.timeout else {
            let guard = self.lock.read()?;
            return f(&guard);
        };

        let deadline = Deadline::new(LockMode::Shared, timeout);
        loop {
            match self.lock.try_read() {
                Ok(guard) => return f(&guard),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => deadline.wait()?,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Bounded wait between lock attempts: spin/yield first, then short sleeps
struct Deadline {
    mode: LockMode,
    timeout: Duration,
    started: Instant,
    backoff: Backoff,
}

impl Deadline {
    fn new(mode: LockMode, timeout: Duration) -> Self {
        Self {
            mode,
            timeout,
            started: Instant::now(),
            backoff: Backoff::new(),
        }
    }

    fn wait(&self) -> Result<()> {
        let waited = self.started.elapsed();
        if waited >= self.timeout {
            return Err(StoreError::LockUnavailable {
                mode: self.mode,
                waited,
            });
        }

        if self.backoff.is_completed() {
            trace!(mode = %self.mode, ?waited, "WAL lock contended, sleeping");
            thread::sleep(MAX_POLL_INTERVAL.min(self.timeout - waited));
        } else {
            self.backoff.snooze();
        }
        Ok(())
    }
}
