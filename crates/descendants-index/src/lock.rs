//! Shared/exclusive lock guarding the closure table's consistency window.
//!
//! Per-node updates hold it shared; the full rebuild holds it exclusive.
//! parking_lot's task-fair policy blocks new shared acquisitions while a
//! writer waits, so a rebuild is not starved by a steady stream of updates.
//! Shared acquisition is not reentrant: a thread already holding the lock
//! must not take it again.

use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{IndexError, Result};

pub type SharedGuard<'a> = RwLockReadGuard<'a, ()>;
pub type ExclusiveGuard<'a> = RwLockWriteGuard<'a, ()>;

#[derive(Debug, Default)]
pub struct DescendantsLock {
    inner: RwLock<()>,
}

impl DescendantsLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until shared access is granted.
    pub fn read(&self) -> SharedGuard<'_> {
        self.inner.read()
    }

    /// Blocks until exclusive access is granted.
    pub fn write(&self) -> ExclusiveGuard<'_> {
        self.inner.write()
    }

    pub fn try_read_for(&self, timeout: Duration) -> Result<SharedGuard<'_>> {
        self.inner.try_read_for(timeout).ok_or_else(|| {
            IndexError::LockTimeout(format!(
                "shared descendants lock not acquired within {}ms",
                timeout.as_millis()
            ))
        })
    }

    pub fn try_write_for(&self, timeout: Duration) -> Result<ExclusiveGuard<'_>> {
        self.inner.try_write_for(timeout).ok_or_else(|| {
            IndexError::LockTimeout(format!(
                "exclusive descendants lock not acquired within {}ms",
                timeout.as_millis()
            ))
        })
    }

    pub fn is_locked_exclusive(&self) -> bool {
        self.inner.is_locked_exclusive()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
