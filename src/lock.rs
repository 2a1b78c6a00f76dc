//! The device lock: one critical section guarding the slot table and every page.
//!
//! Modes:
//! - Operation: taken once per page-sized unit of work (one dispatch sub-range, or
//!   one merge-pair decision). Refused with ShuttingDown once teardown has begun.
//! - Teardown/inspection: taken regardless of the closing flag.
//!
//! Teardown sets the closing flag first and then takes the lock, so it waits for
//! the in-flight unit to finish and nothing new can start after it.
//!
//! Sharding the lock by slot range would not change observable semantics; a
//! single lock is kept for now.

use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DeviceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Operation,
    Teardown,
}

pub struct DeviceLock<T> {
    inner: Mutex<T>,
    closing: AtomicBool,
}

pub struct LockGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    mode: LockMode,
}

impl<'a, T> LockGuard<'a, T> {
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl<'a, T> Deref for LockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T> DerefMut for LockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> DeviceLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            closing: AtomicBool::new(false),
        }
    }

    /// Acquire for one page operation. Blocks until acquired.
    pub fn acquire(&self) -> Result<LockGuard<'_, T>> {
        let guard = self.inner.lock();
        if self.closing.load(Ordering::Acquire) {
            return Err(DeviceError::ShuttingDown);
        }
        Ok(LockGuard {
            guard,
            mode: LockMode::Operation,
        })
    }

    /// Acquire for teardown or read-only inspection; ignores the closing flag.
    pub fn acquire_teardown(&self) -> LockGuard<'_, T> {
        LockGuard {
            guard: self.inner.lock(),
            mode: LockMode::Teardown,
        }
    }

    /// Refuse new operations from now on. Returns false if already closing.
    pub fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}
