//! device/core — the Device: geometry, allocator, locked slot table, lifecycle.
//!
//! Lifecycle:
//! - Device::new()/with_hasher(): validates the configuration and allocates the
//!   slot table; nothing is left behind on failure.
//! - shutdown(): refuses new page operations, waits for the in-flight one, releases
//!   every slot's page. Live pages left after that are a lifecycle bug and panic.
//! - Drop runs shutdown() if nobody did.

use log::{debug, info};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};
use crate::lock::DeviceLock;
use crate::page::{hasher_for_kind, PageHasher};
use crate::pager::{PageAllocator, Released, SlotTable};

/// What teardown released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Pages destroyed.
    pub freed: u64,
    /// Handles dropped from pages that still had other sharers at that moment.
    pub unshared: u64,
}

pub struct Device {
    pub(crate) cfg: DeviceConfig,
    pub(crate) page_size: usize,
    pub(crate) page_count: usize,
    pub(crate) alloc: PageAllocator,
    pub(crate) table: DeviceLock<SlotTable>,
    // Serializes scanners so the cursor advances coherently.
    pub(crate) scan_gate: Mutex<()>,
    pub(crate) scan_budget: AtomicU32,
    pub(crate) trace: AtomicBool,
    torn_down: AtomicBool,
}

impl Device {
    /// Create a device using the checksum selected in `cfg`.
    pub fn new(cfg: DeviceConfig) -> Result<Self> {
        cfg.validate()?;
        let hasher = hasher_for_kind(cfg.checksum_kind).ok_or_else(|| {
            DeviceError::ConfigurationInvalid(format!(
                "unknown checksum kind {}",
                cfg.checksum_kind
            ))
        })?;
        Self::with_hasher(cfg, hasher)
    }

    /// Create a device with an explicit page checksum function.
    pub fn with_hasher(cfg: DeviceConfig, hasher: Arc<dyn PageHasher>) -> Result<Self> {
        cfg.validate()?;
        let page_size = cfg.page_size as usize;
        let page_count = cfg.page_count();
        let table = SlotTable::new(page_count)?;

        info!(
            "srd: {} bytes ({} pages of {} B, checksum {})",
            cfg.device_size,
            page_count,
            page_size,
            hasher.name()
        );

        Ok(Self {
            page_size,
            page_count,
            alloc: PageAllocator::new(page_size, hasher),
            table: DeviceLock::new(table),
            scan_gate: Mutex::new(()),
            scan_budget: AtomicU32::new(cfg.scan_window_budget),
            trace: AtomicBool::new(cfg.trace),
            torn_down: AtomicBool::new(false),
            cfg,
        })
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.cfg
    }

    #[inline]
    pub fn device_size(&self) -> u64 {
        self.cfg.device_size
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Physical pages currently alive.
    #[inline]
    pub fn allocated_pages(&self) -> u64 {
        self.alloc.allocated_pages()
    }

    /// Slots served by a page some earlier slot already holds.
    #[inline]
    pub fn merged_pages(&self) -> u64 {
        self.alloc.merged_pages()
    }

    pub fn set_trace(&self, on: bool) {
        self.trace.store(on, Ordering::Relaxed);
    }

    #[inline]
    pub fn trace(&self) -> bool {
        self.trace.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.table.is_closing()
    }

    /// Tear the device down: refuse new work, drain the in-flight operation,
    /// release every page.
    ///
    /// Idempotent; later calls return an empty report.
    ///
    /// # Panics
    /// If pages are still accounted as alive after every slot was released.
    pub fn shutdown(&self) -> TeardownReport {
        self.table.begin_close();
        let mut table = self.table.acquire_teardown();
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return TeardownReport::default();
        }

        let mut report = TeardownReport::default();
        table.drain(|page| match self.alloc.release(page) {
            Released::Freed => report.freed += 1,
            Released::Unshared => report.unshared += 1,
        });
        drop(table);

        let left = self.alloc.allocated_pages();
        if left != 0 {
            panic!("srd: {} page(s) still allocated after teardown", left);
        }
        debug_assert_eq!(self.alloc.merged_pages(), 0);

        info!(
            "srd: torn down ({} page(s) freed, {} shared handle(s) dropped)",
            report.freed, report.unshared
        );
        report
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if !self.torn_down.load(Ordering::Acquire) {
            debug!("srd: dropping device without explicit shutdown");
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("device_size", &self.cfg.device_size)
            .field("page_size", &self.page_size)
            .field("allocated_pages", &self.allocated_pages())
            .field("merged_pages", &self.merged_pages())
            .field("closing", &self.is_closing())
            .finish()
    }
}
