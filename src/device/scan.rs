//! device/scan — dedup scanner: find slots holding byte-identical pages and merge them.
//!
//! One invocation runs at most `budget` outer iterations (and never more than the
//! table length). Each outer iteration takes the slot under the rotating cursor as
//! head `i` and compares it against every later slot `j`:
//! - skip if either slot is empty or both already hold the same page;
//! - skip if checksums differ;
//! - full byte compare; equal checksums with different bytes are a collision and are skipped;
//! - otherwise slot j drops its page and becomes another sharer of slot i's page.
//!
//! The inner loop is not budgeted: one outer iteration costs O(table length).
//! Every pair decision holds the device lock on its own, so writers interleave
//! between decisions but never inside one. After the cursor advances the budget is
//! spent; the scanner yields the CPU once the invocation ends.

use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::error::{DeviceError, Result};
use crate::metrics;
use crate::pager::SlotTable;

use super::core::Device;

/// Caller privilege for the merge trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Admin,
    User,
}

/// Outcome of one scan invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Outer iterations run (cursor advances).
    pub iterations: u64,
    /// Pairs examined.
    pub pairs: u64,
    /// Pairs merged.
    pub merged: u64,
    /// Pairs with equal checksums but different content.
    pub collisions: u64,
    /// Cursor after the scan.
    pub cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairOutcome {
    Empty,
    AlreadyShared,
    Distinct,
    Collision,
    Merged,
}

impl Device {
    /// Current outer-iteration budget used by the merge trigger and the scan worker.
    #[inline]
    pub fn scan_window_budget(&self) -> u32 {
        self.scan_budget.load(Ordering::Relaxed)
    }

    pub fn set_scan_window_budget(&self, budget: u32) {
        self.scan_budget.store(budget, Ordering::Relaxed);
    }

    /// Run one bounded dedup pass starting at the scan cursor.
    pub fn scan_once(&self, budget: u32) -> Result<ScanReport> {
        let _gate = self.scan_gate.lock();
        let n = self.page_count;
        let rounds = (budget as usize).min(n);
        let mut report = ScanReport::default();

        for _ in 0..rounds {
            let head = self.table.acquire()?.cursor();
            for j in head + 1..n {
                let mut table = self.table.acquire()?;
                report.pairs += 1;
                match self.merge_pair(&mut table, head, j) {
                    PairOutcome::Merged => report.merged += 1,
                    PairOutcome::Collision => report.collisions += 1,
                    PairOutcome::Empty | PairOutcome::AlreadyShared | PairOutcome::Distinct => {}
                }
            }
            let mut table = self.table.acquire()?;
            table.advance_cursor();
            report.cursor = table.cursor();
            report.iterations += 1;
        }

        metrics::record_scan_run(report.iterations);
        if report.merged > 0 {
            info!(
                "srd: scan merged {} page(s) in {} iteration(s), cursor now {}",
                report.merged, report.iterations, report.cursor
            );
        } else {
            debug!(
                "srd: scan found nothing to merge ({} iteration(s), {} pair(s))",
                report.iterations, report.pairs
            );
        }

        std::thread::yield_now();
        Ok(report)
    }

    /// Privileged entry point: one scan_once() with the configured budget.
    pub fn trigger_merge(&self, who: Privilege) -> Result<ScanReport> {
        if who != Privilege::Admin {
            warn!("srd: merge trigger refused for unprivileged caller");
            return Err(DeviceError::Permission);
        }
        self.scan_once(self.scan_window_budget())
    }

    fn merge_pair(&self, table: &mut SlotTable, i: usize, j: usize) -> PairOutcome {
        let (Some(head), Some(other)) = (table.get(i), table.get(j)) else {
            return PairOutcome::Empty;
        };
        if head.ptr_eq(other) {
            return PairOutcome::AlreadyShared;
        }
        if head.checksum() != other.checksum() {
            return PairOutcome::Distinct;
        }
        if head.data() != other.data() {
            metrics::record_checksum_collision();
            debug!(
                "srd: checksum collision between slots {} and {} ({:#010x})",
                i,
                j,
                head.checksum()
            );
            return PairOutcome::Collision;
        }

        let shared = self.alloc.share(head);
        if let Some(old) = table.install(j, shared) {
            self.alloc.release(old);
        }
        metrics::record_merge();
        if self.trace() {
            debug!("srd: merged slot {} into slot {}", j, i);
        }
        PairOutcome::Merged
    }
}
