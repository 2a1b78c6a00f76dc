//! device/stats — read-only introspection: debug snapshot and invariant checker.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::error::{DeviceError, Result};

use super::core::Device;

/// Counters exposed by the debug surface. Observing them has no side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DebugSnapshot {
    pub allocated_pages: u64,
    pub merged_pages: u64,
    pub scan_cursor: usize,
}

impl fmt::Display for DebugSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocated pages: {}", self.allocated_pages)?;
        writeln!(f, "merged pages: {}", self.merged_pages)?;
        writeln!(f, "scan cursor: {}", self.scan_cursor)
    }
}

/// Result of a full consistency walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InvariantReport {
    pub occupied_slots: usize,
    pub distinct_pages: usize,
    pub shared_pages: usize,
}

impl Device {
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let table = self.table.acquire_teardown();
        DebugSnapshot {
            allocated_pages: self.alloc.allocated_pages(),
            merged_pages: self.alloc.merged_pages(),
            scan_cursor: table.cursor(),
        }
    }

    /// Text form of debug_snapshot() (three `name: value` lines).
    pub fn debug_text(&self) -> String {
        self.debug_snapshot().to_string()
    }

    /// Walk every slot under the lock and verify:
    /// - checksum == hash(content) for each live page;
    /// - share count == number of slots referencing the page;
    /// - allocated_pages == distinct live pages;
    /// - merged_pages == occupied slots - distinct pages.
    pub fn check_invariants(&self) -> Result<InvariantReport> {
        let table = self.table.acquire_teardown();
        let hasher = self.alloc.hasher();

        // page id -> (slots seen, share count reported)
        let mut pages: HashMap<usize, (usize, usize)> = HashMap::new();
        let mut occupied = 0usize;
        for (idx, page) in table.iter_occupied() {
            occupied += 1;
            if !page.verify(hasher) {
                return Err(DeviceError::InvariantViolation(format!(
                    "slot {}: stored checksum {:#010x} does not match content",
                    idx,
                    page.checksum()
                )));
            }
            let e = pages.entry(page.id()).or_insert((0, page.share_count()));
            e.0 += 1;
        }

        let mut shared = 0usize;
        for (id, (slots, count)) in &pages {
            if slots != count {
                return Err(DeviceError::InvariantViolation(format!(
                    "page {:#x}: share count {} but referenced by {} slot(s)",
                    id, count, slots
                )));
            }
            if *slots > 1 {
                shared += 1;
            }
        }

        let allocated = self.alloc.allocated_pages();
        let merged = self.alloc.merged_pages();
        if allocated != pages.len() as u64 {
            return Err(DeviceError::InvariantViolation(format!(
                "allocated_pages {} but {} distinct live page(s)",
                allocated,
                pages.len()
            )));
        }
        if merged != (occupied - pages.len()) as u64 {
            return Err(DeviceError::InvariantViolation(format!(
                "merged_pages {} but {} occupied slot(s) over {} page(s)",
                merged,
                occupied,
                pages.len()
            )));
        }

        Ok(InvariantReport {
            occupied_slots: occupied,
            distinct_pages: pages.len(),
            shared_pages: shared,
        })
    }
}
