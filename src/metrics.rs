//! Lightweight global metrics.
//!
//! Thread-safe atomic counters for:
//! - Dispatcher (reads/writes/bytes/COW splits)
//! - Page allocator (pages created/freed)
//! - Dedup scanner (runs, outer iterations, merges, checksum collisions)
//!
//! These are process-wide and monotonic (until reset()). The per-device live
//! counters (allocated/merged pages) live on the device itself.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Dispatcher (counted per page-sized unit) -----
static READS_TOTAL: AtomicU64 = AtomicU64::new(0);
static WRITES_TOTAL: AtomicU64 = AtomicU64::new(0);
static BYTES_READ: AtomicU64 = AtomicU64::new(0);
static BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);
static COW_SPLITS: AtomicU64 = AtomicU64::new(0);
static REQUESTS_REJECTED: AtomicU64 = AtomicU64::new(0);

// ----- Allocator -----
static PAGES_CREATED: AtomicU64 = AtomicU64::new(0);
static PAGES_FREED: AtomicU64 = AtomicU64::new(0);

// ----- Scanner -----
static SCAN_RUNS: AtomicU64 = AtomicU64::new(0);
static SCAN_ITERATIONS: AtomicU64 = AtomicU64::new(0);
static MERGES_TOTAL: AtomicU64 = AtomicU64::new(0);
static CHECKSUM_COLLISIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Dispatcher
    pub reads_total: u64,
    pub writes_total: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub cow_splits: u64,
    pub requests_rejected: u64,

    // Allocator
    pub pages_created: u64,
    pub pages_freed: u64,

    // Scanner
    pub scan_runs: u64,
    pub scan_iterations: u64,
    pub merges_total: u64,
    pub checksum_collisions: u64,
}

impl MetricsSnapshot {
    pub fn avg_iterations_per_scan(&self) -> f64 {
        if self.scan_runs == 0 {
            0.0
        } else {
            self.scan_iterations as f64 / self.scan_runs as f64
        }
    }
}

// ----- Recorders (Dispatcher) -----
pub fn record_read(bytes: usize) {
    READS_TOTAL.fetch_add(1, Ordering::Relaxed);
    BYTES_READ.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_write(bytes: usize) {
    WRITES_TOTAL.fetch_add(1, Ordering::Relaxed);
    BYTES_WRITTEN.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_cow_split() {
    COW_SPLITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_request_rejected() {
    REQUESTS_REJECTED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Allocator) -----
pub fn record_page_created() {
    PAGES_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_page_freed() {
    PAGES_FREED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Scanner) -----
pub fn record_scan_run(iterations: u64) {
    SCAN_RUNS.fetch_add(1, Ordering::Relaxed);
    SCAN_ITERATIONS.fetch_add(iterations, Ordering::Relaxed);
}

pub fn record_merge() {
    MERGES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_checksum_collision() {
    CHECKSUM_COLLISIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        reads_total: READS_TOTAL.load(Ordering::Relaxed),
        writes_total: WRITES_TOTAL.load(Ordering::Relaxed),
        bytes_read: BYTES_READ.load(Ordering::Relaxed),
        bytes_written: BYTES_WRITTEN.load(Ordering::Relaxed),
        cow_splits: COW_SPLITS.load(Ordering::Relaxed),
        requests_rejected: REQUESTS_REJECTED.load(Ordering::Relaxed),
        pages_created: PAGES_CREATED.load(Ordering::Relaxed),
        pages_freed: PAGES_FREED.load(Ordering::Relaxed),
        scan_runs: SCAN_RUNS.load(Ordering::Relaxed),
        scan_iterations: SCAN_ITERATIONS.load(Ordering::Relaxed),
        merges_total: MERGES_TOTAL.load(Ordering::Relaxed),
        checksum_collisions: CHECKSUM_COLLISIONS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for c in [
        &READS_TOTAL,
        &WRITES_TOTAL,
        &BYTES_READ,
        &BYTES_WRITTEN,
        &COW_SPLITS,
        &REQUESTS_REJECTED,
        &PAGES_CREATED,
        &PAGES_FREED,
        &SCAN_RUNS,
        &SCAN_ITERATIONS,
        &MERGES_TOTAL,
        &CHECKSUM_COLLISIONS,
    ] {
        c.store(0, Ordering::Relaxed);
    }
}
