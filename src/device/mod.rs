//! device — the RAM block device with page dedup and copy-on-write.
//!
//! Submodules:
//! - core.rs     — Device struct, creation, teardown.
//! - dispatch.rs — read/write/bio requests, per-page locking, copy-on-write.
//! - scan.rs     — bounded, resumable dedup scan and the privileged merge trigger.
//! - stats.rs    — debug snapshot and invariant checker.
//! - worker.rs   — background periodic scanner.

pub mod core;
pub mod dispatch;
pub mod scan;
pub mod stats;
pub mod worker;

pub use core::{Device, TeardownReport};
pub use scan::{Privilege, ScanReport};
pub use stats::{DebugSnapshot, InvariantReport};
pub use worker::ScanWorker;
