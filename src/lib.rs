//! srd — RAM block device with page-level content deduplication and copy-on-write.
//!
//! A device is a table of fixed-size slots. Each slot is empty or references a
//! physical page; identical pages found by the dedup scanner are merged into one
//! shared page, and a write to a shared page gets a private copy first.

pub mod bio;
pub mod config;
pub mod consts;
pub mod error;
pub mod lock;
pub mod metrics;

pub mod page;   // src/page/{mod,buffer,checksum}.rs
pub mod pager;  // src/pager/{mod,alloc,table}.rs
pub mod device; // src/device/{mod,core,dispatch,scan,stats,worker}.rs

// Convenient re-exports
pub use bio::{Bio, Direction, IoBuffer};
pub use config::{DeviceBuilder, DeviceConfig};
pub use device::{DebugSnapshot, Device, InvariantReport, Privilege, ScanReport, ScanWorker};
pub use error::{DeviceError, Result};
pub use page::{PageHasher, PageRef};
