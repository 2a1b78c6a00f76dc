//! pager — page lifetime management and the slot table.
//!
//! Submodules:
//! - alloc.rs — PageAllocator: allocate/cow_write/share/release + live/merged counters.
//! - table.rs — SlotTable: logical page number -> Option<PageRef>, plus the scan cursor.

pub mod alloc;
pub mod table;

pub use alloc::{PageAllocator, Released};
pub use table::SlotTable;
