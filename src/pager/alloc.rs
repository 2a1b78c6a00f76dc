//! pager/alloc — page creation/destruction and the live/merged page counters.
//!
//! Counters (per device):
//! - allocated_pages — physical pages alive;
//! - merged_pages    — extra sharers beyond the first, summed over all pages
//!                     (a page shared by N slots contributes N-1).
//!
//! So with every slot holding at most one handle:
//!   non-empty slots == allocated_pages + merged_pages.
//!
//! All mutating calls are made with the device lock held; the counters are
//! atomics only so that debug snapshots can read them without the lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::metrics;
use crate::page::{Page, PageHasher, PageRef};

/// What release() did to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Last handle: page destroyed.
    Freed,
    /// Other sharers remain; the page stays alive.
    Unshared,
}

pub struct PageAllocator {
    page_size: usize,
    hasher: Arc<dyn PageHasher>,
    allocated: AtomicU64,
    merged: AtomicU64,
}

impl PageAllocator {
    pub fn new(page_size: usize, hasher: Arc<dyn PageHasher>) -> Self {
        Self {
            page_size,
            hasher,
            allocated: AtomicU64::new(0),
            merged: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[inline]
    pub fn hasher(&self) -> &dyn PageHasher {
        self.hasher.as_ref()
    }

    /// New zeroed page with share count 1.
    pub fn allocate(&self) -> Result<PageRef> {
        let page = Page::zeroed(self.page_size, self.hasher())?;
        Ok(self.adopt(page))
    }

    /// Copy-on-write: replace this slot's handle to a shared page with a private
    /// copy that already carries `src` at `offset`. The old page loses one sharer.
    ///
    /// On allocation failure nothing is modified.
    pub fn cow_write(&self, page: &mut PageRef, offset: usize, src: &[u8]) -> Result<()> {
        let mut copy = page.duplicate()?;
        copy.write_at(offset, src, self.hasher());
        let old = std::mem::replace(page, self.adopt(copy));
        self.release(old);
        metrics::record_cow_split();
        Ok(())
    }

    fn adopt(&self, page: Page) -> PageRef {
        self.allocated.fetch_add(1, Ordering::AcqRel);
        metrics::record_page_created();
        PageRef::new(page)
    }

    /// One more sharer of `page` (merge).
    pub fn share(&self, page: &PageRef) -> PageRef {
        let out = page.share();
        self.merged.fetch_add(1, Ordering::AcqRel);
        out
    }

    /// Drop one sharer. Frees the page when it was the last one.
    pub fn release(&self, page: PageRef) -> Released {
        match page.into_last() {
            Ok(last) => {
                drop(last);
                let prev = self.allocated.fetch_sub(1, Ordering::AcqRel);
                debug_assert!(prev > 0, "allocated_pages underflow");
                metrics::record_page_freed();
                Released::Freed
            }
            Err(still_shared) => {
                drop(still_shared);
                let prev = self.merged.fetch_sub(1, Ordering::AcqRel);
                debug_assert!(prev > 0, "merged_pages underflow");
                Released::Unshared
            }
        }
    }

    #[inline]
    pub fn allocated_pages(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    #[inline]
    pub fn merged_pages(&self) -> u64 {
        self.merged.load(Ordering::Acquire)
    }
}
