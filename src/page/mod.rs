//! page — physical pages and the shared handle slots hold.
//!
//! Submodules:
//! - buffer.rs   — Page: fixed-size content + checksum, mutated only via write_at().
//! - checksum.rs — PageHasher trait, CRC32C (default) and XXH32 implementations.
//!
//! PageRef is the only way to hold a Page. It is not Clone: a new
//! sharer is created by PageAllocator::share() and a sharer goes away only through
//! PageAllocator::release(), which consumes the handle. The share count is the
//! handle's reference count, so it always equals the number of slots holding it.

pub mod buffer;
pub mod checksum;

use std::sync::Arc;

pub use buffer::Page;
pub use checksum::{hasher_for_kind, Crc32cHasher, PageHasher, Xxh32Hasher};

/// Shared, reference-counted handle to a Page.
pub struct PageRef {
    inner: Arc<Page>,
}

impl PageRef {
    pub(crate) fn new(page: Page) -> Self {
        Self {
            inner: Arc::new(page),
        }
    }

    /// Another handle to the same page. Only the allocator calls this (accounting).
    pub(crate) fn share(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of slots currently referencing the page.
    #[inline]
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.share_count() > 1
    }

    /// Same physical page?
    #[inline]
    pub fn ptr_eq(&self, other: &PageRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stable identity of the physical page while it is alive.
    #[inline]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    #[inline]
    pub fn page(&self) -> &Page {
        &self.inner
    }

    /// Mutable access, only for an exclusive page (share count 1).
    #[inline]
    pub(crate) fn exclusive_mut(&mut self) -> Option<&mut Page> {
        Arc::get_mut(&mut self.inner)
    }

    /// Give up this handle. Ok(page) if it was the last one.
    pub(crate) fn into_last(self) -> Result<Page, PageRef> {
        Arc::try_unwrap(self.inner).map_err(|inner| PageRef { inner })
    }
}

impl std::ops::Deref for PageRef {
    type Target = Page;

    fn deref(&self) -> &Page {
        &self.inner
    }
}

impl std::fmt::Debug for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRef")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("share_count", &self.share_count())
            .field("checksum", &format_args!("{:#010x}", self.checksum()))
            .finish()
    }
}
