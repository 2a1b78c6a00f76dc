//! pager/table — slot table: logical page number -> optional shared page.
//!
//! Also owns the scan cursor, the rotating head index the dedup scanner starts
//! from, so round-robin fairness survives across scan invocations.
//!
//! The table is only ever touched with the device lock held.

use crate::error::{DeviceError, Result};
use crate::page::PageRef;

pub struct SlotTable {
    slots: Vec<Option<PageRef>>,
    cursor: usize,
}

impl SlotTable {
    /// Table of `count` empty slots.
    pub fn new(count: usize) -> Result<Self> {
        let mut slots: Vec<Option<PageRef>> = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|_| DeviceError::OutOfMemory { what: "slot table" })?;
        slots.resize_with(count, || None);
        Ok(Self { slots, cursor: 0 })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&PageRef> {
        self.slots.get(idx).and_then(|s| s.as_ref())
    }

    /// Mutable access to the slot itself (to install/replace its page).
    #[inline]
    pub fn slot_mut(&mut self, idx: usize) -> &mut Option<PageRef> {
        &mut self.slots[idx]
    }

    /// Put `page` into slot `idx`, returning whatever was there.
    #[inline]
    pub fn install(&mut self, idx: usize, page: PageRef) -> Option<PageRef> {
        self.slots[idx].replace(page)
    }

    #[inline]
    pub fn take(&mut self, idx: usize) -> Option<PageRef> {
        self.slots[idx].take()
    }

    /// Both slots non-empty and pointing at the same physical page?
    pub fn same_page(&self, a: usize, b: usize) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(x), Some(y)) => x.ptr_eq(y),
            _ => false,
        }
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// (index, page) for every non-empty slot.
    pub fn iter_occupied(&self) -> impl Iterator<Item = (usize, &PageRef)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|p| (i, p)))
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor one slot forward (mod table length).
    pub fn advance_cursor(&mut self) {
        if !self.slots.is_empty() {
            self.cursor = (self.cursor + 1) % self.slots.len();
        }
    }

    /// Empty every slot, handing the pages to `f` (teardown).
    pub fn drain<F: FnMut(PageRef)>(&mut self, mut f: F) {
        for slot in self.slots.iter_mut() {
            if let Some(p) = slot.take() {
                f(p);
            }
        }
    }
}
