//! page/buffer — the physical page: fixed-size content plus its checksum.
//!
//! Content is only mutated through write_at(), which recomputes the checksum
//! before returning, so `checksum == hash(data)` holds whenever a Page is observable.

use crate::error::{DeviceError, Result};

use super::checksum::PageHasher;

pub struct Page {
    data: Box<[u8]>,
    checksum: u32,
}

impl Page {
    /// Zero-filled page of `size` bytes.
    pub(crate) fn zeroed(size: usize, hasher: &dyn PageHasher) -> Result<Self> {
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| DeviceError::OutOfMemory { what: "page buffer" })?;
        buf.resize(size, 0);
        let checksum = hasher.checksum(&buf);
        Ok(Self {
            data: buf.into_boxed_slice(),
            checksum,
        })
    }

    /// Private copy of this page (content and checksum).
    pub(crate) fn duplicate(&self) -> Result<Self> {
        let mut buf: Vec<u8> = Vec::new();
        buf.try_reserve_exact(self.data.len())
            .map_err(|_| DeviceError::OutOfMemory { what: "page buffer" })?;
        buf.extend_from_slice(&self.data);
        Ok(Self {
            data: buf.into_boxed_slice(),
            checksum: self.checksum,
        })
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy `dst.len()` bytes starting at `offset` out of the page.
    #[inline]
    pub(crate) fn read_at(&self, offset: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
    }

    /// Copy `src` into the page at `offset` and refresh the checksum.
    pub(crate) fn write_at(&mut self, offset: usize, src: &[u8], hasher: &dyn PageHasher) {
        self.data[offset..offset + src.len()].copy_from_slice(src);
        self.checksum = hasher.checksum(&self.data);
    }

    /// Recompute and compare the checksum.
    pub fn verify(&self, hasher: &dyn PageHasher) -> bool {
        hasher.checksum(&self.data) == self.checksum
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("len", &self.data.len())
            .field("checksum", &format_args!("{:#010x}", self.checksum))
            .finish()
    }
}
