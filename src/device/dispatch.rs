//! device/dispatch — read/write requests against the slot table.
//!
//! A request is bounds-checked as a whole, then split into sub-ranges that never
//! straddle a page. Each sub-range takes the device lock on its own:
//!   resolve slot (allocate on miss) -> copy-on-write if shared and writing ->
//!   copy bytes -> checksum refresh (writes) -> unlock.
//! A large request is therefore not atomic as a whole, but every page-sized unit is.
//! Sub-ranges already committed when a later one fails are not rolled back.

use log::{debug, warn};
use std::ops::Range;

use crate::bio::{Bio, Direction, IoBuffer};
use crate::consts::SECTOR_SIZE;
use crate::error::{DeviceError, Result};
use crate::metrics;

use super::core::Device;

impl Device {
    /// Transfer `buf` at byte `offset`. Returns the number of bytes moved.
    pub fn dispatch(&self, offset: u64, buf: IoBuffer<'_>) -> Result<usize> {
        let len = buf.len();
        self.check_range(offset, len as u64)?;

        let done = match buf {
            IoBuffer::Read(dst) => self.walk_pages(offset, len, |pos, r| {
                self.dispatch_page(pos, IoBuffer::Read(&mut dst[r]))
            })?,
            IoBuffer::Write(src) => self.walk_pages(offset, len, |pos, r| {
                self.dispatch_page(pos, IoBuffer::Write(&src[r]))
            })?,
        };
        Ok(done)
    }

    /// Read `buf.len()` bytes at `offset`.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.dispatch(offset, IoBuffer::Read(buf))
    }

    /// Write `buf` at `offset`.
    pub fn write(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        self.dispatch(offset, IoBuffer::Write(buf))
    }

    /// Process a sector-addressed bio: the whole range is checked first, then the
    /// segments run in order; processing stops at the first failing segment.
    pub fn submit_bio(&self, bio: &mut Bio) -> Result<usize> {
        let mut start = match bio.offset() {
            Some(off) => off,
            None => {
                let offset = bio.sector.saturating_mul(SECTOR_SIZE);
                return Err(self.reject(offset, bio.size()));
            }
        };
        self.check_range(start, bio.size())?;

        let dir = bio.direction.normalize();
        let mut done = 0usize;
        for seg in bio.segments.iter_mut() {
            let buf = match dir {
                Direction::Write => IoBuffer::Write(&seg.data),
                _ => IoBuffer::Read(&mut seg.data),
            };
            let n = match self.dispatch(start, buf) {
                Ok(n) => n,
                Err(DeviceError::PartialTransfer {
                    transferred,
                    source,
                }) => {
                    return Err(DeviceError::PartialTransfer {
                        transferred: done + transferred,
                        source,
                    })
                }
                Err(e) => return Err(partial(done, e)),
            };
            done += n;
            start += n as u64;
        }
        Ok(done)
    }

    /// Bounds check for a request of `len` bytes at `offset`.
    pub fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        let device_size = self.cfg.device_size;
        match offset.checked_add(len) {
            Some(end) if end <= device_size => Ok(()),
            _ => Err(self.reject(offset, len)),
        }
    }

    fn reject(&self, offset: u64, len: u64) -> DeviceError {
        let device_size = self.cfg.device_size;
        metrics::record_request_rejected();
        warn!(
            "srd: request [{}, +{}) beyond device size {}",
            offset, len, device_size
        );
        DeviceError::OutOfRange {
            offset,
            len,
            device_size,
        }
    }

    /// Split [offset, offset+len) at page boundaries and call `f(pos, range_in_buf)`.
    fn walk_pages<F>(&self, offset: u64, len: usize, mut f: F) -> Result<usize>
    where
        F: FnMut(u64, Range<usize>) -> Result<()>,
    {
        let ps = self.page_size as u64;
        let mut done = 0usize;
        while done < len {
            let pos = offset + done as u64;
            let in_page = (pos % ps) as usize;
            let n = (self.page_size - in_page).min(len - done);
            f(pos, done..done + n).map_err(|e| partial(done, e))?;
            done += n;
        }
        Ok(done)
    }

    /// One page-sized unit, entirely under the device lock.
    fn dispatch_page(&self, pos: u64, buf: IoBuffer<'_>) -> Result<()> {
        let ps = self.page_size as u64;
        let idx = (pos / ps) as usize;
        let off = (pos % ps) as usize;
        debug_assert!(off + buf.len() <= self.page_size);

        if self.trace() {
            debug!(
                "srd: start = {}, count = {}, op = {}",
                pos,
                buf.len(),
                buf.direction().as_str()
            );
        }

        let mut table = self.table.acquire()?;
        let slot = table.slot_mut(idx);
        if slot.is_none() {
            *slot = Some(self.alloc.allocate()?);
        }

        match buf {
            IoBuffer::Read(dst) => {
                if let Some(page) = slot.as_ref() {
                    page.read_at(off, dst);
                    metrics::record_read(dst.len());
                }
            }
            IoBuffer::Write(src) => {
                if let Some(page) = slot.as_mut() {
                    match page.exclusive_mut() {
                        Some(p) => p.write_at(off, src, self.alloc.hasher()),
                        None => {
                            self.alloc.cow_write(page, off, src)?;
                            if self.trace() {
                                debug!("srd: copy-on-write split of slot {}", idx);
                            }
                        }
                    }
                    metrics::record_write(src.len());
                }
            }
        }
        Ok(())
    }
}

fn partial(done: usize, e: DeviceError) -> DeviceError {
    if done == 0 {
        e
    } else {
        DeviceError::PartialTransfer {
            transferred: done,
            source: Box::new(e),
        }
    }
}
