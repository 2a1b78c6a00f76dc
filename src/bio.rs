//! Request types: direction, caller buffers and sector-addressed bios.
//!
//! A Bio is a request addressed by start sector (SECTOR_SIZE units) carrying one or
//! more segments; segments are laid out back to back starting at the bio's offset.

use crate::consts::SECTOR_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    /// Speculative read; served exactly like Read.
    ReadAhead,
    Write,
}

impl Direction {
    /// ReadAhead collapses to Read.
    #[inline]
    pub fn normalize(self) -> Self {
        match self {
            Direction::ReadAhead => Direction::Read,
            d => d,
        }
    }

    #[inline]
    pub fn is_write(self) -> bool {
        matches!(self, Direction::Write)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Read => "READ",
            Direction::ReadAhead => "READA",
            Direction::Write => "WRITE",
        }
    }
}

/// Caller buffer; the variant is the transfer direction.
#[derive(Debug)]
pub enum IoBuffer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

impl<'a> IoBuffer<'a> {
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            IoBuffer::Read(b) => b.len(),
            IoBuffer::Write(b) => b.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        match self {
            IoBuffer::Read(_) => Direction::Read,
            IoBuffer::Write(_) => Direction::Write,
        }
    }
}

/// One segment of a bio. For writes `data` is the payload; for reads it is
/// overwritten with the device content.
#[derive(Debug, Clone)]
pub struct BioSegment {
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Bio {
    pub sector: u64,
    pub direction: Direction,
    pub segments: Vec<BioSegment>,
}

impl Bio {
    pub fn new(sector: u64, direction: Direction) -> Self {
        Self {
            sector,
            direction,
            segments: Vec::new(),
        }
    }

    /// Read bio with segments of the given lengths (zero-filled).
    pub fn read(sector: u64, lens: &[usize]) -> Self {
        let mut bio = Self::new(sector, Direction::Read);
        for &len in lens {
            bio.segments.push(BioSegment { data: vec![0u8; len] });
        }
        bio
    }

    /// Write bio carrying the given payloads.
    pub fn write(sector: u64, payloads: Vec<Vec<u8>>) -> Self {
        let mut bio = Self::new(sector, Direction::Write);
        bio.segments = payloads.into_iter().map(|data| BioSegment { data }).collect();
        bio
    }

    pub fn push(&mut self, data: Vec<u8>) -> &mut Self {
        self.segments.push(BioSegment { data });
        self
    }

    /// Byte offset of the first segment; None if the sector is beyond any u64 offset.
    #[inline]
    pub fn offset(&self) -> Option<u64> {
        self.sector.checked_mul(SECTOR_SIZE)
    }

    /// Total payload length.
    pub fn size(&self) -> u64 {
        self.segments.iter().map(|s| s.data.len() as u64).sum()
    }

    /// All segments concatenated (handy after a read).
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size() as usize);
        for s in &self.segments {
            out.extend_from_slice(&s.data);
        }
        out
    }
}
