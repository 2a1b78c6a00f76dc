//! page/checksum — 32-bit content checksum of a page buffer.
//!
//! CRC32C (Castagnoli) is the default; XXH32 (seed 17) is selectable via config.
//! Both are fast and non-cryptographic: collisions are expected, so a checksum
//! match is only ever a pre-filter before a full byte comparison.
//!
//! The hasher is a trait object so a device can be created with a custom
//! function (tests use a degenerate one to force collisions).

use std::hash::Hasher;
use std::sync::Arc;

use crate::consts::{CHECKSUM_KIND_CRC32C, CHECKSUM_KIND_XXH32, XXH32_SEED};

/// Stable, deterministic hash over a page buffer.
pub trait PageHasher: Send + Sync {
    fn checksum(&self, data: &[u8]) -> u32;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32cHasher;

impl PageHasher for Crc32cHasher {
    #[inline]
    fn checksum(&self, data: &[u8]) -> u32 {
        crc32c::crc32c(data)
    }

    fn name(&self) -> &'static str {
        "crc32c"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Xxh32Hasher;

impl PageHasher for Xxh32Hasher {
    #[inline]
    fn checksum(&self, data: &[u8]) -> u32 {
        let mut h = twox_hash::XxHash32::with_seed(XXH32_SEED);
        h.write(data);
        h.finish() as u32
    }

    fn name(&self) -> &'static str {
        "xxh32"
    }
}

/// Hasher for a CHECKSUM_KIND_* value (None for unknown kinds).
pub fn hasher_for_kind(kind: u8) -> Option<Arc<dyn PageHasher>> {
    match kind {
        CHECKSUM_KIND_CRC32C => Some(Arc::new(Crc32cHasher)),
        CHECKSUM_KIND_XXH32 => Some(Arc::new(Xxh32Hasher)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksums_are_deterministic_and_content_sensitive() {
        for h in [hasher_for_kind(CHECKSUM_KIND_CRC32C), hasher_for_kind(CHECKSUM_KIND_XXH32)] {
            let h = h.unwrap();
            let a = vec![0xAAu8; 4096];
            let mut b = a.clone();
            assert_eq!(h.checksum(&a), h.checksum(&b), "{}", h.name());
            b[4095] = 0xAB;
            assert_ne!(h.checksum(&a), h.checksum(&b), "{}", h.name());
        }
    }

    #[test]
    fn unknown_kind_has_no_hasher() {
        assert!(hasher_for_kind(0).is_none());
    }
}
