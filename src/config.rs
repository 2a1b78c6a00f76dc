//! Centralized configuration and builder for the RAM disk.
//!
//! Goals:
//! - Single place to collect geometry and scan tunables.
//! - DeviceConfig::from_env() reads the SRD_* variables (same knobs as the module parameters).
//! - DeviceBuilder returns a DeviceConfig which Device consumes.
//!
//! Geometry rules (checked by validate()):
//! - page_size is a power of two and a multiple of SECTOR_SIZE;
//! - device_size is non-zero and page aligned.

use std::fmt;

use crate::consts::{
    CHECKSUM_KIND_CRC32C, CHECKSUM_KIND_XXH32, DEFAULT_DEVICE_SIZE, DEFAULT_PAGE_SIZE,
    DEFAULT_SCAN_INTERVAL_MS, DEFAULT_SCAN_WINDOW_BUDGET, ENV_CHECKSUM, ENV_DEBUG, ENV_PAGE_SIZE,
    ENV_SCAN_INTERVAL_MS, ENV_SCAN_PAGES, ENV_SIZE, SECTOR_SIZE,
};
use crate::error::{DeviceError, Result};

/// Top-level device configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Device capacity in bytes.
    /// Env: SRD_SIZE (default 4 pages)
    pub device_size: u64,

    /// Page size in bytes.
    /// Env: SRD_PAGE_SIZE (default 4096)
    pub page_size: u32,

    /// Outer iterations per scan invocation.
    /// Env: SRD_SCAN_PAGES (default 1024)
    pub scan_window_budget: u32,

    /// Period of the background scan worker; 0 disables it.
    /// Env: SRD_SCAN_INTERVAL_MS (default 0)
    pub scan_interval_ms: u64,

    /// Per-segment trace logging.
    /// Env: SRD_DEBUG = 0|1|true|false (default false)
    pub trace: bool,

    /// Page checksum function (CHECKSUM_KIND_*).
    /// Env: SRD_CHECKSUM = crc32c|xxh32 (default crc32c)
    pub checksum_kind: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_size: DEFAULT_DEVICE_SIZE,
            page_size: DEFAULT_PAGE_SIZE,
            scan_window_budget: DEFAULT_SCAN_WINDOW_BUDGET,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            trace: false,
            checksum_kind: CHECKSUM_KIND_CRC32C,
        }
    }
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl DeviceConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<u32>(ENV_PAGE_SIZE) {
            cfg.page_size = n;
        }
        if let Some(n) = env_parse::<u64>(ENV_SIZE) {
            cfg.device_size = n;
        }
        if let Some(n) = env_parse::<u32>(ENV_SCAN_PAGES) {
            cfg.scan_window_budget = n;
        }
        if let Some(n) = env_parse::<u64>(ENV_SCAN_INTERVAL_MS) {
            cfg.scan_interval_ms = n;
        }
        if let Ok(v) = std::env::var(ENV_DEBUG) {
            cfg.trace = env_flag(&v);
        }
        if let Ok(v) = std::env::var(ENV_CHECKSUM) {
            match v.trim().to_ascii_lowercase().as_str() {
                "xxh32" | "xxhash32" => cfg.checksum_kind = CHECKSUM_KIND_XXH32,
                "crc32c" => cfg.checksum_kind = CHECKSUM_KIND_CRC32C,
                _ => {}
            }
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_device_size(mut self, bytes: u64) -> Self {
        self.device_size = bytes;
        self
    }

    /// Size the device as `count` pages of the current page size.
    pub fn with_pages(mut self, count: u64) -> Self {
        self.device_size = count.saturating_mul(self.page_size as u64);
        self
    }

    pub fn with_page_size(mut self, bytes: u32) -> Self {
        self.page_size = bytes;
        self
    }

    pub fn with_scan_window_budget(mut self, budget: u32) -> Self {
        self.scan_window_budget = budget;
        self
    }

    pub fn with_scan_interval_ms(mut self, ms: u64) -> Self {
        self.scan_interval_ms = ms;
        self
    }

    pub fn with_trace(mut self, on: bool) -> Self {
        self.trace = on;
        self
    }

    pub fn with_checksum_kind(mut self, kind: u8) -> Self {
        self.checksum_kind = kind;
        self
    }

    /// Number of slots in the table.
    #[inline]
    pub fn page_count(&self) -> usize {
        (self.device_size / self.page_size as u64) as usize
    }

    /// Check geometry. Device creation refuses an invalid configuration.
    pub fn validate(&self) -> Result<()> {
        let ps = self.page_size as u64;
        if ps == 0 || !ps.is_power_of_two() {
            return Err(DeviceError::config(format!(
                "page_size {} is not a power of two",
                self.page_size
            )));
        }
        if ps % SECTOR_SIZE != 0 {
            return Err(DeviceError::config(format!(
                "page_size {} is not a multiple of the {}-byte sector",
                self.page_size, SECTOR_SIZE
            )));
        }
        if self.device_size == 0 {
            return Err(DeviceError::config("device_size must be non-zero"));
        }
        if self.device_size % ps != 0 {
            return Err(DeviceError::config(format!(
                "device_size {} is not a multiple of page_size {}",
                self.device_size, self.page_size
            )));
        }
        if self.page_count() as u64 != self.device_size / ps {
            return Err(DeviceError::config("device_size too large for this platform"));
        }
        if self.checksum_kind != CHECKSUM_KIND_CRC32C && self.checksum_kind != CHECKSUM_KIND_XXH32 {
            return Err(DeviceError::config(format!(
                "unknown checksum kind {}",
                self.checksum_kind
            )));
        }
        Ok(())
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> Self {
        self
    }
}

impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceConfig {{ \
             device_size: {}, \
             page_size: {}, \
             pages: {}, \
             scan_window_budget: {}, \
             scan_interval_ms: {}, \
             trace: {}, \
             checksum: {} \
             }}",
            self.device_size,
            self.page_size,
            self.device_size / (self.page_size.max(1) as u64),
            self.scan_window_budget,
            if self.scan_interval_ms == 0 {
                "off".to_string()
            } else {
                self.scan_interval_ms.to_string()
            },
            self.trace,
            match self.checksum_kind {
                CHECKSUM_KIND_CRC32C => "crc32c",
                CHECKSUM_KIND_XXH32 => "xxh32",
                _ => "unknown",
            },
        )
    }
}

/// Lightweight builder that produces a DeviceConfig.
#[derive(Clone, Debug)]
pub struct DeviceBuilder {
    cfg: DeviceConfig,
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: DeviceConfig::from_env(),
        }
    }
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: DeviceConfig::default(),
        }
    }

    pub fn device_size(mut self, bytes: u64) -> Self {
        self.cfg.device_size = bytes;
        self
    }

    /// Size the device as a number of pages of the current page size.
    pub fn pages(mut self, count: u64) -> Self {
        self.cfg.device_size = count.saturating_mul(self.cfg.page_size as u64);
        self
    }

    pub fn page_size(mut self, bytes: u32) -> Self {
        self.cfg.page_size = bytes;
        self
    }

    pub fn scan_window_budget(mut self, budget: u32) -> Self {
        self.cfg.scan_window_budget = budget;
        self
    }

    pub fn scan_interval_ms(mut self, ms: u64) -> Self {
        self.cfg.scan_interval_ms = ms;
        self
    }

    pub fn trace(mut self, on: bool) -> Self {
        self.cfg.trace = on;
        self
    }

    pub fn checksum_kind(mut self, kind: u8) -> Self {
        self.cfg.checksum_kind = kind;
        self
    }

    /// Finish the builder and obtain the configuration.
    pub fn build(self) -> DeviceConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_geometry_is_valid() {
        let cfg = DeviceConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.page_count(), 4);
    }

    #[test]
    fn rejects_bad_geometry() {
        let bad = [
            DeviceConfig::default().with_device_size(0),
            DeviceConfig::default().with_device_size(4096 + 512),
            DeviceConfig::default().with_page_size(3000),
            DeviceConfig::default().with_page_size(256).with_device_size(1024),
            DeviceConfig::default().with_page_size(0),
            DeviceConfig::default().with_checksum_kind(9),
        ];
        for cfg in bad {
            match cfg.validate() {
                Err(DeviceError::ConfigurationInvalid(_)) => {}
                other => panic!("expected ConfigurationInvalid for {cfg}, got {other:?}"),
            }
        }
    }

    #[test]
    fn with_pages_resizes_from_page_size() {
        let cfg = DeviceConfig::default().with_page_size(8192).with_pages(5);
        assert_eq!(cfg.device_size, 5 * 8192);
        assert_eq!(cfg.page_count(), 5);
        cfg.validate().unwrap();

        // overflow saturates and is then refused as unaligned
        let huge = DeviceConfig::default().with_pages(u64::MAX);
        assert_eq!(huge.device_size, u64::MAX);
        assert!(matches!(huge.validate(), Err(DeviceError::ConfigurationInvalid(_))));
    }

    #[test]
    fn builder_pages_uses_page_size() {
        let cfg = DeviceBuilder::from_default().page_size(8192).pages(3).build();
        assert_eq!(cfg.device_size, 3 * 8192);
        cfg.validate().unwrap();
    }
}
