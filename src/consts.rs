//! Shared constants (geometry, defaults, checksum seeds).

// -------- Geometry --------
/// Underlying transfer unit. Requests are addressed in sectors of this size.
pub const SECTOR_SIZE: u64 = 512;

// -------- Defaults --------
pub const DEFAULT_PAGE_SIZE: u32 = 4096;
/// Four pages, like the stock module parameter.
pub const DEFAULT_DEVICE_SIZE: u64 = DEFAULT_PAGE_SIZE as u64 * 4;
/// Outer iterations per scan invocation.
pub const DEFAULT_SCAN_WINDOW_BUDGET: u32 = 1024;
/// 0 = periodic scanning disabled (manual trigger only).
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 0;

// -------- Checksum --------
pub const CHECKSUM_KIND_CRC32C: u8 = 1;
pub const CHECKSUM_KIND_XXH32: u8 = 2;
pub const XXH32_SEED: u32 = 17;

// -------- Environment --------
pub const ENV_SIZE: &str = "SRD_SIZE";
pub const ENV_PAGE_SIZE: &str = "SRD_PAGE_SIZE";
pub const ENV_SCAN_PAGES: &str = "SRD_SCAN_PAGES";
pub const ENV_SCAN_INTERVAL_MS: &str = "SRD_SCAN_INTERVAL_MS";
pub const ENV_DEBUG: &str = "SRD_DEBUG";
pub const ENV_CHECKSUM: &str = "SRD_CHECKSUM";
pub const ENV_ADMIN_TOKEN: &str = "SRD_ADMIN_TOKEN";
