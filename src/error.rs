//! Device errors.

use thiserror::Error;

/// Result type for device operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors surfaced by the device.
///
/// Every variant except `PartialTransfer` is reported before the page it
/// concerns is touched.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Page buffer or slot table could not be allocated.
    #[error("out of memory: {what}")]
    OutOfMemory { what: &'static str },

    /// Request does not fit inside the device.
    #[error("request [{offset}, +{len}) exceeds device size {device_size}")]
    OutOfRange {
        offset: u64,
        len: u64,
        device_size: u64,
    },

    /// Merge trigger without privilege.
    #[error("permission denied")]
    Permission,

    /// Bad geometry at device creation.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Teardown has started; no new page operations are accepted.
    #[error("device is shutting down")]
    ShuttingDown,

    /// Consistency check failed (checksum or share-count mismatch).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A multi-page request failed after some sub-ranges were committed.
    #[error("I/O error after {transferred} bytes: {source}")]
    PartialTransfer {
        transferred: usize,
        #[source]
        source: Box<DeviceError>,
    },
}

impl DeviceError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        DeviceError::ConfigurationInvalid(msg.into())
    }

    /// The error that actually stopped the transfer (unwraps `PartialTransfer`).
    pub fn root_cause(&self) -> &DeviceError {
        match self {
            DeviceError::PartialTransfer { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
