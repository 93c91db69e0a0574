//! Error types for the capture service

use thiserror::Error;

/// Errors surfaced by the capture core
#[derive(Error, Debug)]
pub enum CaptureError {
    /// No device matched the requested path
    #[error("device not found: {device_path}")]
    DeviceNotFound { device_path: String },

    /// Backend format enumeration failed
    #[error("capability query failed: {reason}")]
    CapabilityQueryFailed { reason: String },

    /// Start requested while a session is already running.
    /// Benign - reported to clients as `Result: false`, never a fault.
    #[error("capture session already running")]
    AlreadyRunning,

    /// Queue is empty; callers are expected to poll again later
    #[error("no frame available")]
    NoFrameAvailable,

    /// Nothing cached since the last start
    #[error("no thumbnail available")]
    NoThumbnailAvailable,

    /// Native setup/teardown failure. Raised only after partially-acquired
    /// backend resources have been released.
    #[error("backend failure: {reason}")]
    Backend { reason: String },

    /// Malformed or missing command payload fields
    #[error("invalid payload: {message}")]
    Validation { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}
