//! Collaborator seam to the native video-capture backend.
//!
//! The core never touches device handles or format negotiation internals;
//! it consumes "raw frame delivered" callbacks and capability tables
//! through this trait.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;
use crate::CaptureConfig;

/// A discovered capture device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub device_path: String,
}

/// One undecoded format block from the backend's per-device table.
///
/// Fields may be zero for degenerate entries; the capability catalog
/// filters those out before they reach clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFormat {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u16,
    /// 100-nanosecond ticks between frames
    pub frame_interval: u64,
}

/// A frame as delivered by the backend: borrowed 24-bit pixel rows.
///
/// The sink must copy before returning; the buffer is only valid for the
/// duration of the callback.
pub struct RawFrame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Bytes per source row, including any padding
    pub stride: u32,
    /// True when the backend scans bottom-up (rows stored last-first)
    pub bottom_up: bool,
}

/// Frame-delivery callback registered with the backend at start.
///
/// Invoked from the backend's own delivery context, potentially a
/// dedicated capture thread. Must return promptly and never block on the
/// consumer.
pub type FrameSink = Arc<dyn Fn(RawFrame<'_>) + Send + Sync>;

/// Native capture backend: device discovery, format tables, and the
/// frame-delivery lifecycle.
pub trait CaptureBackend {
    /// Opaque running-capture handle, consumed by [`stop`](Self::stop)
    type Handle;

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    /// The backend's raw format table for one device, unfiltered
    fn stream_capabilities(&self, device_path: &str) -> Result<Vec<RawFormat>, CaptureError>;

    /// Resolve the device, apply non-zero override fields from `config`,
    /// register `sink` as the delivery target, and begin playback.
    ///
    /// On error every partially-acquired resource must already be
    /// released; no handle is returned.
    fn open_and_start(
        &self,
        config: &CaptureConfig,
        sink: FrameSink,
    ) -> Result<Self::Handle, CaptureError>;

    /// Halt frame delivery and release backend resources.
    ///
    /// Must not return until delivery has stopped; the session clears its
    /// buffers immediately afterwards.
    fn stop(&self, handle: Self::Handle);
}
