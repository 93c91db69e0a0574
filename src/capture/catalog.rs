//! Device capability catalog

use serde::Serialize;

use crate::capture::backend::{CaptureBackend, RawFormat};
use crate::error::CaptureError;

/// A supported (width, height, bit depth, frame interval) combination.
/// All fields are non-zero by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityTuple {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u16,
    /// 100-nanosecond ticks between frames
    pub frame_interval: u64,
}

impl CapabilityTuple {
    fn decode(raw: &RawFormat) -> Option<Self> {
        if raw.width == 0 || raw.height == 0 || raw.bit_depth == 0 || raw.frame_interval == 0 {
            return None;
        }
        Some(Self {
            width: raw.width,
            height: raw.height,
            bit_depth: raw.bit_depth,
            frame_interval: raw.frame_interval,
        })
    }

    /// Wire form: `[width, height, bitDepth, frameInterval]`
    pub fn as_row(&self) -> [u64; 4] {
        [
            self.width as u64,
            self.height as u64,
            self.bit_depth as u64,
            self.frame_interval,
        ]
    }
}

/// Filters a backend's raw format table into valid capability tuples,
/// preserving the backend's enumeration order.
pub fn list_capabilities<B: CaptureBackend>(
    backend: &B,
    device_path: &str,
) -> Result<Vec<CapabilityTuple>, CaptureError> {
    let raw = backend.stream_capabilities(device_path)?;
    Ok(raw.iter().filter_map(CapabilityTuple::decode).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(width: u32, height: u32, bit_depth: u16, frame_interval: u64) -> RawFormat {
        RawFormat {
            width,
            height,
            bit_depth,
            frame_interval,
        }
    }

    #[test]
    fn drops_tuples_with_any_zero_field() {
        let raw = [
            fmt(640, 480, 24, 333_333),
            fmt(0, 480, 24, 333_333),
            fmt(640, 0, 24, 0),
        ];
        let kept: Vec<_> = raw.iter().filter_map(CapabilityTuple::decode).collect();
        assert_eq!(
            kept,
            vec![CapabilityTuple {
                width: 640,
                height: 480,
                bit_depth: 24,
                frame_interval: 333_333,
            }]
        );
    }

    #[test]
    fn preserves_enumeration_order() {
        let raw = [
            fmt(1920, 1080, 24, 333_333),
            fmt(640, 480, 24, 333_333),
            fmt(1280, 720, 24, 166_666),
        ];
        let kept: Vec<_> = raw.iter().filter_map(CapabilityTuple::decode).collect();
        let widths: Vec<_> = kept.iter().map(|c| c.width).collect();
        assert_eq!(widths, vec![1920, 640, 1280]);
    }

    #[test]
    fn wire_row_layout() {
        let cap = CapabilityTuple {
            width: 640,
            height: 480,
            bit_depth: 24,
            frame_interval: 333_333,
        };
        assert_eq!(cap.as_row(), [640, 480, 24, 333_333]);
    }
}
