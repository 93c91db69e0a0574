use bytes::Bytes;
use chrono::{DateTime, Local};

use crate::capture::backend::RawFrame;

/// Pixel channels after conversion (BGRA)
pub const CHANNELS: u32 = 4;

/// A captured frame, immutable once constructed.
///
/// Pixel data is a shared `Bytes` buffer, so clones (thumbnail reads,
/// response payloads) never copy the pixels.
#[derive(Clone)]
pub struct Frame {
    /// Wall-clock capture time, microsecond resolution
    pub timestamp: DateTime<Local>,

    /// BGRA pixel data, `width * height * 4` bytes
    pub data: Bytes,

    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Convert a raw backend buffer into an owned frame.
    ///
    /// Copies the 24-bit rows into a fresh BGRA buffer, honoring the
    /// backend's row stride and correcting bottom-up scan order so the
    /// result is always top-down. `None` when the buffer is too short for
    /// the declared geometry - drivers can hand back truncated frames.
    pub fn from_raw(raw: &RawFrame<'_>, timestamp: DateTime<Local>) -> Option<Self> {
        let width = raw.width as usize;
        let height = raw.height as usize;
        let stride = raw.stride as usize;
        let row_bytes = width * 3;

        let needed = (height.saturating_sub(1)) * stride + if height > 0 { row_bytes } else { 0 };
        if raw.data.len() < needed {
            return None;
        }

        let mut data = Vec::with_capacity(width * height * CHANNELS as usize);
        for y in 0..height {
            let src_y = if raw.bottom_up { height - 1 - y } else { y };
            let row = &raw.data[src_y * stride..src_y * stride + row_bytes];
            for px in row.chunks_exact(3) {
                data.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
            }
        }

        Some(Self {
            timestamp,
            data: Bytes::from(data),
            width: raw.width,
            height: raw.height,
        })
    }

    /// Frame timestamp: local time, microsecond precision
    pub fn timestamp_micros(&self) -> String {
        self.timestamp.format("%Y/%m/%d %H:%M:%S%.6f").to_string()
    }

    /// Thumbnail timestamp: local time, millisecond precision
    pub fn timestamp_millis(&self) -> String {
        self.timestamp.format("%Y/%m/%d %H:%M:%S%.3f").to_string()
    }

    /// Response shape, `[height, width, channels]`
    pub fn shape(&self) -> [u32; 3] {
        [self.height, self.width, CHANNELS]
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("timestamp", &self.timestamp)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}
