//! Time-gated thumbnail cache

use chrono::Duration;
use parking_lot::Mutex;

use crate::capture::Frame;

/// Holds the most recent frame sampled at a minimum interval (default one
/// second), independent of the main queue's eviction.
///
/// Cached timestamps are monotonically non-decreasing across updates: a
/// frame only replaces the slot when at least `min_interval` has elapsed
/// since the cached one.
pub struct ThumbnailCache {
    slot: Mutex<Option<Frame>>,
    min_interval: Duration,
}

impl ThumbnailCache {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            min_interval,
        }
    }

    /// Cache `frame` iff the slot is empty or the frame is at least
    /// `min_interval` newer than the cached one.
    pub fn offer(&self, frame: &Frame) {
        let mut slot = self.slot.lock();
        let due = match slot.as_ref() {
            None => true,
            Some(cached) => frame.timestamp - cached.timestamp >= self.min_interval,
        };
        if due {
            *slot = Some(frame.clone());
        }
    }

    /// Copy-on-read of the cached thumbnail
    pub fn get(&self) -> Option<Frame> {
        self.slot.lock().clone()
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(Duration::seconds(1))
    }
}
