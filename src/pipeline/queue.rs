//! Bounded frame queue with drop-oldest eviction

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::trace;

use crate::capture::Frame;

/// Default queue depth, roughly one second of video at 30 fps
pub const DEFAULT_CAPACITY: usize = 30;

/// Thread-safe fixed-capacity FIFO of captured frames.
///
/// Overflow silently evicts the oldest entries, so a slow consumer always
/// sees a best-effort recent window. One producer (the backend delivery
/// thread) and one consumer (the command loop) share it.
pub struct BoundedFrameQueue {
    inner: Mutex<VecDeque<Frame>>,
    capacity: usize,
}

impl BoundedFrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Append a frame, then evict from the front while over capacity.
    ///
    /// Both steps happen under one lock acquisition, so eviction only ever
    /// removes the oldest surplus entries.
    pub fn enqueue(&self, frame: Frame) {
        let mut q = self.inner.lock();
        q.push_back(frame);
        while q.len() > self.capacity {
            q.pop_front();
            trace!("frame queue full, dropped oldest");
        }
    }

    /// Remove and return the oldest frame. Non-blocking: `None` when
    /// empty, callers poll.
    pub fn dequeue(&self) -> Option<Frame> {
        self.inner.lock().pop_front()
    }

    /// Empty the queue atomically. Only called on session stop, after
    /// frame delivery has been halted.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BoundedFrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
