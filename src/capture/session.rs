//! Capture session lifecycle
//!
//! One session drives at most one active capture. The backend delivers
//! frames on its own thread through the sink registered at start; the
//! command loop pulls them back out synchronously.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::capture::backend::{CaptureBackend, FrameSink, RawFrame};
use crate::capture::Frame;
use crate::error::CaptureError;
use crate::pipeline::{BoundedFrameQueue, ThumbnailCache};
use crate::CaptureConfig;

/// Owns the Idle -> Running -> Idle lifecycle of a single capture and the
/// shared frame buffers the backend feeds.
pub struct CaptureSession<B: CaptureBackend> {
    backend: Arc<B>,
    queue: Arc<BoundedFrameQueue>,
    thumbnails: Arc<ThumbnailCache>,
    /// `Some` iff the session is Running
    handle: Option<B::Handle>,
}

impl<B: CaptureBackend> CaptureSession<B> {
    pub fn new(
        backend: Arc<B>,
        queue: Arc<BoundedFrameQueue>,
        thumbnails: Arc<ThumbnailCache>,
    ) -> Self {
        Self {
            backend,
            queue,
            thumbnails,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start capturing with `config`.
    ///
    /// `Ok(false)` when already running or when the device path matches no
    /// device - both benign, no state change. Backend setup failures have
    /// already unwound their resources when they surface here, so the
    /// session stays Idle.
    pub fn start(&mut self, config: &CaptureConfig) -> Result<bool, CaptureError> {
        if self.handle.is_some() {
            debug!("start requested while already running");
            return Ok(false);
        }

        let sink = self.frame_sink();
        match self.backend.open_and_start(config, sink) {
            Ok(handle) => {
                self.handle = Some(handle);
                info!(device = %config.device_path, "capture started");
                Ok(true)
            }
            Err(CaptureError::DeviceNotFound { device_path }) => {
                warn!(device = %device_path, "start requested for unknown device");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop capturing. Idempotent: always ends Idle.
    ///
    /// Backend delivery is halted and its resources released before the
    /// buffers are cleared, so no in-flight frame from the old session can
    /// land in the cleared queue.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.backend.stop(handle);
            info!("capture stopped");
        }
        self.queue.clear();
        self.thumbnails.clear();
    }

    /// Pop the oldest queued frame
    pub fn get_frame(&self) -> Result<Frame, CaptureError> {
        self.queue.dequeue().ok_or(CaptureError::NoFrameAvailable)
    }

    /// Copy-on-read of the cached thumbnail
    pub fn get_thumbnail(&self) -> Result<Frame, CaptureError> {
        self.thumbnails
            .get()
            .ok_or(CaptureError::NoThumbnailAvailable)
    }

    /// Build the delivery callback handed to the backend.
    ///
    /// Runs on the backend's delivery thread: convert, enqueue, and offer
    /// to the thumbnail cache. Never blocks on the consumer.
    fn frame_sink(&self) -> FrameSink {
        let queue = Arc::clone(&self.queue);
        let thumbnails = Arc::clone(&self.thumbnails);
        Arc::new(move |raw: RawFrame<'_>| {
            let Some(frame) = Frame::from_raw(&raw, Local::now()) else {
                warn!(
                    len = raw.data.len(),
                    width = raw.width,
                    height = raw.height,
                    stride = raw.stride,
                    "dropping truncated frame buffer"
                );
                return;
            };
            thumbnails.offer(&frame);
            queue.enqueue(frame);
        })
    }
}

impl<B: CaptureBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        // The backend handle must never be orphaned
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::capture::backend::{DeviceInfo, RawFormat};

    /// Scripted backend: hands the registered sink back to the test and
    /// counts lifecycle calls.
    #[derive(Default)]
    struct MockBackend {
        sink: Mutex<Option<FrameSink>>,
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: bool,
    }

    impl MockBackend {
        fn deliver(&self, tag: u8, width: u32, height: u32) {
            let data = vec![tag; (width * height * 3) as usize];
            self.deliver_bytes(&data, width, height, width * 3);
        }

        fn deliver_bytes(&self, data: &[u8], width: u32, height: u32, stride: u32) {
            let sink = self.sink.lock().clone().expect("no sink registered");
            sink(RawFrame {
                data,
                width,
                height,
                stride,
                bottom_up: false,
            });
        }
    }

    impl CaptureBackend for &MockBackend {
        type Handle = ();

        fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
            Ok(vec![DeviceInfo {
                name: "mock".into(),
                device_path: "/dev/mock0".into(),
            }])
        }

        fn stream_capabilities(&self, _: &str) -> Result<Vec<RawFormat>, CaptureError> {
            Ok(vec![])
        }

        fn open_and_start(
            &self,
            config: &CaptureConfig,
            sink: FrameSink,
        ) -> Result<(), CaptureError> {
            if config.device_path != "/dev/mock0" {
                return Err(CaptureError::DeviceNotFound {
                    device_path: config.device_path.clone(),
                });
            }
            if self.fail_start {
                return Err(CaptureError::backend("mock start failure"));
            }
            *self.sink.lock() = Some(sink);
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self, _handle: ()) {
            *self.sink.lock() = None;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn session(backend: &MockBackend) -> CaptureSession<&MockBackend> {
        CaptureSession::new(
            Arc::new(backend),
            Arc::new(BoundedFrameQueue::new(4)),
            Arc::new(ThumbnailCache::default()),
        )
    }

    fn config(path: &str) -> CaptureConfig {
        CaptureConfig {
            device_path: path.into(),
            width: 0,
            height: 0,
            bit_depth: 0,
            frame_interval: 0,
        }
    }

    #[test]
    fn start_transitions_to_running() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        assert!(!s.is_running());
        assert!(s.start(&config("/dev/mock0")).unwrap());
        assert!(s.is_running());
    }

    #[test]
    fn start_while_running_is_false_with_no_side_effects() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        s.start(&config("/dev/mock0")).unwrap();
        backend.deliver(7, 2, 2);

        assert!(!s.start(&config("/dev/mock0")).unwrap());
        assert_eq!(backend.starts.load(Ordering::SeqCst), 1);
        // queued frame survives the rejected start
        assert!(s.get_frame().is_ok());
    }

    #[test]
    fn unknown_device_is_false_not_error() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        assert!(!s.start(&config("/dev/nope")).unwrap());
        assert!(!s.is_running());
    }

    #[test]
    fn backend_failure_propagates_and_stays_idle() {
        let backend = MockBackend {
            fail_start: true,
            ..Default::default()
        };
        let mut s = session(&backend);
        assert!(matches!(
            s.start(&config("/dev/mock0")),
            Err(CaptureError::Backend { .. })
        ));
        assert!(!s.is_running());
    }

    #[test]
    fn frames_dequeue_in_fifo_order() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        s.start(&config("/dev/mock0")).unwrap();
        for tag in 1..=3 {
            backend.deliver(tag, 2, 2);
        }
        for tag in 1..=3 {
            assert_eq!(s.get_frame().unwrap().data[0], tag);
        }
        assert!(matches!(
            s.get_frame(),
            Err(CaptureError::NoFrameAvailable)
        ));
    }

    #[test]
    fn truncated_delivery_is_dropped() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        s.start(&config("/dev/mock0")).unwrap();

        // 2x2 at stride 6 needs 12 bytes; a 3-byte buffer is discarded
        backend.deliver_bytes(&[1, 2, 3], 2, 2, 6);
        assert!(matches!(s.get_frame(), Err(CaptureError::NoFrameAvailable)));
        assert!(matches!(
            s.get_thumbnail(),
            Err(CaptureError::NoThumbnailAvailable)
        ));

        // delivery recovers on the next full buffer
        backend.deliver(8, 2, 2);
        assert_eq!(s.get_frame().unwrap().data[0], 8);
    }

    #[test]
    fn thumbnail_available_after_first_frame() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        s.start(&config("/dev/mock0")).unwrap();
        assert!(matches!(
            s.get_thumbnail(),
            Err(CaptureError::NoThumbnailAvailable)
        ));
        backend.deliver(9, 2, 2);
        assert_eq!(s.get_thumbnail().unwrap().data[0], 9);
        // copy-on-read: the cached frame is still there
        assert!(s.get_thumbnail().is_ok());
    }

    #[test]
    fn stop_is_idempotent_and_clears_buffers() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        s.start(&config("/dev/mock0")).unwrap();
        backend.deliver(1, 2, 2);

        s.stop();
        assert!(!s.is_running());
        assert!(matches!(s.get_frame(), Err(CaptureError::NoFrameAvailable)));
        assert!(matches!(
            s.get_thumbnail(),
            Err(CaptureError::NoThumbnailAvailable)
        ));

        // stop from Idle is a no-op success
        s.stop();
        s.stop();
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn restart_after_stop() {
        let backend = MockBackend::default();
        let mut s = session(&backend);
        s.start(&config("/dev/mock0")).unwrap();
        s.stop();
        assert!(s.start(&config("/dev/mock0")).unwrap());
        backend.deliver(5, 2, 2);
        assert_eq!(s.get_frame().unwrap().data[0], 5);
    }
}
