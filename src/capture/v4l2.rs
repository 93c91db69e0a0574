//! V4L2 capture backend
//!
//! Device discovery probes `/dev/video0..N`; frame delivery runs on a
//! dedicated thread that owns the device and its memory-mapped stream.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::frameinterval::FrameIntervalEnum;
use v4l::framesize::FrameSizeEnum;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::backend::{CaptureBackend, DeviceInfo, FrameSink, RawFormat, RawFrame};
use crate::error::CaptureError;
use crate::{CaptureConfig, CaptureTuning};

/// 100ns ticks per second, the unit of `frame_interval`
const TICKS_PER_SEC: u64 = 10_000_000;

pub struct V4l2Backend {
    device_scan_limit: usize,
    buffer_count: u32,
}

/// A running V4L2 capture: stop flag plus the delivery thread
pub struct V4l2Handle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl V4l2Backend {
    pub fn new(tuning: &CaptureTuning) -> Self {
        Self {
            device_scan_limit: tuning.device_scan_limit,
            buffer_count: tuning.buffer_count,
        }
    }

    fn open(&self, device_path: &str) -> Result<Device, CaptureError> {
        if !Path::new(device_path).exists() {
            return Err(CaptureError::DeviceNotFound {
                device_path: device_path.to_string(),
            });
        }
        Device::with_path(device_path).map_err(|e| {
            warn!(device = %device_path, error = %e, "failed to open device");
            CaptureError::DeviceNotFound {
                device_path: device_path.to_string(),
            }
        })
    }
}

/// Bits per pixel for the uncompressed formats we can deliver.
/// Compressed or unknown formats report zero and are filtered out at
/// catalog level.
fn bit_depth(fourcc: FourCC) -> u16 {
    match &fourcc.repr {
        b"RGB3" | b"BGR3" => 24,
        b"YUYV" | b"UYVY" | b"YVYU" => 16,
        b"GREY" => 8,
        _ => 0,
    }
}

fn interval_ticks(numerator: u32, denominator: u32) -> u64 {
    if denominator == 0 {
        return 0;
    }
    numerator as u64 * TICKS_PER_SEC / denominator as u64
}

impl CaptureBackend for V4l2Backend {
    type Handle = V4l2Handle;

    fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let mut devices = Vec::new();
        for i in 0..self.device_scan_limit {
            let path = format!("/dev/video{}", i);
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
                debug!(device = %path, card = %caps.card, "found capture device");
                devices.push(DeviceInfo {
                    name: caps.card.clone(),
                    device_path: path,
                });
            }
        }
        Ok(devices)
    }

    fn stream_capabilities(&self, device_path: &str) -> Result<Vec<RawFormat>, CaptureError> {
        let dev = self.open(device_path)?;

        let query_failed = |e: std::io::Error| CaptureError::CapabilityQueryFailed {
            reason: e.to_string(),
        };

        let mut formats = Vec::new();
        for desc in dev.enum_formats().map_err(query_failed)? {
            let depth = bit_depth(desc.fourcc);
            for size in dev.enum_framesizes(desc.fourcc).map_err(query_failed)? {
                let FrameSizeEnum::Discrete(discrete) = size.size else {
                    // Stepwise ranges have no single tuple to report
                    continue;
                };
                let intervals = dev
                    .enum_frameintervals(desc.fourcc, discrete.width, discrete.height)
                    .map_err(query_failed)?;
                for fi in intervals {
                    let FrameIntervalEnum::Discrete(fraction) = fi.interval else {
                        continue;
                    };
                    formats.push(RawFormat {
                        width: discrete.width,
                        height: discrete.height,
                        bit_depth: depth,
                        frame_interval: interval_ticks(fraction.numerator, fraction.denominator),
                    });
                }
            }
        }
        Ok(formats)
    }

    fn open_and_start(
        &self,
        config: &CaptureConfig,
        sink: FrameSink,
    ) -> Result<V4l2Handle, CaptureError> {
        let device = self.open(&config.device_path)?;

        let caps = device
            .query_caps()
            .map_err(|e| CaptureError::backend(format!("query_caps: {e}")))?;
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::backend(format!(
                "{} does not support video capture",
                config.device_path
            )));
        }

        // Negotiate packed 24-bit BGR, applying non-zero overrides
        let mut fmt = device
            .format()
            .map_err(|e| CaptureError::backend(format!("get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"BGR3");
        if config.width > 0 {
            fmt.width = config.width;
        }
        if config.height > 0 {
            fmt.height = config.height;
        }
        let fmt = device
            .set_format(&fmt)
            .map_err(|e| CaptureError::backend(format!("set format: {e}")))?;
        if fmt.fourcc != FourCC::new(b"BGR3") {
            return Err(CaptureError::backend(format!(
                "device refused BGR3, offered {}",
                fmt.fourcc
            )));
        }
        if config.bit_depth > 0 && config.bit_depth != 24 {
            warn!(
                requested = config.bit_depth,
                "bit depth override ignored, BGR3 is always 24-bit"
            );
        }

        // Frame rate override is best-effort; not every driver honors it
        if config.frame_interval > 0 {
            let fps = (TICKS_PER_SEC / config.frame_interval).max(1) as u32;
            if let Err(e) = device.set_params(&v4l::video::capture::Parameters::with_fps(fps)) {
                warn!(fps, error = %e, "failed to apply frame rate override");
            }
        }

        info!(
            device = %config.device_path,
            card = %caps.card,
            width = fmt.width,
            height = fmt.height,
            "starting capture stream"
        );

        let width = fmt.width;
        let height = fmt.height;
        let stride = if fmt.stride > 0 {
            fmt.stride
        } else {
            fmt.width * 3
        };
        // Smallest buffer that covers every row at this geometry
        let min_len = (height.saturating_sub(1) * stride + width * 3) as usize;

        // The device and its mmap stream live on the delivery thread;
        // stream setup errors come back through the init channel so start
        // failures surface synchronously.
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let buffer_count = self.buffer_count;
        let (init_tx, init_rx) = mpsc::sync_channel::<Result<(), std::io::Error>>(1);

        let join = std::thread::Builder::new()
            .name("iris-capture".into())
            .spawn(move || {
                let mut stream =
                    match MmapStream::with_buffers(&device, Type::VideoCapture, buffer_count) {
                        Ok(stream) => {
                            let _ = init_tx.send(Ok(()));
                            stream
                        }
                        Err(e) => {
                            let _ = init_tx.send(Err(e));
                            return;
                        }
                    };

                while !thread_stop.load(Ordering::Acquire) {
                    match stream.next() {
                        Ok((buf, _meta)) => {
                            // Drivers can dequeue truncated buffers
                            if buf.len() < min_len {
                                warn!(len = buf.len(), expected = min_len, "short frame buffer, skipping");
                                continue;
                            }
                            sink(RawFrame {
                                data: buf,
                                width,
                                height,
                                stride,
                                bottom_up: false,
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "frame dequeue failed");
                            std::thread::sleep(Duration::from_millis(10));
                        }
                    }
                }
                debug!("capture thread exiting");
            })
            .map_err(|e| CaptureError::backend(format!("spawn capture thread: {e}")))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(V4l2Handle { stop, join }),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(CaptureError::backend(format!("stream setup: {e}")))
            }
            Err(_) => {
                let _ = join.join();
                Err(CaptureError::backend("capture thread died during setup"))
            }
        }
    }

    fn stop(&self, handle: V4l2Handle) {
        handle.stop.store(true, Ordering::Release);
        if handle.join.join().is_err() {
            warn!("capture thread panicked during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_depth_for_known_formats() {
        assert_eq!(bit_depth(FourCC::new(b"BGR3")), 24);
        assert_eq!(bit_depth(FourCC::new(b"YUYV")), 16);
        assert_eq!(bit_depth(FourCC::new(b"GREY")), 8);
        // compressed formats have no fixed depth
        assert_eq!(bit_depth(FourCC::new(b"MJPG")), 0);
    }

    #[test]
    fn interval_conversion_to_ticks() {
        // 30 fps = 1/30 s = 333_333 ticks
        assert_eq!(interval_ticks(1, 30), 333_333);
        assert_eq!(interval_ticks(1, 60), 166_666);
        assert_eq!(interval_ticks(1, 0), 0);
    }
}
