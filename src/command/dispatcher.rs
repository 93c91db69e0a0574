//! Synchronous command dispatch
//!
//! One envelope in, exactly one response out, until `exit`. Benign
//! conditions (no frame yet, already running) become response flags;
//! nothing a client sends can terminate the loop except `exit`.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::capture::backend::CaptureBackend;
use crate::capture::{catalog, CaptureSession};
use crate::command::protocol::{
    DeviceMessage, DeviceQueryPayload, Envelope, FrameHeader, Response, ResultMessage,
    StartCapturePayload,
};
use crate::error::CaptureError;
use crate::pipeline::{BoundedFrameQueue, ThumbnailCache};
use crate::CaptureTuning;

/// Outcome of one dispatched command
pub struct Dispatched {
    pub response: Response,
    /// True after `exit`: the loop must terminate
    pub exit: bool,
}

impl Dispatched {
    fn reply(response: Response) -> Self {
        Self {
            response,
            exit: false,
        }
    }
}

/// Routes command envelopes to the capture session and capability catalog.
pub struct CommandDispatcher<B: CaptureBackend> {
    backend: Arc<B>,
    session: CaptureSession<B>,
}

impl<B: CaptureBackend> CommandDispatcher<B> {
    pub fn new(backend: Arc<B>, tuning: &CaptureTuning) -> Self {
        let queue = Arc::new(BoundedFrameQueue::new(tuning.queue_capacity));
        let thumbnails = Arc::new(ThumbnailCache::new(chrono::Duration::milliseconds(
            tuning.thumbnail_interval_ms as i64,
        )));
        let session = CaptureSession::new(Arc::clone(&backend), queue, thumbnails);
        Self { backend, session }
    }

    /// Process one textual command envelope.
    ///
    /// Undecodable envelopes are answered with the ping acknowledgement
    /// rather than an error, preserving availability for the next command.
    pub fn handle(&mut self, raw: &str) -> Dispatched {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "undecodable command envelope");
                return Dispatched::reply(Response::Pong);
            }
        };

        debug!(message_id = %envelope.message_id, "dispatching command");
        match envelope.message_id.as_str() {
            "start_capture" => Dispatched::reply(self.start_capture(envelope.json_string)),
            "stop_capture" => {
                self.session.stop();
                Dispatched::reply(Response::Empty)
            }
            "get_capture_devices" => Dispatched::reply(self.capture_devices()),
            "get_video_infos" => Dispatched::reply(self.video_infos(envelope.json_string)),
            "get_frame" => Dispatched::reply(self.frame_response()),
            "thumbnail" => Dispatched::reply(self.thumbnail_response()),
            "exit" => {
                info!("exit requested, shutting down");
                self.session.stop();
                Dispatched {
                    response: Response::Empty,
                    exit: true,
                }
            }
            other => {
                debug!(message_id = %other, "unrecognized command, answering ping");
                Dispatched::reply(Response::Pong)
            }
        }
    }

    fn start_capture(&mut self, payload: Option<String>) -> Response {
        let result = match decode_payload::<StartCapturePayload>(payload) {
            Ok(payload) => {
                let config = payload.into_config();
                match self.session.start(&config) {
                    Ok(started) => started,
                    Err(e) => {
                        error!(error = %e, "start_capture failed");
                        false
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "invalid start_capture payload");
                false
            }
        };
        json_response(&ResultMessage { result })
    }

    fn capture_devices(&self) -> Response {
        let devices = match self.backend.enumerate_devices() {
            Ok(devices) => devices,
            Err(e) => {
                error!(error = %e, "device enumeration failed");
                Vec::new()
            }
        };
        let messages: Vec<DeviceMessage> = devices
            .into_iter()
            .map(|d| DeviceMessage {
                name: d.name,
                device_path: d.device_path,
            })
            .collect();
        json_response(&messages)
    }

    fn video_infos(&self, payload: Option<String>) -> Response {
        let rows: Vec<[u64; 4]> = match decode_payload::<DeviceQueryPayload>(payload) {
            Ok(query) => match catalog::list_capabilities(self.backend.as_ref(), &query.device_path)
            {
                Ok(caps) => caps.iter().map(|c| c.as_row()).collect(),
                Err(CaptureError::DeviceNotFound { device_path }) => {
                    warn!(device = %device_path, "video infos requested for unknown device");
                    Vec::new()
                }
                Err(e) => {
                    error!(error = %e, "capability query failed");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "invalid get_video_infos payload");
                Vec::new()
            }
        };
        json_response(&rows)
    }

    fn frame_response(&mut self) -> Response {
        match self.session.get_frame() {
            Ok(frame) => {
                let header = FrameHeader::success(frame.timestamp_micros(), &frame);
                Response::FramePayload {
                    header: serde_json::to_string(&header).unwrap_or_default(),
                    pixels: frame.data,
                }
            }
            Err(CaptureError::NoFrameAvailable) => json_response(&FrameHeader::failure()),
            Err(e) => {
                error!(error = %e, "get_frame failed");
                json_response(&FrameHeader::failure())
            }
        }
    }

    fn thumbnail_response(&self) -> Response {
        match self.session.get_thumbnail() {
            Ok(frame) => {
                let header = FrameHeader::success(frame.timestamp_millis(), &frame);
                Response::FramePayload {
                    header: serde_json::to_string(&header).unwrap_or_default(),
                    pixels: frame.data,
                }
            }
            Err(CaptureError::NoThumbnailAvailable) => json_response(&FrameHeader::failure()),
            Err(e) => {
                error!(error = %e, "thumbnail fetch failed");
                json_response(&FrameHeader::failure())
            }
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    payload: Option<String>,
) -> Result<T, CaptureError> {
    let raw = payload.ok_or_else(|| CaptureError::Validation {
        message: "missing JsonString payload".into(),
    })?;
    serde_json::from_str(&raw).map_err(|e| CaptureError::Validation {
        message: e.to_string(),
    })
}

fn json_response<T: serde::Serialize>(body: &T) -> Response {
    Response::Json(serde_json::to_string(body).unwrap_or_default())
}
