//! Wire protocol types
//!
//! JSON with PascalCase keys, preserved from the original service so
//! existing clients keep working. The payload travels as a nested JSON
//! document inside `JsonString`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::capture::Frame;
use crate::CaptureConfig;

/// Fixed acknowledgement for unrecognized or undecodable commands
pub const PONG: &str = "PONG";

/// One inbound command: `{"MessageId": "...", "JsonString": "..."}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    pub message_id: String,
    #[serde(default)]
    pub json_string: Option<String>,
}

/// `start_capture` payload. Zero values mean "let the backend choose".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartCapturePayload {
    pub device_path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub bitrate: u16,
    #[serde(default)]
    pub avg_time_per_frame: u64,
}

impl StartCapturePayload {
    pub fn into_config(self) -> CaptureConfig {
        CaptureConfig {
            device_path: self.device_path,
            width: self.width,
            height: self.height,
            bit_depth: self.bitrate,
            frame_interval: self.avg_time_per_frame,
        }
    }
}

/// `get_video_infos` payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceQueryPayload {
    pub device_path: String,
    #[serde(default)]
    pub name: String,
}

/// `start_capture` response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultMessage {
    pub result: bool,
}

/// One entry of the `get_capture_devices` response
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceMessage {
    pub name: String,
    pub device_path: String,
}

/// Header segment of `get_frame`/`thumbnail` responses. On failure only
/// `Result` is populated; the other fields serialize as null.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FrameHeader {
    pub result: bool,
    pub timestamp: Option<String>,
    pub data_type: Option<&'static str>,
    pub shape: Option<[u32; 3]>,
}

impl FrameHeader {
    pub fn success(timestamp: String, frame: &Frame) -> Self {
        Self {
            result: true,
            timestamp: Some(timestamp),
            data_type: Some("uint8"),
            shape: Some(frame.shape()),
        }
    }

    pub fn failure() -> Self {
        Self {
            result: false,
            timestamp: None,
            data_type: None,
            shape: None,
        }
    }
}

/// What the dispatcher hands back to the transport for one command
#[derive(Debug)]
pub enum Response {
    /// Single JSON frame
    Json(String),
    /// Zero-length acknowledgement frame
    Empty,
    /// Fixed keep-alive token
    Pong,
    /// Header frame followed by the raw pixel frame
    FramePayload { header: String, pixels: Bytes },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_pascal_case() {
        let env: Envelope =
            serde_json::from_str(r#"{"MessageId":"get_frame","JsonString":null}"#).unwrap();
        assert_eq!(env.message_id, "get_frame");
        assert!(env.json_string.is_none());
    }

    #[test]
    fn start_payload_zero_defaults() {
        let p: StartCapturePayload =
            serde_json::from_str(r#"{"DevicePath":"/dev/video0"}"#).unwrap();
        let cfg = p.into_config();
        assert_eq!(cfg.device_path, "/dev/video0");
        assert_eq!(cfg.width, 0);
        assert_eq!(cfg.frame_interval, 0);
    }

    #[test]
    fn failure_header_nulls_everything_but_result() {
        let json = serde_json::to_string(&FrameHeader::failure()).unwrap();
        assert_eq!(
            json,
            r#"{"Result":false,"Timestamp":null,"DataType":null,"Shape":null}"#
        );
    }
}
