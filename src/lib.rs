pub mod capture;
pub mod command;
pub mod error;
pub mod pipeline;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::CaptureError;

/// Service configuration, loadable from an optional TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub capture: CaptureTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address; the port always comes from the command line
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureTuning {
    /// Frame queue depth before drop-oldest eviction kicks in
    pub queue_capacity: usize,
    /// Minimum time between thumbnail cache updates
    pub thumbnail_interval_ms: u64,
    /// How many /dev/videoN nodes to probe during discovery
    pub device_scan_limit: usize,
    /// Memory-mapped capture buffers per stream
    pub buffer_count: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            capture: CaptureTuning::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
        }
    }
}

impl Default for CaptureTuning {
    fn default() -> Self {
        Self {
            queue_capacity: 30,
            thumbnail_interval_ms: 1000,
            device_scan_limit: 10,
            buffer_count: 4,
        }
    }
}

impl Config {
    /// Load configuration, layering an optional TOML file over defaults
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()));
        }
        builder.build()?.try_deserialize()
    }
}

/// Per-start capture configuration, driven by the `start_capture` command.
/// Zero values mean "let the backend choose".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub device_path: String,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u16,
    /// Requested time between frames, in 100-nanosecond ticks
    pub frame_interval: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_a_file() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.capture.queue_capacity, 30);
        assert_eq!(config.capture.thumbnail_interval_ms, 1000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
    }
}
