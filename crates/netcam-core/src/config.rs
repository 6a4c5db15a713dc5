use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bus::TimerSettings;
use crate::envelope::{PeerId, PAYLOAD_CAPACITY};
use crate::telemetry::Fix;

/// Default heartbeat scaling constant.
///
/// Requested frames per heartbeat = frame rate × interval (ms) / scale. The
/// value is empirical: it makes each heartbeat ask for slightly more frames
/// than one cycle needs so the source never idles between heartbeats.
pub const HEARTBEAT_SCALE: f64 = 825.0;

/// Default sink reassembly buffer (largest accepted JPEG frame).
pub const MAX_IMAGE_SIZE: usize = 65_536 * 4;

// MARK: - NetcamConfig

/// Whole-process configuration, loaded from a JSON file.
///
/// Both snake_case and camelCase keys are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetcamConfig {
    /// Local UDP address to bind.
    pub bind: String,
    /// Address used for destination 0 and for peers without a route.
    pub hub: Option<String>,
    /// Static routes: peer id → UDP address.
    pub peers: BTreeMap<PeerId, String>,
    #[serde(alias = "queueDepth")]
    pub queue_depth: usize,
    #[serde(alias = "payloadCapacity")]
    pub payload_capacity: usize,
    pub source: SourceConfig,
    pub sink: SinkConfig,
}

impl Default for NetcamConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9090".to_owned(),
            hub: None,
            peers: BTreeMap::new(),
            queue_depth: 512,
            payload_capacity: PAYLOAD_CAPACITY,
            source: SourceConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

// MARK: - SourceConfig

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    #[serde(alias = "jpegQuality")]
    pub jpeg_quality: u32,
    /// Read location fixes and piggyback them on acknowledgements.
    pub gps: bool,
    /// Forward pan/tilt requests to the gimbal.
    pub servo: bool,
    pub width: u32,
    pub height: u32,
    /// Fixed location reported by the built-in telemetry reader.
    pub location: Option<Fix>,
    pub timer: TimerSettings,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 60,
            gps: false,
            servo: false,
            width: 640,
            height: 480,
            location: None,
            timer: TimerSettings::new(100, 100),
        }
    }
}

impl SourceConfig {
    /// JPEG quality clamped to 0..=100.
    pub fn quality(&self) -> u8 {
        self.jpeg_quality.min(100) as u8
    }
}

// MARK: - SinkConfig

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    #[serde(alias = "heartbeatScale")]
    pub heartbeat_scale: f64,
    #[serde(alias = "bufferCapacity")]
    pub buffer_capacity: usize,
    pub timer: TimerSettings,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            heartbeat_scale: HEARTBEAT_SCALE,
            buffer_capacity: MAX_IMAGE_SIZE,
            timer: TimerSettings::new(0, 1_000),
        }
    }
}
