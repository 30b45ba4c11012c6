use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::format::{ChannelLayout, DeviceFormat, SampleType};

/// How long `stop()` keeps polling the native queue for pending buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopDrainPolicy {
    /// Delay between polls, in milliseconds. Zero yields instead of sleeping.
    pub poll_interval_ms: u64,

    /// Give up after this many polls. `None` waits for a complete drain.
    pub max_polls: Option<u32>,
}

impl StopDrainPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for StopDrainPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            max_polls: None,
        }
    }
}

/// Configuration for a device and the backends created for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Channel layout (default: stereo).
    pub channels: ChannelLayout,

    /// Sample storage type (default: signed 16-bit).
    pub sample_type: SampleType,

    /// Frames per chunk (default: 1024).
    pub update_size: u32,

    /// Number of chunks buffered (default: 3, minimum 2).
    pub update_count: u32,

    /// Logical device name to open, or None for the backend's default.
    pub device_name: Option<String>,

    pub stop_drain: StopDrainPolicy,
}

impl DeviceConfig {
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("invalid device config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("failed to serialize config: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.format().validate()
    }

    pub fn format(&self) -> DeviceFormat {
        DeviceFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            sample_type: self.sample_type,
            update_size: self.update_size,
            update_count: self.update_count,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        let format = DeviceFormat::default();
        Self {
            sample_rate: format.sample_rate,
            channels: format.channels,
            sample_type: format.sample_type,
            update_size: format.update_size,
            update_count: format.update_count,
            device_name: None,
            stop_drain: StopDrainPolicy::default(),
        }
    }
}
