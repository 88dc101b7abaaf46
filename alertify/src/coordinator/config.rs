//! Coordinator configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Track played when an alert carries no track reference
pub const DEFAULT_TRACK: &str = "spotify:track:2xYlyywNgefLCRDG8hlxZq";

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Track played for alerts without a payload
    #[serde(rename = "default-track", default = "default_track")]
    pub default_track: String,

    /// Capacity of the command channel
    ///
    /// 1 keeps producers in lock-step with the dispatcher.
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_track() -> String {
    debug!("default_track: called");
    DEFAULT_TRACK.to_string()
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            default_track: DEFAULT_TRACK.to_string(),
            channel_buffer: 1,
        }
    }
}

impl CoordinatorConfig {
    /// Config with a specific default track
    pub fn with_default_track(default_track: impl Into<String>) -> Self {
        Self {
            default_track: default_track.into(),
            ..Default::default()
        }
    }
}
