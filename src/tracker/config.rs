//! Timing and default-camera configuration of a frame tracker.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the background run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTrackerConfig {
    /// Sleep between two readiness checks of the frame source.
    pub initialization_poll_interval_ms: u64,

    /// Timeout of the frame type request during initialization.
    pub frame_type_timeout_s: f64,

    /// Timeout of the frame count request during initialization.
    pub frame_number_timeout_s: f64,

    /// Timeout of each synchronous frame request while traversing.
    pub frame_request_timeout_s: f64,

    /// Horizontal field of view (degrees) of the camera created when no
    /// valid camera profile was configured.
    pub default_fov_x_deg: f64,
}

impl Default for FrameTrackerConfig {
    fn default() -> Self {
        Self {
            initialization_poll_interval_ms: 1,
            frame_type_timeout_s: 1.0,
            frame_number_timeout_s: 1.0,
            frame_request_timeout_s: 10.0,
            default_fov_x_deg: 65.0,
        }
    }
}

impl FrameTrackerConfig {
    pub fn initialization_poll_interval(&self) -> Duration {
        Duration::from_millis(self.initialization_poll_interval_ms)
    }

    pub fn frame_type_timeout(&self) -> Duration {
        seconds(self.frame_type_timeout_s)
    }

    pub fn frame_number_timeout(&self) -> Duration {
        seconds(self.frame_number_timeout_s)
    }

    pub fn frame_request_timeout(&self) -> Duration {
        seconds(self.frame_request_timeout_s)
    }

    pub fn default_fov_x(&self) -> f64 {
        self.default_fov_x_deg.to_radians()
    }
}

/// Negative or non-finite values turn into a zero timeout.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}
