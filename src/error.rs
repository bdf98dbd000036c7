//! Typed configuration errors.
//!
//! Setters on [`FrameTracker`](crate::tracker::FrameTracker) reject invalid
//! input or mutation while a run is active with one of these variants and leave
//! the tracker untouched. Failures of the background run itself are not errors
//! of this kind; they end up in the final [`TrackerState`](crate::tracker::TrackerState).

/// Errors reported synchronously by the tracker configuration setters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("tracker is running; configuration cannot change until it stops")]
    AlreadyRunning,

    #[error("a frame provider has already been set")]
    FrameProviderAlreadySet,

    #[error("no frame provider has been set")]
    NoFrameProvider,

    #[error("invalid frame range: lower {lower} > upper {upper}")]
    InvalidFrameRange { lower: u32, upper: u32 },

    #[error("initial frame {initial} lies outside [{lower}, {upper}]")]
    InitialFrameOutOfRange { lower: u32, initial: u32, upper: u32 },

    #[error("frame range [{lower}, {upper}] is too large to be traversed")]
    FrameRangeTooLarge { lower: u32, upper: u32 },
}
