//! Offline tracking engine.
//!
//! Applies a stateful per-frame algorithm across a bounded, randomly seekable
//! frame sequence in both temporal directions, on a background thread that
//! reports progress and can be stopped at any time.

pub mod camera;
pub mod cancel;
pub mod error;
pub mod event;
pub mod frame;
pub mod tracker;

pub use camera::{CameraConfiguration, PinholeCamera};
pub use cancel::CancellationFlag;
pub use error::ConfigError;
pub use event::{ComponentKind, ComponentState, EventBus, StateEvent, TrackerEvent, TrackerId};
pub use frame::{FrameProvider, FrameRef, FrameType, MemoryFrameProvider};
pub use tracker::{
    FrameRange, FrameTracker, FrameTracking, IterationResult, TrackerComponent, TrackerState,
    TrackingSession,
};
