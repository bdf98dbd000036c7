//! Offline tracker engine: range traversal, frame buffering and the host thread.
//!
//! - `component`: the bidirectional traversal of a frame range
//! - `buffers`: double-buffered frames and frame pyramids for components
//! - `frame_tracker`: background run, configuration and final outcome
//! - `range`, `pose`, `state`, `config`: the data the host owns

pub mod buffers;
pub mod component;
pub mod config;
mod frame_tracker;
pub mod pose;
pub mod range;
pub mod state;

pub use buffers::{
    BufferPair, BufferedComponent, FrameBuffers, FramePyramidTrackerComponent, FrameStep,
    FrameTrackerComponent, IterationBuffers, PyramidBuffers,
};
pub use component::{
    ComponentContext, ComponentEvents, IterationResult, TrackerComponent, TraversalDirection,
};
pub use config::FrameTrackerConfig;
pub use frame_tracker::{FrameTracker, FrameTracking, TrackingSession};
pub use pose::{OfflinePose, OfflinePoses};
pub use range::FrameRange;
pub use state::TrackerState;
