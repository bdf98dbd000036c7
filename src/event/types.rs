//! Tracker event values.
//!
//! Events are immutable once constructed. Every event names the tracker that
//! sent it so observers can multiplex several trackers on one bus.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use nalgebra::Isometry3;

use crate::camera::PinholeCamera;
use crate::tracker::pose::{OfflinePose, OfflinePoses};

/// Process-unique identifier of a tracker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackerId(u32);

static NEXT_TRACKER_ID: AtomicU32 = AtomicU32::new(1);

impl TrackerId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Allocate the next unused id.
    pub fn next() -> Self {
        Self(NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TrackerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which part of a tracker a component or progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// The whole background run of a tracker.
    TrackerProcess,
    /// An analysis pass (e.g. camera field-of-view estimation).
    Analysis,
    /// A tracking pass over the frame range.
    Tracking,
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrackerProcess => "TrackerProcess",
            Self::Analysis => "Analysis",
            Self::Tracking => "Tracking",
        }
    }
}

/// Lifecycle state carried by a component event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    Started,
    Finished,
    Failed,
    /// Stopped by an external request.
    Broke,
}

impl ComponentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "Started",
            Self::Finished => "Finished",
            Self::Failed => "Failed",
            Self::Broke => "Broke",
        }
    }
}

/// State changes reported by a tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    CameraCalibration(PinholeCamera),
    TrackerPose(OfflinePose),
    TrackerPoses(OfflinePoses),
    TrackerTransformation {
        transformation: Isometry3<f64>,
        /// The transformation is a proposal the user may still override.
        suggestion: bool,
    },
}

impl StateEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CameraCalibration(_) => "CameraCalibration",
            Self::TrackerPose(_) => "TrackerPose",
            Self::TrackerPoses(_) => "TrackerPoses",
            Self::TrackerTransformation { .. } => "TrackerTransformation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Component {
        tracker_id: TrackerId,
        kind: ComponentKind,
        state: ComponentState,
    },
    Progress {
        tracker_id: TrackerId,
        kind: ComponentKind,
        /// Progress ratio in [0, 1].
        progress: f64,
    },
    State {
        tracker_id: TrackerId,
        state: StateEvent,
    },
}

impl TrackerEvent {
    pub fn component(tracker_id: TrackerId, kind: ComponentKind, state: ComponentState) -> Self {
        Self::Component {
            tracker_id,
            kind,
            state,
        }
    }

    pub fn progress(tracker_id: TrackerId, kind: ComponentKind, progress: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&progress));
        Self::Progress {
            tracker_id,
            kind,
            progress: progress.clamp(0.0, 1.0),
        }
    }

    pub fn state(tracker_id: TrackerId, state: StateEvent) -> Self {
        Self::State { tracker_id, state }
    }

    pub fn camera_calibration(tracker_id: TrackerId, camera: PinholeCamera) -> Self {
        Self::state(tracker_id, StateEvent::CameraCalibration(camera))
    }

    pub fn tracker_id(&self) -> TrackerId {
        match self {
            Self::Component { tracker_id, .. }
            | Self::Progress { tracker_id, .. }
            | Self::State { tracker_id, .. } => *tracker_id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Component { .. } => "Component",
            Self::Progress { .. } => "Progress",
            Self::State { .. } => "State",
        }
    }

    pub fn subtype_name(&self) -> &'static str {
        match self {
            Self::Component { kind, .. } | Self::Progress { kind, .. } => kind.name(),
            Self::State { state, .. } => state.name(),
        }
    }

    /// State name of a component event, `None` for other events.
    pub fn state_name(&self) -> Option<&'static str> {
        match self {
            Self::Component { state, .. } => Some(state.name()),
            _ => None,
        }
    }

    /// Same event with a different component state; other events are returned unchanged.
    pub fn with_component_state(&self, new_state: ComponentState) -> Self {
        match self {
            Self::Component {
                tracker_id, kind, ..
            } => Self::component(*tracker_id, *kind, new_state),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TrackerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component {
                tracker_id,
                kind,
                state,
            } => write!(f, "tracker {tracker_id}: {} {}", kind.name(), state.name()),
            Self::Progress {
                tracker_id,
                kind,
                progress,
            } => write!(
                f,
                "tracker {tracker_id}: {} progress {:.1}%",
                kind.name(),
                progress * 100.0
            ),
            Self::State { tracker_id, state } => {
                write!(f, "tracker {tracker_id}: {} state", state.name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_ids_are_unique() {
        let a = TrackerId::next();
        let b = TrackerId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_event_names() {
        let id = TrackerId::new(4);
        let event = TrackerEvent::component(id, ComponentKind::Tracking, ComponentState::Broke);
        assert_eq!(event.type_name(), "Component");
        assert_eq!(event.subtype_name(), "Tracking");
        assert_eq!(event.state_name(), Some("Broke"));
        assert_eq!(event.tracker_id(), id);
        assert_eq!(event.to_string(), "tracker 4: Tracking Broke");

        let event = TrackerEvent::camera_calibration(id, PinholeCamera::default());
        assert_eq!(event.subtype_name(), "CameraCalibration");
        assert_eq!(event.state_name(), None);
    }

    #[test]
    fn test_with_component_state() {
        let id = TrackerId::new(1);
        let started = TrackerEvent::component(id, ComponentKind::Analysis, ComponentState::Started);
        let failed = started.with_component_state(ComponentState::Failed);
        assert_eq!(
            failed,
            TrackerEvent::component(id, ComponentKind::Analysis, ComponentState::Failed)
        );

        let progress = TrackerEvent::progress(id, ComponentKind::Analysis, 0.5);
        assert_eq!(progress.with_component_state(ComponentState::Failed), progress);
    }
}
