//! Run state machine of a frame tracker.

/// `Idle -> Initializing -> Running -> {Succeeded | Failed | Cancelled}`.
///
/// A finished tracker can be started again, which re-enters `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    /// Never started.
    #[default]
    Idle,
    /// Waiting for the frame source and validating the range.
    Initializing,
    /// Processing the frame range.
    Running,
    Succeeded,
    Failed,
    /// Stopped by an external request.
    Cancelled,
}

impl TrackerState {
    /// Whether the background task owns the tracker configuration.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initializing | Self::Running)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}
