//! Tracker events, their delivery and the scoped notification helpers.

pub mod bus;
pub mod progress;
pub mod scoped;
pub mod types;

pub use bus::{EventBus, SubscriptionId};
pub use progress::{ProgressTracker, ScopedProgressLayer};
pub use scoped::ScopedEvent;
pub use types::{ComponentKind, ComponentState, StateEvent, TrackerEvent, TrackerId};
