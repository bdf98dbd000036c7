//! Start/finish/fail notification bound to a scope.

use super::bus::EventBus;
use super::types::{ComponentState, TrackerEvent};

/// Publishes a start event on construction and exactly one closing event on drop.
///
/// The closing event is the success event if [`ScopedEvent::set_success`]
/// was called, and the failure event otherwise. Early returns and unwinding
/// therefore always report a failure.
pub struct ScopedEvent<'a> {
    bus: &'a EventBus,
    success_event: TrackerEvent,
    failure_event: TrackerEvent,
    success: bool,
}

impl<'a> ScopedEvent<'a> {
    pub fn new(
        bus: &'a EventBus,
        start_event: TrackerEvent,
        failure_event: TrackerEvent,
        success_event: TrackerEvent,
    ) -> Self {
        bus.publish(&start_event);
        Self {
            bus,
            success_event,
            failure_event,
            success: false,
        }
    }

    /// Close the scope with the success event.
    pub fn set_success(&mut self) {
        self.success = true;
    }

    /// Report the failure path as an external stop instead of an error.
    pub fn set_broke(&mut self) {
        self.failure_event = self.failure_event.with_component_state(ComponentState::Broke);
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl Drop for ScopedEvent<'_> {
    fn drop(&mut self) {
        let event = if self.success {
            &self.success_event
        } else {
            &self.failure_event
        };
        self.bus.publish(event);
    }
}
