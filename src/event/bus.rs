//! Decoupled delivery of tracker events to observers.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use super::types::TrackerEvent;

/// Handle returned by [`EventBus::add_callback`], used to remove the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&TrackerEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
    channels: Vec<Sender<TrackerEvent>>,
}

/// Synchronous fan-out of tracker events.
///
/// Events are delivered in the publishing thread. Callbacks run outside the
/// subscriber lock, so a callback may itself publish or (un)subscribe.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Subscribers>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_callback<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TrackerEvent) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.callbacks.push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback; returns false if it was not registered.
    pub fn remove_callback(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.callbacks.len();
        subscribers.callbacks.retain(|(existing, _)| *existing != id);
        subscribers.callbacks.len() != before
    }

    /// Receive all subsequent events through a channel.
    ///
    /// Dropping the receiver ends the subscription.
    pub fn subscribe(&self) -> Receiver<TrackerEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.lock().channels.push(sender);
        receiver
    }

    pub fn publish(&self, event: &TrackerEvent) {
        let callbacks: Vec<Callback> = {
            let mut subscribers = self.subscribers.lock();
            subscribers
                .channels
                .retain(|sender| sender.send(event.clone()).is_ok());
            subscribers
                .callbacks
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect()
        };

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers.callbacks.len() + subscribers.channels.len()
    }
}
