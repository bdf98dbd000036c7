//! Cooperative cancellation shared between the background run and the frame source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable stop request flag.
///
/// One flag is created per tracker. The background task checks it at every
/// loop boundary and hands it by reference into each blocking frame-source
/// call, so a pending fetch can return early instead of running into its
/// timeout. Cancellation is never preemptive.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    requested: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that all holders of this flag stop at their next check.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Check if a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Clear the request before a new run starts.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}
