//! Frame source interface consumed by the traversal engine.
//!
//! The source is a read-mostly shared service: it is handed around as
//! `Arc<dyn FrameProvider>` and may serve other clients concurrently. The
//! engine issues at most one synchronous request at a time from its own task
//! plus fire-and-forget prefetch hints.

use std::time::Duration;

use crate::cancel::CancellationFlag;

use super::{FrameRef, FrameType};

/// Magnitude of the prefetch priority hint. The sign carries the traversal
/// direction: positive for increasing indices, negative for decreasing ones.
pub const PREFETCH_PRIORITY: i32 = 9;

/// Random-access source of decoded frames.
///
/// Every blocking call takes the tracker's cancellation flag so that a pending
/// request can return early once a stop was requested.
pub trait FrameProvider: Send + Sync {
    /// Whether the source is ready to answer requests.
    fn is_initialized(&self) -> bool;

    /// Frame type of the sequence, or `None` if unavailable within `timeout`.
    fn synchron_frame_type_request(
        &self,
        timeout: Duration,
        cancel: &CancellationFlag,
    ) -> Option<FrameType>;

    /// Number of frames in the sequence, or `None` if unavailable within `timeout`.
    fn synchron_frame_number_request(
        &self,
        timeout: Duration,
        cancel: &CancellationFlag,
    ) -> Option<u32>;

    /// Frame at `index`, or `None` on timeout, cancellation or a bad index.
    fn synchron_frame_request(
        &self,
        index: u32,
        timeout: Duration,
        cancel: &CancellationFlag,
    ) -> Option<FrameRef>;

    /// Non-blocking hint that `index` will be requested soon.
    fn frame_cache_request(&self, index: u32, priority: i32);
}
