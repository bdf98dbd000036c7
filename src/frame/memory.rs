//! In-memory frame source.
//!
//! Serves a fixed vector of frames. Readiness can be delayed and every
//! synchronous request can be given an artificial latency; both honor the
//! request timeout and the cancellation flag exactly like a decoding source
//! would. All requests are recorded so callers can inspect the access pattern.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cancel::CancellationFlag;

use super::provider::FrameProvider;
use super::{FrameRef, FrameType};

/// Granularity of the wait loops.
const WAIT_STEP: Duration = Duration::from_millis(1);

/// A recorded prefetch hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheRequest {
    pub index: u32,
    pub priority: i32,
}

pub struct MemoryFrameProvider {
    frames: Vec<FrameRef>,

    /// Point in time from which the source reports ready; `None` never.
    ready_at: Option<Instant>,

    /// Simulated decode time of one synchronous frame request.
    latency: Duration,

    frame_requests: Mutex<Vec<u32>>,
    cache_requests: Mutex<Vec<CacheRequest>>,
}

impl MemoryFrameProvider {
    pub fn new(frames: Vec<FrameRef>) -> Self {
        Self {
            frames,
            ready_at: Some(Instant::now()),
            latency: Duration::ZERO,
            frame_requests: Mutex::new(Vec::new()),
            cache_requests: Mutex::new(Vec::new()),
        }
    }

    /// Report ready only after `delay` has passed.
    pub fn with_initialization_delay(mut self, delay: Duration) -> Self {
        self.ready_at = Instant::now().checked_add(delay);
        self
    }

    /// A source that never becomes ready.
    pub fn never_initialized(mut self) -> Self {
        self.ready_at = None;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Indices of all synchronous frame requests, in order.
    pub fn frame_requests(&self) -> Vec<u32> {
        self.frame_requests.lock().clone()
    }

    /// All prefetch hints, in order.
    pub fn cache_requests(&self) -> Vec<CacheRequest> {
        self.cache_requests.lock().clone()
    }

    /// Block until the source is ready; false on timeout or cancellation.
    fn wait_ready(&self, timeout: Duration, cancel: &CancellationFlag) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if self.is_initialized() {
                return true;
            }
            let timed_out = deadline.is_some_and(|deadline| Instant::now() >= deadline);
            if cancel.is_cancelled() || timed_out {
                return false;
            }
            thread::sleep(WAIT_STEP);
        }
    }

    /// Spend the simulated latency; false if the timeout or a stop request hits first.
    fn simulate_latency(&self, timeout: Duration, cancel: &CancellationFlag) -> bool {
        if self.latency.is_zero() {
            return !cancel.is_cancelled();
        }

        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.latency {
                return true;
            }
            if elapsed >= timeout {
                return false;
            }
            thread::sleep(WAIT_STEP);
        }
    }
}

impl FrameProvider for MemoryFrameProvider {
    fn is_initialized(&self) -> bool {
        self.ready_at.is_some_and(|ready_at| Instant::now() >= ready_at)
    }

    fn synchron_frame_type_request(
        &self,
        timeout: Duration,
        cancel: &CancellationFlag,
    ) -> Option<FrameType> {
        if !self.wait_ready(timeout, cancel) {
            return None;
        }
        self.frames.first().map(|frame| FrameType::of(frame))
    }

    fn synchron_frame_number_request(
        &self,
        timeout: Duration,
        cancel: &CancellationFlag,
    ) -> Option<u32> {
        if !self.wait_ready(timeout, cancel) {
            return None;
        }
        u32::try_from(self.frames.len()).ok()
    }

    fn synchron_frame_request(
        &self,
        index: u32,
        timeout: Duration,
        cancel: &CancellationFlag,
    ) -> Option<FrameRef> {
        self.frame_requests.lock().push(index);

        if !self.wait_ready(timeout, cancel) || !self.simulate_latency(timeout, cancel) {
            return None;
        }
        self.frames.get(index as usize).cloned()
    }

    fn frame_cache_request(&self, index: u32, priority: i32) {
        self.cache_requests.lock().push(CacheRequest { index, priority });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage};
    use std::sync::Arc;

    fn frames(count: usize) -> Vec<FrameRef> {
        (0..count)
            .map(|i| {
                let image = GrayImage::from_pixel(8, 6, image::Luma([i as u8]));
                Arc::new(DynamicImage::ImageLuma8(image))
            })
            .collect()
    }

    #[test]
    fn test_serves_frames_and_records_requests() {
        let provider = MemoryFrameProvider::new(frames(3));
        let cancel = CancellationFlag::new();
        let timeout = Duration::from_secs(1);

        assert!(provider.is_initialized());
        assert_eq!(provider.synchron_frame_number_request(timeout, &cancel), Some(3));
        let frame_type = provider.synchron_frame_type_request(timeout, &cancel).unwrap();
        assert_eq!((frame_type.width, frame_type.height), (8, 6));

        let frame = provider.synchron_frame_request(2, timeout, &cancel).unwrap();
        assert_eq!(frame.to_luma8().get_pixel(0, 0)[0], 2);
        assert!(provider.synchron_frame_request(3, timeout, &cancel).is_none());

        provider.frame_cache_request(1, -9);
        assert_eq!(provider.frame_requests(), vec![2, 3]);
        assert_eq!(provider.cache_requests(), vec![CacheRequest { index: 1, priority: -9 }]);
    }

    #[test]
    fn test_never_initialized_times_out() {
        let provider = MemoryFrameProvider::new(frames(1)).never_initialized();
        let cancel = CancellationFlag::new();

        assert!(!provider.is_initialized());
        let started = Instant::now();
        assert!(provider
            .synchron_frame_number_request(Duration::from_millis(20), &cancel)
            .is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancellation_interrupts_pending_request() {
        let provider =
            Arc::new(MemoryFrameProvider::new(frames(1)).with_latency(Duration::from_secs(30)));
        let cancel = CancellationFlag::new();

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let frame = provider.synchron_frame_request(0, Duration::from_secs(30), &cancel);
        canceller.join().unwrap();

        assert!(frame.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_latency_longer_than_timeout_fails() {
        let provider = MemoryFrameProvider::new(frames(1)).with_latency(Duration::from_millis(200));
        let cancel = CancellationFlag::new();
        assert!(provider
            .synchron_frame_request(0, Duration::from_millis(10), &cancel)
            .is_none());
        assert!(provider
            .synchron_frame_request(0, Duration::from_secs(2), &cancel)
            .is_some());
    }
}
