//! Bidirectional traversal of a frame range.
//!
//! A component visits the range in two passes that both start at the seed
//! frame: first with increasing indices up to the upper bound, then with
//! decreasing indices down to the lower bound. The seed frame is therefore
//! processed twice unless the seed is the lower bound, in which case the
//! decreasing pass is skipped.
//!
//! Components only supply lifecycle hooks and the per-frame step; the
//! traversal order, prefetch hints, progress reporting and the
//! started/finished/broke notification are provided by [`TrackerComponent::invoke`].

use tracing::debug;

use crate::camera::PinholeCamera;
use crate::cancel::CancellationFlag;
use crate::event::{
    ComponentKind, ComponentState, EventBus, ProgressTracker, ScopedEvent, TrackerEvent, TrackerId,
};
use crate::frame::{FrameProvider, PREFETCH_PRIORITY};

use super::config::FrameTrackerConfig;
use super::range::FrameRange;

/// Outcome of one per-frame step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationResult {
    /// Continue with the next frame.
    Succeeded,
    /// End the current pass early; this is not an error.
    Finished,
    /// Abort the whole traversal.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    Increasing,
    Decreasing,
}

impl TraversalDirection {
    /// Signed priority of the prefetch hint issued in this direction.
    pub fn prefetch_priority(&self) -> i32 {
        match self {
            Self::Increasing => PREFETCH_PRIORITY,
            Self::Decreasing => -PREFETCH_PRIORITY,
        }
    }

    /// The frame visited after `current`, `None` at the end of the pass.
    pub fn next_index(&self, current: u32, range: &FrameRange) -> Option<u32> {
        match self {
            Self::Increasing => (current < range.upper()).then(|| current + 1),
            Self::Decreasing => (current > range.lower()).then(|| current - 1),
        }
    }
}

/// Everything a component may use while it is invoked by a tracker.
pub struct ComponentContext<'a> {
    pub tracker_id: TrackerId,
    pub provider: &'a dyn FrameProvider,
    pub cancel: &'a CancellationFlag,
    pub events: &'a EventBus,
    pub progress: &'a ProgressTracker,
    /// Camera snapshot of the current run.
    pub camera: &'a PinholeCamera,
    pub config: &'a FrameTrackerConfig,
}

impl ComponentContext<'_> {
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn publish(&self, event: &TrackerEvent) {
        self.events.publish(event);
    }

    /// Publish the local progress of a component and the resulting overall
    /// progress of the tracker.
    pub fn report_progress(&self, kind: ComponentKind, ratio: f64) {
        self.events
            .publish(&TrackerEvent::progress(self.tracker_id, kind, ratio));

        if kind != ComponentKind::TrackerProcess {
            let overall = self.progress.report(ratio);
            self.events.publish(&TrackerEvent::progress(
                self.tracker_id,
                ComponentKind::TrackerProcess,
                overall,
            ));
        }
    }
}

/// Events published around one component invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvents {
    pub started: TrackerEvent,
    /// Sent when the invocation fails or is cancelled.
    pub broke: TrackerEvent,
    pub finished: TrackerEvent,
    /// Kind of the progress events sent per frame.
    pub progress_kind: ComponentKind,
}

impl ComponentEvents {
    pub fn new(tracker_id: TrackerId, kind: ComponentKind) -> Self {
        Self {
            started: TrackerEvent::component(tracker_id, kind, ComponentState::Started),
            broke: TrackerEvent::component(tracker_id, kind, ComponentState::Broke),
            finished: TrackerEvent::component(tracker_id, kind, ComponentState::Finished),
            progress_kind: kind,
        }
    }
}

/// A stateful per-frame algorithm driven over a frame range.
///
/// Any hook returning `false` aborts the invocation immediately; later hooks,
/// including [`on_stop`](TrackerComponent::on_stop), are not called.
pub trait TrackerComponent {
    fn on_start(&mut self, _ctx: &ComponentContext<'_>, _range: &FrameRange) -> bool {
        true
    }

    fn on_start_increasing(&mut self, _ctx: &ComponentContext<'_>) -> bool {
        true
    }

    fn on_start_decreasing(&mut self, _ctx: &ComponentContext<'_>) -> bool {
        true
    }

    /// Prepare the data of frame `index` before the per-frame step runs.
    fn on_setup_iteration(&mut self, _ctx: &ComponentContext<'_>, _index: u32) -> bool {
        true
    }

    /// The per-frame step.
    ///
    /// `previous` is the frame visited before `current` in the same pass and
    /// `None` for the first frame of a pass. `iteration` counts steps across
    /// both passes; `total` is the number of steps of a full traversal.
    fn on_frame(
        &mut self,
        ctx: &ComponentContext<'_>,
        previous: Option<u32>,
        current: u32,
        iteration: u32,
        total: u32,
    ) -> IterationResult;

    fn on_stop(&mut self, _ctx: &ComponentContext<'_>, _range: &FrameRange) -> bool {
        true
    }

    /// Traverse `range` and report the outcome.
    ///
    /// Publishes `events.started` right away and exactly one of
    /// `events.finished` or `events.broke` before returning. Returns false if
    /// a hook failed or a stop was requested.
    fn invoke(
        &mut self,
        ctx: &ComponentContext<'_>,
        events: ComponentEvents,
        range: FrameRange,
    ) -> bool {
        let ComponentEvents {
            started,
            broke,
            finished,
            progress_kind,
        } = events;
        let mut scoped_event = ScopedEvent::new(ctx.events, started, broke, finished);

        if !self.on_start(ctx, &range) {
            debug!(tracker = %ctx.tracker_id, "Component start hook failed");
            return false;
        }

        let total = range.total_iterations();
        let mut traversal = Traversal {
            range,
            total,
            iteration: 0,
            progress_kind,
        };

        if !self.on_start_increasing(ctx) {
            debug!(tracker = %ctx.tracker_id, "Increasing pass could not be started");
            return false;
        }
        if traversal.run_pass(self, ctx, TraversalDirection::Increasing) == PassOutcome::Failed {
            return false;
        }

        if !ctx.should_stop() && range.has_decreasing_pass() {
            if !self.on_start_decreasing(ctx) {
                debug!(tracker = %ctx.tracker_id, "Decreasing pass could not be started");
                return false;
            }
            let outcome = traversal.run_pass(self, ctx, TraversalDirection::Decreasing);
            if outcome == PassOutcome::Failed {
                return false;
            }
        }

        if ctx.should_stop() {
            debug!(
                tracker = %ctx.tracker_id,
                iterations = traversal.iteration,
                total,
                "Component stopped by request"
            );
            return false;
        }

        if !self.on_stop(ctx, &range) {
            debug!(tracker = %ctx.tracker_id, "Component stop hook failed");
            return false;
        }

        scoped_event.set_success();
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassOutcome {
    /// Reached the end of the range, was finished early or was cancelled.
    Completed,
    Failed,
}

/// Counters shared by the two passes of one invocation.
struct Traversal {
    range: FrameRange,
    total: u32,
    iteration: u32,
    progress_kind: ComponentKind,
}

impl Traversal {
    fn run_pass<C: TrackerComponent + ?Sized>(
        &mut self,
        component: &mut C,
        ctx: &ComponentContext<'_>,
        direction: TraversalDirection,
    ) -> PassOutcome {
        debug!(
            tracker = %ctx.tracker_id,
            ?direction,
            seed = self.range.initial(),
            "Starting pass"
        );

        let mut previous = None;
        let mut current = Some(self.range.initial());

        while let Some(index) = current {
            if ctx.should_stop() {
                break;
            }

            if !component.on_setup_iteration(ctx, index) {
                debug!(tracker = %ctx.tracker_id, index, "Iteration setup failed");
                return PassOutcome::Failed;
            }

            let next = direction.next_index(index, &self.range);
            if let Some(next) = next {
                ctx.provider
                    .frame_cache_request(next, direction.prefetch_priority());
            }

            let result = component.on_frame(ctx, previous, index, self.iteration, self.total);
            self.iteration += 1;
            previous = Some(index);

            ctx.report_progress(
                self.progress_kind,
                self.iteration as f64 / self.total as f64,
            );

            match result {
                IterationResult::Succeeded => current = next,
                IterationResult::Finished => break,
                IterationResult::Failed => {
                    debug!(tracker = %ctx.tracker_id, index, "Frame step failed");
                    return PassOutcome::Failed;
                }
            }
        }

        PassOutcome::Completed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::{CacheRequest, MemoryFrameProvider};

    /// Owns everything a `ComponentContext` borrows.
    pub(crate) struct Harness {
        pub provider: MemoryFrameProvider,
        pub cancel: CancellationFlag,
        pub events: EventBus,
        pub progress: ProgressTracker,
        pub camera: PinholeCamera,
        pub config: FrameTrackerConfig,
    }

    impl Harness {
        pub fn new(provider: MemoryFrameProvider, camera: PinholeCamera) -> Self {
            Self {
                provider,
                cancel: CancellationFlag::new(),
                events: EventBus::new(),
                progress: ProgressTracker::new(),
                camera,
                config: FrameTrackerConfig::default(),
            }
        }

        pub fn context(&self) -> ComponentContext<'_> {
            ComponentContext {
                tracker_id: TrackerId::new(7),
                provider: &self.provider,
                cancel: &self.cancel,
                events: &self.events,
                progress: &self.progress,
                camera: &self.camera,
                config: &self.config,
            }
        }
    }

    fn harness() -> Harness {
        Harness::new(MemoryFrameProvider::new(Vec::new()), PinholeCamera::default())
    }

    fn events() -> ComponentEvents {
        ComponentEvents::new(TrackerId::new(7), ComponentKind::Tracking)
    }

    fn component_states(
        receiver: &crossbeam_channel::Receiver<TrackerEvent>,
    ) -> Vec<ComponentState> {
        receiver
            .try_iter()
            .filter_map(|event| match event {
                TrackerEvent::Component { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Records every call and answers with scripted results.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Option<u32>, u32, u32, u32)>,
        hooks: Vec<&'static str>,
        /// (call number, result) overrides; all other calls succeed.
        script: Vec<(usize, IterationResult)>,
        cancel_after_call: Option<usize>,
        fail_start: bool,
        fail_setup_at: Option<u32>,
    }

    impl TrackerComponent for Recorder {
        fn on_start(&mut self, _ctx: &ComponentContext<'_>, _range: &FrameRange) -> bool {
            self.hooks.push("start");
            !self.fail_start
        }

        fn on_start_increasing(&mut self, _ctx: &ComponentContext<'_>) -> bool {
            self.hooks.push("increasing");
            true
        }

        fn on_start_decreasing(&mut self, _ctx: &ComponentContext<'_>) -> bool {
            self.hooks.push("decreasing");
            true
        }

        fn on_setup_iteration(&mut self, _ctx: &ComponentContext<'_>, index: u32) -> bool {
            self.fail_setup_at != Some(index)
        }

        fn on_frame(
            &mut self,
            ctx: &ComponentContext<'_>,
            previous: Option<u32>,
            current: u32,
            iteration: u32,
            total: u32,
        ) -> IterationResult {
            self.calls.push((previous, current, iteration, total));
            let call = self.calls.len();
            if self.cancel_after_call == Some(call) {
                ctx.cancel.cancel();
            }
            self.script
                .iter()
                .find(|(n, _)| *n == call)
                .map_or(IterationResult::Succeeded, |(_, result)| *result)
        }

        fn on_stop(&mut self, _ctx: &ComponentContext<'_>, _range: &FrameRange) -> bool {
            self.hooks.push("stop");
            true
        }
    }

    impl Recorder {
        fn pairs(&self) -> Vec<(Option<u32>, u32)> {
            self.calls.iter().map(|(p, c, _, _)| (*p, *c)).collect()
        }
    }

    #[test]
    fn test_traversal_order() {
        let harness = harness();
        let receiver = harness.events.subscribe();
        let mut recorder = Recorder::default();

        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(recorder.invoke(&harness.context(), events(), range));

        assert_eq!(
            recorder.pairs(),
            vec![
                (None, 12),
                (Some(12), 13),
                (Some(13), 14),
                (Some(14), 15),
                (None, 12),
                (Some(12), 11),
                (Some(11), 10),
            ]
        );
        assert!(recorder.calls.iter().all(|(_, _, _, total)| *total == 7));
        assert_eq!(
            recorder.calls.iter().map(|c| c.2).collect::<Vec<_>>(),
            (0..7).collect::<Vec<_>>()
        );
        assert_eq!(recorder.hooks, vec!["start", "increasing", "decreasing", "stop"]);
        assert_eq!(
            component_states(&receiver),
            vec![ComponentState::Started, ComponentState::Finished]
        );
    }

    #[test]
    fn test_prefetch_hints_follow_direction() {
        let harness = harness();
        let mut recorder = Recorder::default();
        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(recorder.invoke(&harness.context(), events(), range));

        let hint = |index, priority| CacheRequest { index, priority };
        assert_eq!(
            harness.provider.cache_requests(),
            vec![hint(13, 9), hint(14, 9), hint(15, 9), hint(11, -9), hint(10, -9)]
        );
    }

    #[test]
    fn test_single_frame_range() {
        let harness = harness();
        let mut recorder = Recorder::default();
        assert!(recorder.invoke(&harness.context(), events(), FrameRange::new(4, 4, 4).unwrap()));

        assert_eq!(recorder.calls, vec![(None, 4, 0, 1)]);
        assert!(!recorder.hooks.contains(&"decreasing"));
        assert!(harness.provider.cache_requests().is_empty());
    }

    #[test]
    fn test_seed_at_lower_bound_skips_decreasing_pass() {
        let harness = harness();
        let mut recorder = Recorder::default();
        assert!(recorder.invoke(&harness.context(), events(), FrameRange::new(0, 0, 3).unwrap()));

        assert_eq!(recorder.calls.len(), 4);
        assert!(recorder.calls.iter().all(|(_, _, _, total)| *total == 4));
        assert!(!recorder.hooks.contains(&"decreasing"));
    }

    #[test]
    fn test_failed_step_aborts_both_passes() {
        let harness = harness();
        let receiver = harness.events.subscribe();
        let mut recorder = Recorder {
            script: vec![(2, IterationResult::Failed)],
            ..Default::default()
        };

        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(!recorder.invoke(&harness.context(), events(), range));

        assert_eq!(recorder.pairs(), vec![(None, 12), (Some(12), 13)]);
        assert!(!recorder.hooks.contains(&"stop"));
        assert!(!recorder.hooks.contains(&"decreasing"));
        assert_eq!(
            component_states(&receiver),
            vec![ComponentState::Started, ComponentState::Broke]
        );
    }

    #[test]
    fn test_finished_ends_only_the_increasing_pass() {
        let harness = harness();
        let mut recorder = Recorder {
            script: vec![(2, IterationResult::Finished)],
            ..Default::default()
        };

        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(recorder.invoke(&harness.context(), events(), range));

        assert_eq!(
            recorder.pairs(),
            vec![(None, 12), (Some(12), 13), (None, 12), (Some(12), 11), (Some(11), 10)]
        );
        assert!(recorder.hooks.contains(&"stop"));
    }

    #[test]
    fn test_progress_is_monotonic_and_complete() {
        let harness = harness();
        let receiver = harness.events.subscribe();
        let mut recorder = Recorder::default();
        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(recorder.invoke(&harness.context(), events(), range));

        let progress: Vec<f64> = receiver
            .try_iter()
            .filter_map(|event| match event {
                TrackerEvent::Progress {
                    kind: ComponentKind::Tracking,
                    progress,
                    ..
                } => Some(progress),
                _ => None,
            })
            .collect();

        assert_eq!(progress.len(), 7);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
        assert_eq!(harness.progress.overall(), 1.0);
    }

    #[test]
    fn test_cancellation_between_steps() {
        let harness = harness();
        let receiver = harness.events.subscribe();
        let mut recorder = Recorder {
            cancel_after_call: Some(2),
            ..Default::default()
        };

        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(!recorder.invoke(&harness.context(), events(), range));

        assert_eq!(recorder.calls.len(), 2);
        assert!(!recorder.hooks.contains(&"decreasing"));
        assert!(!recorder.hooks.contains(&"stop"));
        assert_eq!(
            component_states(&receiver),
            vec![ComponentState::Started, ComponentState::Broke]
        );
    }

    #[test]
    fn test_failed_start_hook_runs_nothing() {
        let harness = harness();
        let receiver = harness.events.subscribe();
        let mut recorder = Recorder {
            fail_start: true,
            ..Default::default()
        };

        assert!(!recorder.invoke(&harness.context(), events(), FrameRange::new(0, 1, 2).unwrap()));
        assert!(recorder.calls.is_empty());
        assert_eq!(recorder.hooks, vec!["start"]);
        assert_eq!(
            component_states(&receiver),
            vec![ComponentState::Started, ComponentState::Broke]
        );
    }

    #[test]
    fn test_failed_setup_aborts_before_step() {
        let harness = harness();
        let mut recorder = Recorder {
            fail_setup_at: Some(11),
            ..Default::default()
        };

        let range = FrameRange::new(10, 12, 15).unwrap();
        assert!(!recorder.invoke(&harness.context(), events(), range));
        assert_eq!(recorder.calls.len(), 5);
        assert_eq!(recorder.calls.last().map(|c| c.1), Some(12));
    }

    #[test]
    fn test_next_index() {
        let range = FrameRange::new(2, 3, 4).unwrap();
        assert_eq!(TraversalDirection::Increasing.next_index(3, &range), Some(4));
        assert_eq!(TraversalDirection::Increasing.next_index(4, &range), None);
        assert_eq!(TraversalDirection::Decreasing.next_index(3, &range), Some(2));
        assert_eq!(TraversalDirection::Decreasing.next_index(2, &range), None);
        assert_eq!(TraversalDirection::Decreasing.prefetch_priority(), -9);
    }
}
