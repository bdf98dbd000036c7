//! Host of an offline tracking run.
//!
//! A `FrameTracker` stores the frame source, the frame range and the camera
//! profile, and runs a [`FrameTracking`] algorithm over the range on a
//! dedicated background thread. The whole run is wrapped in a
//! `TrackerProcess` started/finished/failed notification; a run stopped by
//! request reports `Broke` instead of `Failed`.
//!
//! Configuration is rejected while a run is active. Only the camera may be
//! changed during a run, through [`FrameTracker::update_camera`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};
use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::camera::{CameraConfiguration, PinholeCamera};
use crate::cancel::CancellationFlag;
use crate::error::ConfigError;
use crate::event::{
    ComponentKind, ComponentState, EventBus, ProgressTracker, ScopedEvent, ScopedProgressLayer,
    StateEvent, TrackerEvent, TrackerId,
};
use crate::frame::{FrameProvider, FrameType};

use super::component::{ComponentContext, ComponentEvents, TrackerComponent};
use super::config::FrameTrackerConfig;
use super::pose::OfflinePoses;
use super::range::FrameRange;
use super::state::TrackerState;

/// The range-specific algorithm run by a [`FrameTracker`].
///
/// Implementations usually drive one or more tracker components over the
/// session's range and store their results in the session's poses.
pub trait FrameTracking: Send + 'static {
    /// Process the whole range; false if the run failed or was stopped.
    fn apply_frame_tracking(&mut self, session: &mut TrackingSession<'_>) -> bool;
}

#[derive(Default)]
struct Settings {
    state: TrackerState,
    provider: Option<Arc<dyn FrameProvider>>,
    /// `None` until configured; the run then covers the whole sequence.
    range: Option<FrameRange>,
    poses: OfflinePoses,
}

/// State shared between the host and its background thread.
struct Shared {
    id: TrackerId,
    config: FrameTrackerConfig,
    settings: Mutex<Settings>,
    camera: Mutex<CameraConfiguration>,
    cancel: CancellationFlag,
    events: EventBus,
    progress: ProgressTracker,
}

impl Shared {
    fn is_active(&self) -> bool {
        self.settings.lock().state.is_active()
    }

    fn update_camera(&self, camera: PinholeCamera) {
        self.camera.lock().camera = camera;
        self.events
            .publish(&TrackerEvent::camera_calibration(self.id, camera));
    }
}

/// Everything the algorithm works with during one run.
///
/// Range, frame type and camera are validated snapshots taken during
/// initialization.
pub struct TrackingSession<'a> {
    shared: &'a Shared,
    provider: Arc<dyn FrameProvider>,
    frame_type: FrameType,
    range: FrameRange,
    camera: CameraConfiguration,
    poses: OfflinePoses,
}

impl<'a> TrackingSession<'a> {
    pub fn tracker_id(&self) -> TrackerId {
        self.shared.id
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn range(&self) -> FrameRange {
        self.range
    }

    pub fn camera(&self) -> &CameraConfiguration {
        &self.camera
    }

    pub fn poses(&self) -> &OfflinePoses {
        &self.poses
    }

    pub fn poses_mut(&mut self) -> &mut OfflinePoses {
        &mut self.poses
    }

    pub fn provider(&self) -> &dyn FrameProvider {
        self.provider.as_ref()
    }

    pub fn config(&self) -> &FrameTrackerConfig {
        &self.shared.config
    }

    pub fn should_stop(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.shared.cancel
    }

    pub fn publish(&self, event: &TrackerEvent) {
        self.shared.events.publish(event);
    }

    /// Context for invoking a component with this session's snapshots.
    pub fn context(&self) -> ComponentContext<'_> {
        ComponentContext {
            tracker_id: self.shared.id,
            provider: self.provider.as_ref(),
            cancel: &self.shared.cancel,
            events: &self.shared.events,
            progress: &self.shared.progress,
            camera: &self.camera.camera,
            config: &self.shared.config,
        }
    }

    /// Invoke `component` over the session's range.
    pub fn run_component<C: TrackerComponent + ?Sized>(
        &self,
        component: &mut C,
        kind: ComponentKind,
    ) -> bool {
        self.run_component_on(component, kind, self.range)
    }

    /// Invoke `component` over a sub range, e.g. a second pass seeded elsewhere.
    pub fn run_component_on<C: TrackerComponent + ?Sized>(
        &self,
        component: &mut C,
        kind: ComponentKind,
        range: FrameRange,
    ) -> bool {
        if !(self.range.contains(range.lower()) && self.range.contains(range.upper())) {
            warn!(
                tracker = %self.shared.id,
                lower = range.lower(),
                upper = range.upper(),
                "Component range exceeds the tracking range"
            );
            return false;
        }
        component.invoke(&self.context(), ComponentEvents::new(self.shared.id, kind), range)
    }

    /// Replace the camera, e.g. after the algorithm refined it.
    pub fn update_camera(&mut self, camera: PinholeCamera) {
        self.camera.camera = camera;
        self.shared.update_camera(camera);
    }

    /// Open a progress phase covering `[start, stop]` of the current window.
    pub fn progress_layer(&self, start: f64, stop: f64) -> ScopedProgressLayer<'a> {
        self.shared.progress.layer(start, stop)
    }
}

/// Runs an offline tracking algorithm on a background thread.
pub struct FrameTracker<T: FrameTracking> {
    shared: Arc<Shared>,
    algorithm: Arc<Mutex<T>>,
    handle: Option<JoinHandle<()>>,
}

impl<T: FrameTracking> FrameTracker<T> {
    pub fn new(algorithm: T) -> Self {
        Self::with_config(algorithm, FrameTrackerConfig::default())
    }

    pub fn with_config(algorithm: T, config: FrameTrackerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: TrackerId::next(),
                config,
                settings: Mutex::new(Settings::default()),
                camera: Mutex::new(CameraConfiguration::unknown()),
                cancel: CancellationFlag::new(),
                events: EventBus::new(),
                progress: ProgressTracker::new(),
            }),
            algorithm: Arc::new(Mutex::new(algorithm)),
            handle: None,
        }
    }

    pub fn id(&self) -> TrackerId {
        self.shared.id
    }

    pub fn config(&self) -> &FrameTrackerConfig {
        &self.shared.config
    }

    /// Bus of all events published by this tracker.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Set the frame source; it can be set only once.
    pub fn set_frame_provider(&self, provider: Arc<dyn FrameProvider>) -> Result<(), ConfigError> {
        let mut settings = self.shared.settings.lock();
        if settings.state.is_active() {
            return Err(ConfigError::AlreadyRunning);
        }
        if settings.provider.is_some() {
            return Err(ConfigError::FrameProviderAlreadySet);
        }
        settings.provider = Some(provider);
        Ok(())
    }

    /// Set the range to track, seeded at `start` or at `lower` if unspecified.
    ///
    /// Allocates one invalid pose per frame of the range.
    pub fn set_tracking_frame_range(
        &self,
        lower: u32,
        upper: u32,
        start: Option<u32>,
    ) -> Result<(), ConfigError> {
        let mut settings = self.shared.settings.lock();
        if settings.state.is_active() {
            return Err(ConfigError::AlreadyRunning);
        }
        let range = FrameRange::new(lower, start.unwrap_or(lower), upper)?;
        settings.range = Some(range);
        settings.poses = OfflinePoses::new(lower, range.len() as usize);
        Ok(())
    }

    /// Set the camera profile; an invalid camera resets to an unknown profile.
    pub fn set_camera(
        &self,
        camera: PinholeCamera,
        precision: Option<f64>,
        optimize: bool,
    ) -> Result<(), ConfigError> {
        let settings = self.shared.settings.lock();
        if settings.state.is_active() {
            return Err(ConfigError::AlreadyRunning);
        }
        *self.shared.camera.lock() = CameraConfiguration::new(camera, precision, optimize);
        drop(settings);
        Ok(())
    }

    /// Replace the camera at any time and publish a calibration event.
    pub fn update_camera(&self, camera: PinholeCamera) {
        self.shared.update_camera(camera);
    }

    pub fn camera(&self) -> CameraConfiguration {
        *self.shared.camera.lock()
    }

    pub fn frame_range(&self) -> Option<FrameRange> {
        self.shared.settings.lock().range
    }

    /// Poses of the last run; `None` while a run is active.
    pub fn poses(&self) -> Option<OfflinePoses> {
        let settings = self.shared.settings.lock();
        (!settings.state.is_active()).then(|| settings.poses.clone())
    }

    pub fn state(&self) -> TrackerState {
        self.shared.settings.lock().state
    }

    pub fn running(&self) -> bool {
        self.shared.is_active()
    }

    pub fn succeeded(&self) -> bool {
        self.state() == TrackerState::Succeeded
    }

    /// Overall progress of the current or last run, in [0, 1].
    pub fn progress(&self) -> f64 {
        self.shared.progress.overall()
    }

    /// The algorithm, e.g. to read its results; `None` while a run is active.
    pub fn algorithm(&self) -> Option<MutexGuard<'_, T>> {
        if self.running() {
            return None;
        }
        self.algorithm.try_lock()
    }

    /// Start a run on a new background thread.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        {
            let settings = self.shared.settings.lock();
            if settings.state.is_active() {
                return Err(ConfigError::AlreadyRunning);
            }
            if settings.provider.is_none() {
                return Err(ConfigError::NoFrameProvider);
            }
        }

        // the previous run may still be publishing its closing event
        self.join();

        {
            let mut settings = self.shared.settings.lock();
            settings.state = TrackerState::Initializing;
            self.shared.cancel.reset();
            self.shared.progress.reset();
        }

        let shared = Arc::clone(&self.shared);
        let algorithm = Arc::clone(&self.algorithm);
        self.handle = Some(thread::spawn(move || run(&shared, &algorithm)));
        Ok(())
    }

    /// Ask the background run to stop without waiting for it.
    pub fn request_stop(&self) {
        self.shared.cancel.cancel();
    }

    /// Request a stop and wait for the background thread to exit.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the background thread to exit.
    pub fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.join().is_err() {
            error!(tracker = %self.shared.id, "Tracker thread panicked");
            let mut settings = self.shared.settings.lock();
            if settings.state.is_active() {
                settings.state = TrackerState::Failed;
            }
        }
    }
}

impl<T: FrameTracking> Drop for FrameTracker<T> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

/// Body of the background thread.
fn run<T: FrameTracking>(shared: &Shared, algorithm: &Mutex<T>) {
    let id = shared.id;
    info!(tracker = %id, "Tracker thread started");

    let process_event =
        |state| TrackerEvent::component(id, ComponentKind::TrackerProcess, state);
    let mut scoped_event = ScopedEvent::new(
        &shared.events,
        process_event(ComponentState::Started),
        process_event(ComponentState::Failed),
        process_event(ComponentState::Finished),
    );

    let mut session = match initialize(shared) {
        Ok(session) => session,
        Err(err) => {
            let state = if shared.cancel.is_cancelled() {
                info!(tracker = %id, "Tracker stopped by request during initialization");
                scoped_event.set_broke();
                TrackerState::Cancelled
            } else {
                error!(tracker = %id, "Tracker initialization failed: {err:#}");
                TrackerState::Failed
            };
            shared.settings.lock().state = state;
            return;
        }
    };

    shared.settings.lock().state = TrackerState::Running;
    let success = algorithm.lock().apply_frame_tracking(&mut session);

    let state = if success {
        info!(
            tracker = %id,
            valid_poses = session.poses.valid_count(),
            frames = session.poses.len(),
            "Tracker finished"
        );
        shared.events.publish(&TrackerEvent::state(
            id,
            StateEvent::TrackerPoses(session.poses.clone()),
        ));
        scoped_event.set_success();
        TrackerState::Succeeded
    } else if shared.cancel.is_cancelled() {
        info!(tracker = %id, "Tracker stopped by request");
        scoped_event.set_broke();
        TrackerState::Cancelled
    } else {
        error!(tracker = %id, "Tracker failed");
        TrackerState::Failed
    };

    let TrackingSession { range, poses, .. } = session;
    let mut settings = shared.settings.lock();
    settings.range = Some(range);
    settings.poses = poses;
    settings.state = state;
}

/// Wait for the frame source and validate range and camera against it.
fn initialize(shared: &Shared) -> Result<TrackingSession<'_>> {
    let id = shared.id;
    let config = &shared.config;

    let (provider, configured_range, mut poses) = {
        let settings = shared.settings.lock();
        let provider = settings
            .provider
            .clone()
            .context("No frame provider configured")?;
        (provider, settings.range, settings.poses.clone())
    };

    while !provider.is_initialized() {
        if shared.cancel.is_cancelled() {
            bail!("Frame provider was not initialized before the stop request");
        }
        thread::sleep(config.initialization_poll_interval());
    }

    let frame_type = provider
        .synchron_frame_type_request(config.frame_type_timeout(), &shared.cancel)
        .filter(FrameType::is_valid)
        .context("Frame type could not be determined")?;

    let frame_count = provider
        .synchron_frame_number_request(config.frame_number_timeout(), &shared.cancel)
        .context("Number of frames could not be determined")?;
    if frame_count == 0 {
        bail!("Frame provider holds no frames");
    }

    let requested = match configured_range {
        Some(range) => range,
        None => FrameRange::from_bounds(0, frame_count - 1)?,
    };
    let range = requested.clamp_to_frame_count(frame_count).with_context(|| {
        format!(
            "Frame range starts at {} but the sequence has {frame_count} frames",
            requested.lower()
        )
    })?;
    if range != requested {
        warn!(
            tracker = %id,
            frame_count,
            requested_upper = requested.upper(),
            upper = range.upper(),
            "Frame range clamped to the available frames"
        );
    }

    if poses.first_index() != range.lower() {
        poses = OfflinePoses::new(range.lower(), range.len() as usize);
    } else {
        poses.resize(range.len() as usize);
    }

    let camera = resolve_camera(shared, &frame_type);

    Ok(TrackingSession {
        shared,
        provider,
        frame_type,
        range,
        camera,
        poses,
    })
}

/// Fit the stored camera to the frame type and publish the result.
///
/// Checking and replacing happen under one lock, so a concurrent
/// [`FrameTracker::update_camera`] is either fitted or applied afterwards.
fn resolve_camera(shared: &Shared, frame_type: &FrameType) -> CameraConfiguration {
    let camera = {
        let mut camera = shared.camera.lock();
        *camera = fit_camera(shared, *camera, frame_type);
        *camera
    };

    shared
        .events
        .publish(&TrackerEvent::camera_calibration(shared.id, camera.camera));
    camera
}

/// The configured camera if it fits the frames, otherwise a default camera.
fn fit_camera(
    shared: &Shared,
    mut camera: CameraConfiguration,
    frame_type: &FrameType,
) -> CameraConfiguration {
    if camera.camera.is_valid()
        && !camera
            .camera
            .matches_resolution(frame_type.width, frame_type.height)
    {
        warn!(
            tracker = %shared.id,
            camera_width = camera.camera.width,
            camera_height = camera.camera.height,
            frame_width = frame_type.width,
            frame_height = frame_type.height,
            "Camera does not match the frame resolution and is replaced by a default camera"
        );
        camera = CameraConfiguration::unknown();
    }

    if !camera.camera.is_valid() {
        camera.camera = PinholeCamera::from_fov_x(
            frame_type.width,
            frame_type.height,
            shared.config.default_fov_x(),
        );
        camera.optimize = true;
        info!(
            tracker = %shared.id,
            fov_x_deg = shared.config.default_fov_x_deg,
            "Using a default camera"
        );
    }

    camera
}
