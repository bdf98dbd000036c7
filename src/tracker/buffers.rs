//! Double-buffered frame data for tracker components.
//!
//! A buffer strategy owns two slots, `previous` and `current`. Before each
//! frame the labels are swapped, so the last frame becomes `previous` without
//! copying, and the new frame is loaded into `current`. The per-frame step
//! only ever borrows the slots, which lets the pyramid strategy rebuild the
//! stale pyramid in place.
//!
//! Both strategies drop their slots when the decreasing pass starts, so that
//! pass never sees a frame from the increasing pass as `previous`.

use std::mem;

use image::Luma;
use tracing::warn;

use crate::frame::{strip_alpha, FramePyramid, FrameRef, PyramidPixel};

use super::component::{ComponentContext, IterationResult, TrackerComponent};
use super::range::FrameRange;

/// The `previous`/`current` slot pair.
#[derive(Debug)]
pub struct BufferPair<T> {
    previous: Option<T>,
    current: Option<T>,
}

impl<T> Default for BufferPair<T> {
    fn default() -> Self {
        Self {
            previous: None,
            current: None,
        }
    }
}

impl<T> BufferPair<T> {
    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// Make `current` the new `previous` and hand out the stale buffer for reuse.
    ///
    /// `current` stays empty until [`BufferPair::set_current`] is called.
    fn rotate(&mut self) -> Option<T> {
        mem::swap(&mut self.previous, &mut self.current);
        self.current.take()
    }

    fn set_current(&mut self, value: T) {
        self.current = Some(value);
    }

    fn clear(&mut self) {
        self.previous = None;
        self.current = None;
    }
}

/// Loading strategy for the data one frame step works on.
pub trait IterationBuffers {
    /// Called once per invocation before any frame is loaded.
    fn prepare(&mut self, _ctx: &ComponentContext<'_>) -> bool {
        true
    }

    /// Rotate the slots and load frame `index` into `current`.
    ///
    /// On failure `current` is left empty.
    fn load(&mut self, ctx: &ComponentContext<'_>, index: u32) -> bool;

    /// Drop both slots.
    fn release(&mut self);
}

/// Fetch frame `index` and check it against the camera resolution.
fn fetch_frame(ctx: &ComponentContext<'_>, index: u32) -> Option<FrameRef> {
    let Some(frame) =
        ctx.provider
            .synchron_frame_request(index, ctx.config.frame_request_timeout(), ctx.cancel)
    else {
        if !ctx.should_stop() {
            warn!(tracker = %ctx.tracker_id, index, "Frame could not be requested");
        }
        return None;
    };

    let frame = strip_alpha(&frame);
    if !ctx.camera.matches_resolution(frame.width(), frame.height()) {
        warn!(
            tracker = %ctx.tracker_id,
            index,
            width = frame.width(),
            height = frame.height(),
            camera_width = ctx.camera.width,
            camera_height = ctx.camera.height,
            "Frame resolution does not match the camera"
        );
        return None;
    }

    Some(frame)
}

/// Single decoded frames without alpha channel.
#[derive(Debug, Default)]
pub struct FrameBuffers {
    frames: BufferPair<FrameRef>,
}

impl FrameBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_frame(&self) -> Option<&FrameRef> {
        self.frames.previous()
    }

    pub fn current_frame(&self) -> Option<&FrameRef> {
        self.frames.current()
    }
}

impl IterationBuffers for FrameBuffers {
    fn load(&mut self, ctx: &ComponentContext<'_>, index: u32) -> bool {
        // shared frames are not reused, the stale handle is simply dropped
        self.frames.rotate();

        match fetch_frame(ctx, index) {
            Some(frame) => {
                self.frames.set_current(frame);
                true
            }
            None => false,
        }
    }

    fn release(&mut self) {
        self.frames.clear();
    }
}

/// Frame pyramids in pixel layout `P`.
#[derive(Debug)]
pub struct PyramidBuffers<P: PyramidPixel = Luma<u8>> {
    pyramids: BufferPair<FramePyramid<P>>,
    /// Number of layers, determined once from the camera resolution.
    layers: Option<u32>,
}

impl<P: PyramidPixel> Default for PyramidBuffers<P> {
    fn default() -> Self {
        Self {
            pyramids: BufferPair::default(),
            layers: None,
        }
    }
}

impl<P: PyramidPixel> PyramidBuffers<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed number of layers instead of the ideal one.
    pub fn with_layers(layers: u32) -> Self {
        Self {
            pyramids: BufferPair::default(),
            layers: Some(layers.max(1)),
        }
    }

    pub fn layers(&self) -> Option<u32> {
        self.layers
    }

    pub fn previous_pyramid(&self) -> Option<&FramePyramid<P>> {
        self.pyramids.previous()
    }

    pub fn current_pyramid(&self) -> Option<&FramePyramid<P>> {
        self.pyramids.current()
    }
}

impl<P: PyramidPixel> IterationBuffers for PyramidBuffers<P> {
    fn prepare(&mut self, ctx: &ComponentContext<'_>) -> bool {
        if self.layers.is_none() {
            self.layers = Some(FramePyramid::<P>::ideal_layers(
                ctx.camera.width,
                ctx.camera.height,
            ));
        }
        true
    }

    fn load(&mut self, ctx: &ComponentContext<'_>, index: u32) -> bool {
        let stale = self.pyramids.rotate();

        let Some(frame) = fetch_frame(ctx, index) else {
            return false;
        };

        let layers = self.layers.unwrap_or(1);
        let pyramid = match stale {
            Some(mut pyramid) => {
                pyramid.replace(&frame, layers);
                pyramid
            }
            None => FramePyramid::new(&frame, layers),
        };
        self.pyramids.set_current(pyramid);
        true
    }

    fn release(&mut self) {
        self.pyramids.clear();
    }
}

/// The per-frame algorithm of a buffered component.
pub trait FrameStep<B> {
    fn on_start(&mut self, _ctx: &ComponentContext<'_>, _range: &FrameRange) -> bool {
        true
    }

    fn on_start_increasing(&mut self, _ctx: &ComponentContext<'_>) -> bool {
        true
    }

    fn on_start_decreasing(&mut self, _ctx: &ComponentContext<'_>) -> bool {
        true
    }

    /// `buffers` holds the loaded data of `current` and, unless this is the
    /// first frame of a pass, of `previous`.
    fn on_frame(
        &mut self,
        ctx: &ComponentContext<'_>,
        buffers: &B,
        previous: Option<u32>,
        current: u32,
        iteration: u32,
        total: u32,
    ) -> IterationResult;

    fn on_stop(&mut self, _ctx: &ComponentContext<'_>, _range: &FrameRange) -> bool {
        true
    }
}

/// A tracker component that loads its frame data through a buffer strategy.
pub struct BufferedComponent<B, S> {
    buffers: B,
    step: S,
}

/// Component working on single frames.
pub type FrameTrackerComponent<S> = BufferedComponent<FrameBuffers, S>;

/// Component working on frame pyramids.
pub type FramePyramidTrackerComponent<S, P = Luma<u8>> = BufferedComponent<PyramidBuffers<P>, S>;

impl<B, S> BufferedComponent<B, S> {
    pub fn new(buffers: B, step: S) -> Self {
        Self { buffers, step }
    }

    pub fn buffers(&self) -> &B {
        &self.buffers
    }

    pub fn step(&self) -> &S {
        &self.step
    }

    pub fn step_mut(&mut self) -> &mut S {
        &mut self.step
    }

    pub fn into_step(self) -> S {
        self.step
    }
}

impl<S> BufferedComponent<FrameBuffers, S> {
    pub fn with_frames(step: S) -> Self {
        Self::new(FrameBuffers::new(), step)
    }
}

impl<S, P: PyramidPixel> BufferedComponent<PyramidBuffers<P>, S> {
    pub fn with_pyramids(step: S) -> Self {
        Self::new(PyramidBuffers::new(), step)
    }
}

impl<B: IterationBuffers, S: FrameStep<B>> TrackerComponent for BufferedComponent<B, S> {
    fn on_start(&mut self, ctx: &ComponentContext<'_>, range: &FrameRange) -> bool {
        self.buffers.prepare(ctx) && self.step.on_start(ctx, range)
    }

    fn on_start_increasing(&mut self, ctx: &ComponentContext<'_>) -> bool {
        self.step.on_start_increasing(ctx)
    }

    fn on_start_decreasing(&mut self, ctx: &ComponentContext<'_>) -> bool {
        self.buffers.release();
        self.step.on_start_decreasing(ctx)
    }

    fn on_setup_iteration(&mut self, ctx: &ComponentContext<'_>, index: u32) -> bool {
        self.buffers.load(ctx, index)
    }

    fn on_frame(
        &mut self,
        ctx: &ComponentContext<'_>,
        previous: Option<u32>,
        current: u32,
        iteration: u32,
        total: u32,
    ) -> IterationResult {
        self.step
            .on_frame(ctx, &self.buffers, previous, current, iteration, total)
    }

    fn on_stop(&mut self, ctx: &ComponentContext<'_>, range: &FrameRange) -> bool {
        self.step.on_stop(ctx, range)
    }
}
