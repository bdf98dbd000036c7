//! Layered progress of a tracker run.
//!
//! A run is split into nested phases. Each phase claims a window of its
//! parent's progress range; progress reported by the innermost phase is mapped
//! through all windows to obtain the overall progress of the run.

use parking_lot::Mutex;

#[derive(Debug)]
struct ProgressState {
    layers: Vec<(f64, f64)>,
    overall: f64,
}

/// Overall progress of one tracker, in [0, 1].
#[derive(Debug)]
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self {
            state: Mutex::new(ProgressState {
                layers: Vec::new(),
                overall: 0.0,
            }),
        }
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all layers and restart at zero.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.layers.clear();
        state.overall = 0.0;
    }

    pub fn overall(&self) -> f64 {
        self.state.lock().overall
    }

    /// Report progress of the innermost phase and return the overall progress.
    ///
    /// Overall progress never decreases.
    pub fn report(&self, local: f64) -> f64 {
        let mut state = self.state.lock();
        let (start, stop) = window(&state.layers);
        let global = start + local.clamp(0.0, 1.0) * (stop - start);
        if global > state.overall {
            state.overall = global;
        }
        state.overall
    }

    /// Open a nested phase covering `[start, stop]` of the current window.
    pub fn layer(&self, start: f64, stop: f64) -> ScopedProgressLayer<'_> {
        let depth = {
            let mut state = self.state.lock();
            state.layers.push(checked_window(start, stop));
            state.layers.len()
        };
        ScopedProgressLayer {
            tracker: self,
            depth,
        }
    }
}

fn checked_window(start: f64, stop: f64) -> (f64, f64) {
    debug_assert!(0.0 <= start && start <= stop && stop <= 1.0);
    let start = start.clamp(0.0, 1.0);
    (start, stop.clamp(start, 1.0))
}

fn window(layers: &[(f64, f64)]) -> (f64, f64) {
    layers.iter().fold((0.0, 1.0), |(start, stop), (s, e)| {
        let range = stop - start;
        (start + s * range, start + e * range)
    })
}

/// A progress phase that lasts as long as this guard.
pub struct ScopedProgressLayer<'a> {
    tracker: &'a ProgressTracker,
    depth: usize,
}

impl ScopedProgressLayer<'_> {
    /// Move this phase to a new window of its parent.
    pub fn modify(&self, start: f64, stop: f64) {
        let mut state = self.tracker.state.lock();
        if let Some(layer) = state.layers.get_mut(self.depth - 1) {
            *layer = checked_window(start, stop);
        }
    }
}

impl Drop for ScopedProgressLayer<'_> {
    fn drop(&mut self) {
        let mut state = self.tracker.state.lock();
        state.layers.truncate(self.depth - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_without_layers() {
        let progress = ProgressTracker::new();
        assert_eq!(progress.report(0.25), 0.25);
        assert_eq!(progress.overall(), 0.25);
    }

    #[test]
    fn test_nested_layers_map_into_parent() {
        let progress = ProgressTracker::new();
        let outer = progress.layer(0.0, 0.5);
        {
            let _inner = progress.layer(0.5, 1.0);
            // 0.5 of [0.25, 0.5]
            assert!((progress.report(0.5) - 0.375).abs() < 1e-12);
        }
        outer.modify(0.5, 1.0);
        assert!((progress.report(0.5) - 0.75).abs() < 1e-12);
        drop(outer);
        assert_eq!(progress.report(1.0), 1.0);
    }

    #[test]
    fn test_overall_never_decreases() {
        let progress = ProgressTracker::new();
        progress.report(0.6);
        let _layer = progress.layer(0.0, 0.5);
        assert_eq!(progress.report(0.2), 0.6);

        progress.reset();
        assert_eq!(progress.overall(), 0.0);
    }
}
