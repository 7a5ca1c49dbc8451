//! Smoothed zoom factor tracking.

use crate::filter::{
    ema::{Ema, EmaState},
    Filter,
};

use super::ZoomConfig;

/// Whether a [`ZoomScaleTracker`] has a baseline pinch span to compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No baseline yet. The next distance update arms the tracker.
    Unarmed,
    /// A baseline is set and distance updates move the zoom factor.
    Armed,
}

/// Turns a stream of pinch spans into a smoothed zoom factor.
///
/// The first span passed to [`ZoomScaleTracker::update`] after creation or [`reset`] becomes the
/// baseline, i.e. the span that corresponds to a zoom factor of 1.0. Later spans are divided by
/// the baseline and run through an exponential moving average.
///
/// The tracker also remembers the zoom factor the view was last rendered at, so that callers can
/// skip re-rendering when the factor has barely moved ([`should_recompose`]).
///
/// [`reset`]: ZoomScaleTracker::reset
/// [`should_recompose`]: ZoomScaleTracker::should_recompose
#[derive(Debug, Clone)]
pub struct ZoomScaleTracker {
    ema: Ema,
    threshold: f32,
    min_scale: f32,
    max_scale: f32,
    baseline: Option<f32>,
    scale: EmaState,
    last_applied: f32,
}

impl Default for ZoomScaleTracker {
    fn default() -> Self {
        Self::new(&ZoomConfig::default())
    }
}

impl ZoomScaleTracker {
    pub fn new(config: &ZoomConfig) -> Self {
        Self {
            ema: Ema::new(config.alpha),
            threshold: config.threshold,
            min_scale: *config.scale_range.start(),
            max_scale: *config.scale_range.end(),
            baseline: None,
            scale: EmaState::starting_at(1.0),
            last_applied: 1.0,
        }
    }

    pub fn state(&self) -> TrackerState {
        match self.baseline {
            Some(_) => TrackerState::Armed,
            None => TrackerState::Unarmed,
        }
    }

    /// Returns the pinch span the tracker was armed with.
    #[inline]
    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }

    /// Returns the current smoothed zoom factor.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale.value().unwrap_or(1.0)
    }

    /// Returns the zoom factor the view was last rendered at.
    #[inline]
    pub fn last_applied(&self) -> f32 {
        self.last_applied
    }

    /// Feeds the pinch span of the current frame into the tracker and returns the new zoom factor.
    ///
    /// Only frames with two detected hands should be fed in. Spans that are not finite and
    /// positive are ignored and leave the tracker unchanged.
    pub fn update(&mut self, raw_distance: f32) -> f32 {
        if !raw_distance.is_finite() || raw_distance <= 0.0 {
            log::trace!("ignoring degenerate pinch span {raw_distance}");
            return self.scale();
        }

        let baseline = *self.baseline.get_or_insert_with(|| {
            log::debug!("zoom gesture armed with baseline span {raw_distance:.4}");
            raw_distance
        });

        let ratio = raw_distance / baseline;
        let scale = self
            .ema
            .filter(&mut self.scale, ratio)
            .clamp(self.min_scale, self.max_scale);
        self.scale = EmaState::starting_at(scale);
        log::trace!("pinch span {raw_distance:.4}, ratio {ratio:.3} -> scale {scale:.3}");
        scale
    }

    /// Returns whether the zoom factor moved far enough from the last rendered one to warrant
    /// rendering the zoomed view again.
    pub fn should_recompose(&self) -> bool {
        (self.scale() - self.last_applied).abs() > self.threshold
    }

    /// Records that the view has been rendered at the current zoom factor.
    pub fn mark_applied(&mut self) {
        self.last_applied = self.scale();
    }

    /// If [`should_recompose`] is true, marks the current zoom factor as applied and returns it.
    ///
    /// [`should_recompose`]: ZoomScaleTracker::should_recompose
    pub fn take_recompose(&mut self) -> Option<f32> {
        if self.should_recompose() {
            self.mark_applied();
            Some(self.last_applied)
        } else {
            None
        }
    }

    /// Forgets the baseline and returns to a zoom factor of 1.0.
    pub fn reset(&mut self) {
        log::debug!("zoom gesture reset");
        self.baseline = None;
        self.scale = EmaState::starting_at(1.0);
        self.last_applied = 1.0;
    }
}
