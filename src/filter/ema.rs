//! Exponential Moving Average.

use super::Filter;

/// An Exponential Moving Average (EMA) filter.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// The `alpha` parameter must be between 0.0 and 1.0 and defines how quickly the weight of
    /// older values should decay. Values closer to 1.0 favor recent values over older values, while
    /// values closer to 0.0 make the output follow the input more slowly.
    ///
    /// # Panics
    ///
    /// This method will panic if `alpha` is not in between 0.0 and 1.0.
    pub fn new(alpha: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "EMA alpha must be between 0.0 and 1.0, got {alpha}"
        );
        Self { alpha }
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

/// Filter state for [`Ema`] filters.
///
/// A default-constructed state passes the first value through unchanged. [`EmaState::starting_at`]
/// instead seeds the average, so the first value is already smoothed against it.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmaState {
    last: Option<f32>,
}

impl EmaState {
    pub fn starting_at(value: f32) -> Self {
        Self { last: Some(value) }
    }

    /// Returns the current average, if any value has been filtered or seeded.
    #[inline]
    pub fn value(&self) -> Option<f32> {
        self.last
    }
}

impl Filter<f32> for Ema {
    type State = EmaState;

    fn filter(&self, state: &mut Self::State, value: f32) -> f32 {
        let avg = match state.last {
            Some(last) => last + (value - last) * self.alpha,
            None => value,
        };
        state.last = Some(avg);
        avg
    }
}
