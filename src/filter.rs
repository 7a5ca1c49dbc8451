//! Data filtering and smoothing.

pub mod ema;

/// A filter for values of type `V`.
///
/// Filters are stateless parameter sets; the mutable history lives in [`Filter::State`], so one
/// filter can drive any number of independent signals.
pub trait Filter<V> {
    /// The per-signal state of the filter.
    type State: Default;

    /// Pushes a new value through the filter, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}
