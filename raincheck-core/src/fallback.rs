//! Synthetic forecast used when the provider can't be reached.
//!
//! Deterministic and offline: the same coordinates and duration always give the
//! same answer, so retries and re-renders stay consistent.

use crate::{
    model::{Coordinates, DurationMinutes, ForecastResult, ForecastSource, round_half_up},
    risk::tier_for,
};

/// Pseudo-random value in `[0, 1]` derived from the coordinates.
pub fn seed(coordinates: Coordinates) -> f64 {
    (coordinates.latitude.sin().abs() + coordinates.longitude.cos().abs()) / 2.0
}

/// Unclamped synthetic rain probability; grows with the duration and can pass 100.
pub fn rain_probability(coordinates: Coordinates, duration: DurationMinutes) -> f64 {
    let duration_factor = f64::from(duration.get()) / 60.0;
    seed(coordinates) * 100.0 * (1.0 + duration_factor)
}

pub fn estimate(coordinates: Coordinates, duration: DurationMinutes) -> ForecastResult {
    let seed = seed(coordinates);

    ForecastResult {
        risk_tier: tier_for(rain_probability(coordinates, duration)),
        current_temperature_c: round_half_up(10.0 + seed * 15.0),
        source: ForecastSource::Fallback,
        attempts: 0,
    }
}
