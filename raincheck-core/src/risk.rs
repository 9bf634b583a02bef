//! Reduction of an hourly precipitation series to one [`RiskTier`].

use crate::model::{ForecastWindow, HourlySample, RiskTier};

/// Lowest probability (percent) rated [`RiskTier::Medium`].
pub const MEDIUM_THRESHOLD: f64 = 30.0;
/// Lowest probability (percent) rated [`RiskTier::High`].
pub const HIGH_THRESHOLD: f64 = 60.0;

/// Tier for a raw probability on the 0–100 scale. Values above 100 are High.
pub fn tier_for(probability: f64) -> RiskTier {
    if probability < MEDIUM_THRESHOLD {
        RiskTier::Low
    } else if probability < HIGH_THRESHOLD {
        RiskTier::Medium
    } else {
        RiskTier::High
    }
}

/// Highest probability among samples inside `window`, or 0 if none fall in it.
pub fn max_probability(samples: &[HourlySample], window: &ForecastWindow) -> u8 {
    samples
        .iter()
        .filter(|s| window.contains(s.timestamp))
        .map(|s| s.precipitation_probability)
        .max()
        .unwrap_or(0)
}

pub fn classify(samples: &[HourlySample], window: &ForecastWindow) -> RiskTier {
    tier_for(f64::from(max_probability(samples, window)))
}
