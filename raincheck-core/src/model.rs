use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Range check. Nothing downstream enforces it; callers decide when to ask.
    pub fn validate(self) -> Result<Self> {
        let lat_ok = (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = (-180.0..=180.0).contains(&self.longitude);

        if lat_ok && lon_ok {
            Ok(self)
        } else {
            Err(Error::InvalidCoordinates { latitude: self.latitude, longitude: self.longitude })
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A forward-geocoding hit, in provider relevance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub coordinates: Coordinates,
    pub display_name: String,
}

impl fmt::Display for PlaceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Length of the activity window, in minutes. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DurationMinutes(u32);

impl DurationMinutes {
    /// Choices offered by the wizard.
    pub const PRESETS: [u32; 5] = [10, 20, 30, 45, 60];
    pub const DEFAULT: DurationMinutes = DurationMinutes(30);

    pub fn new(minutes: u32) -> Result<Self> {
        if minutes == 0 { Err(Error::InvalidDuration) } else { Ok(Self(minutes)) }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

impl Default for DurationMinutes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for DurationMinutes {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DurationMinutes> for u32 {
    fn from(value: DurationMinutes) -> Self {
        value.0
    }
}

impl fmt::Display for DurationMinutes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourlySample {
    pub timestamp: DateTime<Utc>,
    pub precipitation_probability: u8,
}

/// Raw provider data for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawForecast {
    pub hourly: Vec<HourlySample>,
    pub current_temperature_c: i32,
}

/// The interval `[start, start + duration]` a forecast is judged over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ForecastWindow {
    pub fn starting_at(now: DateTime<Utc>, duration: DurationMinutes) -> Self {
        Self { start: now, end: now + duration.as_duration() }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// First and last calendar dates to request from the provider.
    ///
    /// The provider answers in the location's own calendar, which can be up to
    /// a day away from UTC, so the span is widened by one day on each side.
    pub fn calendar_span(&self) -> (NaiveDate, NaiveDate) {
        let first = (self.start - Duration::days(1)).date_naive();
        let last = (self.end + Duration::days(1)).date_naive();
        (first, last)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    /// Short verdict keyword shown to the user.
    pub fn verdict(&self) -> &'static str {
        match self {
            RiskTier::Low => "safe",
            RiskTier::Medium => "possible",
            RiskTier::High => "rain",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            RiskTier::Low => "Go for it, you're fine!",
            RiskTier::Medium => "You might catch a few drops...",
            RiskTier::High => "Bad idea... you're going to get wet!",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            RiskTier::Low => "No rain expected for the next few minutes.",
            RiskTier::Medium => "There could be a little rain. Maybe take a small umbrella?",
            RiskTier::High => "Rain is expected. Better postpone your activity!",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a [`ForecastResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    Provider,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub risk_tier: RiskTier,
    pub current_temperature_c: i32,
    pub source: ForecastSource,
    /// Provider calls made before this result was produced (0 for a bare estimate).
    pub attempts: u32,
}

/// Round half up, matching how temperatures are displayed elsewhere.
pub(crate) fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}
