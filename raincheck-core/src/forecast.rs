use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    model::{Coordinates, ForecastWindow, RawForecast},
};

pub mod open_meteo;

pub use open_meteo::OpenMeteoForecast;

/// Source of hourly precipitation probabilities and the current temperature.
///
/// Implementations fetch once and report failure; retrying is the pipeline's job.
#[async_trait]
pub trait ForecastClient: Send + Sync + Debug {
    /// Hourly data covering at least `window`, plus the current temperature.
    ///
    /// The caller builds `window` as `[now, now + duration]` with
    /// [`ForecastWindow::starting_at`], so each attempt uses its own "now".
    async fn fetch_forecast(
        &self,
        coordinates: Coordinates,
        window: ForecastWindow,
    ) -> Result<RawForecast>;
}
