use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::Config,
    error::{Error, Result},
    http::{build_client, get_json},
    model::{Coordinates, ForecastWindow, HourlySample, RawForecast, round_half_up},
};

use super::ForecastClient;

const ENDPOINT: &str = "forecast";
const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability";

/// Open-Meteo forecast API client.
#[derive(Debug, Clone)]
pub struct OpenMeteoForecast {
    http: Client,
    url: String,
}

impl OpenMeteoForecast {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self { http: build_client(config)?, url: config.endpoints.forecast_url.clone() })
    }
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    #[serde(default)]
    utc_offset_seconds: i64,
    current_weather: Option<OmCurrentWeather>,
    hourly: Option<OmHourly>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OmHourly {
    time: Vec<String>,
    precipitation_probability: Option<Vec<Option<f64>>>,
}

/// Open-Meteo reports local wall-clock times ("2024-06-01T14:00") when asked
/// for `timezone=auto`; shift them back to UTC with the response offset.
fn parse_local_time(raw: &str, utc_offset_seconds: i64) -> Result<DateTime<Utc>> {
    let local = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|e| Error::malformed(ENDPOINT, format!("bad timestamp '{raw}': {e}")))?;
    let utc = TimeDelta::try_seconds(utc_offset_seconds)
        .and_then(|offset| local.checked_sub_signed(offset))
        .ok_or_else(|| {
            Error::malformed(ENDPOINT, format!("utc offset {utc_offset_seconds}s out of range"))
        })?;
    Ok(Utc.from_utc_datetime(&utc))
}

impl OmForecastResponse {
    fn into_raw(self) -> Result<RawForecast> {
        let temperature = self
            .current_weather
            .and_then(|c| c.temperature)
            .ok_or_else(|| Error::malformed(ENDPOINT, "missing current temperature"))?;

        let hourly = self
            .hourly
            .ok_or_else(|| Error::malformed(ENDPOINT, "missing hourly series"))?;
        let probabilities = hourly
            .precipitation_probability
            .ok_or_else(|| Error::malformed(ENDPOINT, "missing hourly precipitation probability"))?;
        if probabilities.len() != hourly.time.len() {
            return Err(Error::malformed(
                ENDPOINT,
                format!(
                    "{} hourly timestamps but {} precipitation values",
                    hourly.time.len(),
                    probabilities.len()
                ),
            ));
        }

        let mut samples = Vec::with_capacity(probabilities.len());
        for (time, probability) in hourly.time.iter().zip(probabilities) {
            let Some(probability) = probability else { continue };
            samples.push(HourlySample {
                timestamp: parse_local_time(time, self.utc_offset_seconds)?,
                precipitation_probability: probability.clamp(0.0, 100.0).round() as u8,
            });
        }

        Ok(RawForecast { hourly: samples, current_temperature_c: round_half_up(temperature) })
    }
}

#[async_trait]
impl ForecastClient for OpenMeteoForecast {
    async fn fetch_forecast(
        &self,
        coordinates: Coordinates,
        window: ForecastWindow,
    ) -> Result<RawForecast> {
        let (start_date, end_date) = window.calendar_span();
        tracing::debug!(%coordinates, %start_date, %end_date, "requesting forecast");

        let request = self.http.get(&self.url).query(&[
            ("latitude", format!("{:.4}", coordinates.latitude)),
            ("longitude", format!("{:.4}", coordinates.longitude)),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("current_weather", "true".to_string()),
            ("timezone", "auto".to_string()),
            ("start_date", start_date.format("%Y-%m-%d").to_string()),
            ("end_date", end_date.format("%Y-%m-%d").to_string()),
        ]);

        let parsed: OmForecastResponse = get_json(request, ENDPOINT).await?;
        parsed.into_raw()
    }
}
