use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::model::Coordinates;

pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const OPEN_METEO_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// The forward-geocoding provider never returns more than this many candidates.
pub const MAX_SEARCH_RESULTS: u8 = 5;

/// Provider base URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub forecast_url: String,
    pub geocoding_url: String,
    pub reverse_geocoding_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            forecast_url: OPEN_METEO_FORECAST_URL.to_string(),
            geocoding_url: OPEN_METEO_GEOCODING_URL.to_string(),
            reverse_geocoding_url: NOMINATIM_REVERSE_URL.to_string(),
        }
    }
}

/// Exponential backoff for forecast fetches: `base_delay_ms * 2^retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 1000 }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): 1s, 2s, 4s with defaults.
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Top-level configuration, optionally read from disk.
///
/// Example TOML:
/// ```toml
/// language = "en"
///
/// [retry]
/// max_retries = 2
///
/// [home]
/// latitude = 48.8566
/// longitude = 2.3522
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: Endpoints,
    /// Language preference sent to the geocoding providers.
    pub language: String,
    /// Client label sent to the reverse-geocoding provider.
    pub user_agent: String,
    pub search_limit: u8,
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
    /// Position reported when the user asks for "here".
    pub home: Option<Coordinates>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            language: "fr".to_string(),
            user_agent: "RainCheckApp/1.0".to_string(),
            search_limit: MAX_SEARCH_RESULTS,
            request_timeout_secs: 10,
            retry: RetryPolicy::default(),
            home: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "raincheck", "raincheck")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Search limit as actually sent to the provider.
    pub fn effective_search_limit(&self) -> u8 {
        self.search_limit.clamp(1, MAX_SEARCH_RESULTS)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Point every provider at one base URL. Used by tests against a mock server.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.endpoints = Endpoints {
            forecast_url: format!("{base}/v1/forecast"),
            geocoding_url: format!("{base}/v1/search"),
            reverse_geocoding_url: format!("{base}/reverse"),
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_public_providers() {
        let cfg = Config::default();
        assert_eq!(cfg.endpoints.forecast_url, OPEN_METEO_FORECAST_URL);
        assert_eq!(cfg.language, "fr");
        assert_eq!(cfg.retry.max_retries, 3);
        assert!(cfg.home.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            language = "en"

            [retry]
            max_retries = 1

            [home]
            latitude = 45.5
            longitude = -73.6
            "#,
        )
        .expect("config should parse");

        assert_eq!(cfg.language, "en");
        assert_eq!(cfg.retry.max_retries, 1);
        assert_eq!(cfg.retry.base_delay_ms, 1000);
        assert_eq!(cfg.user_agent, "RainCheckApp/1.0");
        assert_eq!(cfg.home, Some(Coordinates::new(45.5, -73.6)));
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_toml_str("retry = 3").is_err());
    }

    #[test]
    fn toml_output_parses_back() {
        let cfg = Config::default();
        let text = cfg.to_toml_string().expect("serialize");
        assert_eq!(Config::from_toml_str(&text).expect("parse"), cfg);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
    }

    #[test]
    fn search_limit_is_clamped() {
        let cfg = Config { search_limit: 20, ..Config::default() };
        assert_eq!(cfg.effective_search_limit(), 5);
        let cfg = Config { search_limit: 0, ..Config::default() };
        assert_eq!(cfg.effective_search_limit(), 1);
    }
}
