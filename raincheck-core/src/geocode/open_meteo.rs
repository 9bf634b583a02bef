use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::Config,
    error::Result,
    http::{build_client, get_json},
    model::Coordinates,
};

use super::{ForwardGeocoder, GeocodedPlace};

const ENDPOINT: &str = "geocoding";

/// Forward search against the Open-Meteo geocoding API.
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    http: Client,
    url: String,
    language: String,
    limit: u8,
}

impl OpenMeteoGeocoder {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: build_client(config)?,
            url: config.endpoints.geocoding_url.clone(),
            language: config.language.clone(),
            limit: config.effective_search_limit(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OmSearchResponse {
    #[serde(default)]
    results: Vec<OmPlace>,
}

#[derive(Debug, Deserialize)]
struct OmPlace {
    name: String,
    latitude: f64,
    longitude: f64,
    admin1: Option<String>,
    country: Option<String>,
}

impl From<OmPlace> for GeocodedPlace {
    fn from(p: OmPlace) -> Self {
        GeocodedPlace {
            name: p.name,
            region: p.admin1,
            country: p.country,
            coordinates: Coordinates::new(p.latitude, p.longitude),
        }
    }
}

#[async_trait]
impl ForwardGeocoder for OpenMeteoGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodedPlace>> {
        tracing::debug!(query, "forward geocoding");

        let count = self.limit.to_string();
        let request = self.http.get(&self.url).query(&[
            ("name", query),
            ("count", count.as_str()),
            ("language", self.language.as_str()),
            ("format", "json"),
        ]);

        let parsed: OmSearchResponse = get_json(request, ENDPOINT).await?;
        Ok(parsed.results.into_iter().map(GeocodedPlace::from).collect())
    }
}
