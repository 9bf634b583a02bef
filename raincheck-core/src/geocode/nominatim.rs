use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    config::Config,
    error::Result,
    http::{build_client, get_json},
    model::Coordinates,
};

use super::{AddressParts, ReverseGeocoder, ReversePlace};

const ENDPOINT: &str = "reverse geocoding";
const ZOOM: &str = "10";

/// Reverse lookup against Nominatim (OpenStreetMap). The client label goes out
/// as the User-Agent, which Nominatim requires.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    url: String,
    language: String,
}

impl NominatimGeocoder {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: build_client(config)?,
            url: config.endpoints.reverse_geocoding_url.clone(),
            language: config.language.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct NmResponse {
    address: Option<NmAddress>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NmAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    suburb: Option<String>,
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, coordinates: Coordinates) -> Result<ReversePlace> {
        tracing::debug!(%coordinates, "reverse geocoding");

        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();
        let request = self.http.get(&self.url).query(&[
            ("format", "json"),
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("zoom", ZOOM),
            ("accept-language", self.language.as_str()),
        ]);

        let parsed: NmResponse = get_json(request, ENDPOINT).await?;

        Ok(ReversePlace {
            address: parsed.address.map(|a| AddressParts {
                city: a.city,
                town: a.town,
                village: a.village,
                suburb: a.suburb,
            }),
            display_name: parsed.display_name,
        })
    }
}
