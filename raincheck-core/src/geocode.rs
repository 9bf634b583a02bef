//! Place-name resolution: free-text search and coordinate naming, memoized for
//! the life of the process.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashMap, fmt::Debug, hash::Hash, sync::Arc};
use tokio::sync::OnceCell;

use crate::{
    config::Config,
    error::{Error, Result},
    location::Geolocator,
    model::{Coordinates, PlaceCandidate},
};

pub mod nominatim;
pub mod open_meteo;

pub use nominatim::NominatimGeocoder;
pub use open_meteo::OpenMeteoGeocoder;

/// Shortest query worth sending for autocomplete.
pub const MIN_QUERY_LEN: usize = 2;

/// Name used when a position can't be named.
pub const FALLBACK_PLACE_LABEL: &str = "your location";

/// One forward-geocoding hit as the provider describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub name: String,
    pub region: Option<String>,
    pub country: Option<String>,
    pub coordinates: Coordinates,
}

impl GeocodedPlace {
    /// "locality, region, country", skipping blank parts.
    pub fn display_name(&self) -> String {
        [Some(self.name.as_str()), self.region.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl From<GeocodedPlace> for PlaceCandidate {
    fn from(place: GeocodedPlace) -> Self {
        PlaceCandidate { display_name: place.display_name(), coordinates: place.coordinates }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressParts {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub suburb: Option<String>,
}

/// Reverse-geocoding answer: an address breakdown plus the full display string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReversePlace {
    pub address: Option<AddressParts>,
    pub display_name: Option<String>,
}

impl ReversePlace {
    /// city > town > village > suburb > first segment of the display string.
    pub fn short_name(&self) -> Option<String> {
        let addr = self.address.as_ref()?;

        [&addr.city, &addr.town, &addr.village, &addr.suburb]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .or_else(|| {
                self.display_name
                    .as_deref()
                    .and_then(|full| full.split(',').next())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            })
            .map(str::to_string)
    }
}

#[async_trait]
pub trait ForwardGeocoder: Send + Sync + Debug {
    /// Places matching `query`, most relevant first. May be empty.
    async fn search(&self, query: &str) -> Result<Vec<GeocodedPlace>>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync + Debug {
    async fn reverse(&self, coordinates: Coordinates) -> Result<ReversePlace>;
}

/// Outcome of resolving what the user typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Selected(PlaceCandidate),
    /// Several plausible places; the user has to pick one.
    Ambiguous(Vec<PlaceCandidate>),
}

type CoordKey = (u64, u64);

fn coord_key(coordinates: Coordinates) -> CoordKey {
    (coordinates.latitude.to_bits(), coordinates.longitude.to_bits())
}

/// Wraps both geocoding backends with per-process memoization.
///
/// Each key owns a once-cell, so identical concurrent lookups share a single
/// provider call. Failed lookups leave the cell empty and are retried on the
/// next call. Entries are never evicted.
#[derive(Debug)]
pub struct LocationResolver {
    forward: Box<dyn ForwardGeocoder>,
    reverse: Box<dyn ReverseGeocoder>,
    searches: Mutex<HashMap<String, Arc<OnceCell<Vec<PlaceCandidate>>>>>,
    names: Mutex<HashMap<CoordKey, Arc<OnceCell<String>>>>,
}

impl LocationResolver {
    pub fn new(forward: Box<dyn ForwardGeocoder>, reverse: Box<dyn ReverseGeocoder>) -> Self {
        Self {
            forward,
            reverse,
            searches: Mutex::new(HashMap::new()),
            names: Mutex::new(HashMap::new()),
        }
    }

    /// Resolver backed by Open-Meteo (search) and Nominatim (reverse).
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Box::new(OpenMeteoGeocoder::new(config)?),
            Box::new(NominatimGeocoder::new(config)?),
        ))
    }

    /// Candidates for `query`, in provider relevance order. Never empty on success.
    pub async fn forward_search(&self, query: &str) -> Result<Vec<PlaceCandidate>> {
        let query = query.trim();
        let key = query.to_lowercase();

        let cell = self.searches.lock().entry(key.clone()).or_default().clone();
        if let Some(hit) = cell.get() {
            tracing::debug!(query, "forward geocode cache hit");
            return Ok(hit.clone());
        }

        let candidates = cell
            .get_or_try_init(|| async {
                let places = self.forward.search(query).await?;
                if places.is_empty() {
                    return Err(Error::NotFound(query.to_string()));
                }
                Ok(places.into_iter().map(PlaceCandidate::from).collect::<Vec<_>>())
            })
            .await;

        match candidates {
            Ok(candidates) => Ok(candidates.clone()),
            Err(e) => {
                forget_unfilled(&self.searches, &key, &cell);
                Err(e)
            }
        }
    }

    /// Human-readable name for a position. Never fails; falls back to
    /// [`FALLBACK_PLACE_LABEL`].
    pub async fn reverse_lookup(&self, coordinates: Coordinates) -> String {
        let key = coord_key(coordinates);
        let cell = self.names.lock().entry(key).or_default().clone();

        let named = cell
            .get_or_try_init(|| async {
                let place = self.reverse.reverse(coordinates).await?;
                Ok::<_, Error>(place.short_name().unwrap_or_else(|| FALLBACK_PLACE_LABEL.to_string()))
            })
            .await;

        match named {
            Ok(name) => name.clone(),
            Err(e) => {
                forget_unfilled(&self.names, &key, &cell);
                tracing::warn!(%coordinates, error = %e, "reverse geocoding failed");
                FALLBACK_PLACE_LABEL.to_string()
            }
        }
    }

    /// Manual submit: an exact name match or a lone candidate is selected,
    /// anything else is handed back for the user to choose from.
    pub async fn resolve_query(&self, query: &str) -> Result<Resolution> {
        let candidates = self.forward_search(query).await?;
        let wanted = query.trim().to_lowercase();

        if let Some(exact) = candidates.iter().find(|c| c.display_name.to_lowercase() == wanted) {
            return Ok(Resolution::Selected(exact.clone()));
        }

        match <[PlaceCandidate; 1]>::try_from(candidates) {
            Ok([only]) => Ok(Resolution::Selected(only)),
            Err(all) => Ok(Resolution::Ambiguous(all)),
        }
    }

    /// Device position, named.
    pub async fn locate(&self, geolocator: &dyn Geolocator) -> Result<PlaceCandidate> {
        let coordinates = geolocator.current_position().await?;
        let display_name = self.reverse_lookup(coordinates).await;
        Ok(PlaceCandidate { coordinates, display_name })
    }
}

/// Drops a memo slot whose lookup failed, unless another caller has since
/// filled it or replaced it with a fresh slot.
fn forget_unfilled<K: Eq + Hash, V>(
    memo: &Mutex<HashMap<K, Arc<OnceCell<V>>>>,
    key: &K,
    cell: &Arc<OnceCell<V>>,
) {
    let mut memo = memo.lock();
    if memo.get(key).is_some_and(|slot| Arc::ptr_eq(slot, cell) && !slot.initialized()) {
        memo.remove(key);
    }
}
