//! Core library for the `raincheck` CLI.
//!
//! This crate defines:
//! - Place resolution (forward search, reverse naming) with in-memory caches
//! - The forecast client and the rain-risk classifier
//! - A deterministic offline fallback estimate
//! - The retrying forecast pipeline that ties them together
//!
//! It is used by `raincheck-cli`, but can also be reused by other front-ends.

pub mod config;
pub mod error;
pub mod fallback;
pub mod forecast;
pub mod geocode;
mod http;
pub mod location;
pub mod model;
pub mod pipeline;
pub mod risk;

pub use config::{Config, RetryPolicy};
pub use error::{Error, Result};
pub use forecast::ForecastClient;
pub use geocode::{LocationResolver, Resolution};
pub use location::{ConfiguredPosition, GeolocationError, Geolocator};
pub use model::{
    Coordinates, DurationMinutes, ForecastResult, ForecastSource, PlaceCandidate, RiskTier,
};
pub use pipeline::{Clock, ForecastPipeline, SystemClock};
