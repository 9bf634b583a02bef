//! Device position acquisition.
//!
//! Failures here are never retried automatically; they are turned into guidance
//! text and the user decides what to do next (usually type a place name instead).

use async_trait::async_trait;
use std::fmt::Debug;

use crate::model::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    Denied,
    #[error("Location service unavailable")]
    Unavailable,
    #[error("Location request timed out")]
    Timeout,
}

impl GeolocationError {
    /// User-facing hint for what to do about the failure.
    pub fn guidance(&self) -> &'static str {
        match self {
            GeolocationError::Denied => {
                "Access to your location was refused. Allow location access in your settings to use this feature."
            }
            GeolocationError::Unavailable => {
                "Couldn't get your position. Check that location is enabled on your device, or enter a place name instead."
            }
            GeolocationError::Timeout => {
                "The location request timed out. Check your connection and try again."
            }
        }
    }
}

#[async_trait]
pub trait Geolocator: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// Reports a fixed, configured position; `None` means the device has no fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredPosition {
    position: Option<Coordinates>,
}

impl ConfiguredPosition {
    pub fn new(position: Option<Coordinates>) -> Self {
        Self { position }
    }
}

#[async_trait]
impl Geolocator for ConfiguredPosition {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        self.position.ok_or(GeolocationError::Unavailable)
    }
}
