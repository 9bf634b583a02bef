use thiserror::Error;

use crate::location::GeolocationError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Forward geocoding matched nothing.
    #[error("No place matches '{0}'")]
    NotFound(String),

    /// Network failure or non-success HTTP status.
    #[error("{endpoint} request failed: {reason}")]
    Transport { endpoint: &'static str, reason: String },

    /// Success status, but the body is unparseable or lacks a required field.
    #[error("{endpoint} returned an unusable response: {reason}")]
    MalformedResponse { endpoint: &'static str, reason: String },

    #[error("Coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Duration must be a positive number of minutes")]
    InvalidDuration,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
}

impl Error {
    pub(crate) fn transport(endpoint: &'static str, reason: impl ToString) -> Self {
        Self::Transport { endpoint, reason: reason.to_string() }
    }

    pub(crate) fn malformed(endpoint: &'static str, reason: impl ToString) -> Self {
        Self::MalformedResponse { endpoint, reason: reason.to_string() }
    }

    /// Failures the forecast pipeline is allowed to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::MalformedResponse { .. })
    }
}

/// Shorten a response body so it can be quoted in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }

    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
