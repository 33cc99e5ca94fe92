//! Geographic coordinates and platform fixes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Base URL used to build map links in alert messages.
pub const DEFAULT_MAPS_BASE_URL: &str = "https://www.google.com/maps";

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, `-90..=90`.
    pub lat: f64,
    /// Longitude in degrees, `-180..=180`.
    pub lng: f64,
}

impl Location {
    /// Creates a location without validating the range.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Creates a location, rejecting out-of-range or non-finite coordinates.
    pub fn checked(lat: f64, lng: f64) -> crate::Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(crate::Error::InvalidInput(format!(
                "latitude out of range: {lat}"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(crate::Error::InvalidInput(format!(
                "longitude out of range: {lng}"
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Builds a map link pointing at this location.
    ///
    /// ```rust
    /// use haven::Location;
    ///
    /// let link = Location::new(12.83, 77.65).maps_link("https://www.google.com/maps");
    /// assert_eq!(link, "https://www.google.com/maps?q=12.83,77.65");
    /// ```
    #[must_use]
    pub fn maps_link(&self, base_url: &str) -> String {
        format!("{}?q={},{}", base_url.trim_end_matches('/'), self.lat, self.lng)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// A single fix reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// The coordinates.
    pub location: Location,
    /// Horizontal accuracy in metres, if reported.
    pub accuracy: Option<f64>,
    /// When the fix was taken (Unix epoch milliseconds).
    pub timestamp_ms: u64,
}

impl LocationSample {
    /// Creates a sample stamped with the current time.
    #[must_use]
    pub fn now(location: Location) -> Self {
        Self {
            location,
            accuracy: None,
            timestamp_ms: crate::current_timestamp_millis(),
        }
    }

    /// Sets the reported accuracy.
    #[must_use]
    pub const fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// Failure to obtain a fix from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user or OS refused location access.
    #[error("location permission denied")]
    PermissionDenied,
    /// The platform could not produce a position.
    #[error("position unavailable: {0}")]
    Unavailable(String),
    /// No fix arrived before the deadline.
    #[error("location request timed out")]
    Timeout,
}
