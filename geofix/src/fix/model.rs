//! The `Fix` value type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Accuracy assigned to readings that arrive without a usable accuracy value.
///
/// Large enough to lose against any real reading, small enough to stay finite
/// so the fix remains a valid (if poor) candidate when nothing else arrives.
pub const MISSING_ACCURACY_M: f64 = 99_999.0;

/// Errors raised when a reading cannot be turned into a [`Fix`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixError {
    /// Latitude outside -90..=90 or not finite.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside -180..=180 or not finite.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Accuracy negative or not finite.
    #[error("Invalid accuracy: {0} m (must be finite and non-negative)")]
    InvalidAccuracy(f64),
}

/// One resolved coordinate reading with its accuracy radius.
///
/// Immutable once constructed. The constructors guarantee that the
/// coordinates are in range and that the accuracy is finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Fix {
    latitude: f64,
    longitude: f64,
    accuracy_m: f64,
    captured_at: DateTime<Utc>,
}

impl Fix {
    /// Create a fix captured now.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Result<Self, FixError> {
        Self::at(latitude, longitude, accuracy_m, Utc::now())
    }

    /// Create a fix with an explicit capture time.
    pub fn at(
        latitude: f64,
        longitude: f64,
        accuracy_m: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, FixError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FixError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(FixError::InvalidLongitude(longitude));
        }
        if !accuracy_m.is_finite() || accuracy_m < 0.0 {
            return Err(FixError::InvalidAccuracy(accuracy_m));
        }

        Ok(Self {
            latitude,
            longitude,
            accuracy_m,
            captured_at,
        })
    }

    /// Create a fix from a raw platform reading.
    ///
    /// Platforms sometimes omit the accuracy or report garbage for it. Such
    /// readings get [`MISSING_ACCURACY_M`] so they can never improve a fix
    /// that is already held. Coordinates are still validated.
    pub fn from_reading(
        latitude: f64,
        longitude: f64,
        accuracy_m: Option<f64>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, FixError> {
        let accuracy_m = accuracy_m
            .filter(|acc| acc.is_finite() && *acc >= 0.0)
            .unwrap_or(MISSING_ACCURACY_M);
        Self::at(latitude, longitude, accuracy_m, captured_at)
    }

    /// Latitude in degrees (-90 to 90).
    #[inline]
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees (-180 to 180).
    #[inline]
    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Estimated error radius in meters (lower is better).
    #[inline]
    pub fn accuracy_m(&self) -> f64 {
        self.accuracy_m
    }

    /// When the platform captured this reading.
    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns true if this fix is strictly more accurate than `other`.
    #[inline]
    pub fn is_better_than(&self, other: &Fix) -> bool {
        self.accuracy_m < other.accuracy_m
    }

    /// Returns true if the accuracy came from the missing-accuracy sentinel.
    pub fn has_unknown_accuracy(&self) -> bool {
        self.accuracy_m >= MISSING_ACCURACY_M
    }
}

impl std::fmt::Display for Fix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.6}, {:.6} (±{:.0} m)",
            self.latitude, self.longitude, self.accuracy_m
        )
    }
}
