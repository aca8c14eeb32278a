//! Sample source errors.

use thiserror::Error;

/// Failure of a single sensor request.
///
/// None of these are fatal on their own; the acquisition engine decides the
/// overall outcome once every path has been exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// No reading arrived within the requested timeout.
    #[error("Location request timed out")]
    Timeout,

    /// The sensor could not produce a reading (absent, disconnected, failed).
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    /// The platform refused access to the sensor.
    #[error("Location permission denied")]
    Denied,

    /// The request was cancelled before it resolved.
    #[error("Location request cancelled")]
    Cancelled,
}

impl SampleError {
    /// Returns true for a permission refusal.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied)
    }
}
