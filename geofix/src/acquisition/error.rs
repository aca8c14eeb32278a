//! Acquisition outcome types.

use thiserror::Error;

use crate::fix::Fix;
use crate::policy::AcquisitionMode;

/// Terminal acquisition failure.
///
/// Reported verbatim to the caller; the engine never retries internally.
/// Quick mode never produces `AccuracyTooLow`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    /// The platform refused access to the sensor.
    #[error("Location permission denied. Allow location access in your settings, then try again.")]
    PermissionDenied,

    /// The device has no positioning capability.
    #[error("Location is not supported on this device.")]
    CapabilityUnavailable,

    /// The single-shot read did not answer in time.
    #[error("Timed out waiting for a location fix.")]
    Timeout,

    /// No sample arrived during the whole sampling window.
    #[error("No GPS samples received. Move outdoors and enable Precise Location, then try again.")]
    NoSignal,

    /// Best fix is worse than the Full profile's hard max.
    #[error(
        "GPS not accurate enough (best ±{best_accuracy_m:.0} m). Step outside, wait ~15s, \
         make sure Precise Location is on, then try again."
    )]
    AccuracyTooLow { best_accuracy_m: f64 },

    /// The caller cancelled the acquisition.
    #[error("Location capture cancelled.")]
    Cancelled,

    /// Another acquisition is already running on this engine.
    #[error("A location capture is already in progress.")]
    Busy,
}

/// Successful acquisition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquiredFix {
    /// The selected fix.
    pub fix: Fix,
    /// Quick-mode result worse than the soft threshold.
    pub coarse: bool,
    /// Mode of the policy that produced it.
    pub mode: AcquisitionMode,
    /// Samples received before resolution.
    pub samples: usize,
}

impl AcquiredFix {
    /// Accuracy of the selected fix in meters.
    pub fn accuracy_m(&self) -> f64 {
        self.fix.accuracy_m()
    }
}

/// Outcome of one `acquire` call.
pub type AcquisitionResult = Result<AcquiredFix, AcquisitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_too_low_message_rounds() {
        let err = AcquisitionError::AccuracyTooLow {
            best_accuracy_m: 90.4,
        };
        assert!(err.to_string().contains("best ±90 m"));
    }

    #[test]
    fn test_no_signal_message() {
        assert!(AcquisitionError::NoSignal
            .to_string()
            .contains("No GPS samples received"));
    }
}
