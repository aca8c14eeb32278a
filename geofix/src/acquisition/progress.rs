//! Progress snapshots published while an acquisition runs.

use std::fmt;
use std::time::Duration;

use super::error::AcquisitionResult;
use super::state::AcquisitionPhase;
use crate::policy::AcquisitionMode;

/// Point-in-time view of an acquisition.
///
/// Published on the engine's progress channel after every event, so a
/// receiver always sees the latest sample count and best accuracy.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionProgress {
    pub mode: AcquisitionMode,
    pub phase: AcquisitionPhase,
    pub samples: usize,
    /// Accuracy of the best fix so far, in meters.
    pub best_accuracy_m: Option<f64>,
    pub elapsed: Duration,
    /// Set once the phase is `Resolved`.
    pub outcome: Option<AcquisitionResult>,
}

impl AcquisitionProgress {
    /// Snapshot of an engine that has not started yet.
    pub fn idle(mode: AcquisitionMode) -> Self {
        Self {
            mode,
            phase: AcquisitionPhase::Idle,
            samples: 0,
            best_accuracy_m: None,
            elapsed: Duration::ZERO,
            outcome: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == AcquisitionPhase::Resolved
    }

    /// One-line human-readable status.
    pub fn status_line(&self) -> String {
        match (self.phase, &self.outcome) {
            (AcquisitionPhase::Idle, _) => "Ready".to_string(),
            (AcquisitionPhase::Preflight, _) => "Waiting for location permission…".to_string(),
            (AcquisitionPhase::Sampling, _) => match self.best_accuracy_m {
                Some(best) => format!(
                    "Capturing {} fix… {} sample{}, best ±{:.0} m",
                    self.mode,
                    self.samples,
                    if self.samples == 1 { "" } else { "s" },
                    best
                ),
                None => format!("Capturing {} fix… waiting for first sample", self.mode),
            },
            (AcquisitionPhase::Resolved, Some(Ok(acquired))) if acquired.coarse => {
                format!("Coarse fix ±{:.0} m", acquired.accuracy_m())
            }
            (AcquisitionPhase::Resolved, Some(Ok(acquired))) => {
                format!("Fix ±{:.0} m", acquired.accuracy_m())
            }
            (AcquisitionPhase::Resolved, Some(Err(error))) => error.to_string(),
            (AcquisitionPhase::Resolved, None) => "Done".to_string(),
        }
    }
}

impl fmt::Display for AcquisitionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}
