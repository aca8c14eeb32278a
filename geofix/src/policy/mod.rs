//! Acquisition policy profiles.
//!
//! Two canonical profiles trade accuracy against latency:
//!
//! | Profile | Max wait | Target | Hard max | Fallback | Beyond hard max |
//! |---------|----------|--------|----------|----------|-----------------|
//! | Full    | 30 s     | 20 m   | 80 m     | 12 s     | `AccuracyTooLow` error |
//! | Quick   | 5 s      | -      | 100 m    | 5 s      | coarse result |
//!
//! Full is for survey-grade records: it accepts early once the target is
//! met and fails outright when the best fix is still too poor. Quick is for
//! fast field entry: it never fails on accuracy and instead flags the result
//! as coarse so it can be corrected later.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use geofix::policy::{AcquisitionMode, AcquisitionPolicy};
//!
//! let policy = AcquisitionPolicy::full()
//!     .with_max_wait(Duration::from_secs(45))
//!     .unwrap();
//! assert_eq!(policy.mode(), AcquisitionMode::Full);
//!
//! // Hard max below target is rejected
//! assert!(AcquisitionPolicy::full().with_hard_max_accuracy_m(10.0).is_err());
//! ```

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Full profile: maximum time spent sampling.
pub const FULL_MAX_WAIT: Duration = Duration::from_secs(30);

/// Full profile: accuracy that triggers early acceptance.
pub const FULL_TARGET_ACCURACY_M: f64 = 20.0;

/// Full profile: worst accuracy accepted at the deadline.
pub const FULL_HARD_MAX_ACCURACY_M: f64 = 80.0;

/// Full profile: timeout of the one-shot fallback read.
pub const FULL_FALLBACK_TIMEOUT: Duration = Duration::from_secs(12);

/// Quick profile: maximum time spent sampling.
pub const QUICK_MAX_WAIT: Duration = Duration::from_secs(5);

/// Quick profile: accuracy above which results are coarse.
pub const QUICK_SOFT_ACCURACY_M: f64 = 100.0;

/// Timeout of the one-shot read used to surface the permission dialog.
pub const DEFAULT_PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(10);

/// Extra time after the deadline for in-flight readings to land.
pub const DEFAULT_DEADLINE_GRACE: Duration = Duration::from_millis(500);

/// Longest accepted max wait, preflight timeout or deadline grace.
pub const MAX_POLICY_DURATION: Duration = Duration::from_secs(60 * 60);

/// Invalid policy parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A duration is longer than [`MAX_POLICY_DURATION`].
    #[error("{name} must not exceed {max:?} (got {value:?})")]
    DurationTooLong {
        name: &'static str,
        value: Duration,
        max: Duration,
    },

    /// An accuracy threshold is not a positive finite number.
    #[error("{name} must be a positive number of meters (got {value})")]
    InvalidAccuracy { name: &'static str, value: f64 },

    /// Hard max is tighter than the target.
    #[error("hard max accuracy ({hard_max_m} m) must not be below target accuracy ({target_m} m)")]
    HardMaxBelowTarget { target_m: f64, hard_max_m: f64 },

    /// Fallback read would outlive the acquisition.
    #[error("fallback timeout ({fallback:?}) must not exceed max wait ({max_wait:?})")]
    FallbackExceedsMaxWait {
        fallback: Duration,
        max_wait: Duration,
    },

    /// Single-shot short-circuit requested outside Quick mode.
    #[error("single-shot acquisition is only available in quick mode")]
    SingleShotRequiresQuick,
}

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionMode {
    /// Precision first: early accept at target, hard failure beyond hard max.
    Full,
    /// Latency first: degrade to a coarse result instead of failing.
    Quick,
}

impl AcquisitionMode {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Quick => "quick",
        }
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "quick" => Ok(Self::Quick),
            other => Err(format!("unknown acquisition mode '{}'", other)),
        }
    }
}

/// Thresholds and timeouts for one acquisition.
///
/// Always valid: every constructor and `with_*` method re-checks the
/// invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionPolicy {
    mode: AcquisitionMode,
    max_wait: Duration,
    target_accuracy_m: f64,
    hard_max_accuracy_m: f64,
    fallback_timeout: Duration,
    preflight_timeout: Duration,
    deadline_grace: Duration,
    single_shot: bool,
}

impl AcquisitionPolicy {
    /// Create a validated policy with default preflight timeout and grace.
    pub fn new(
        mode: AcquisitionMode,
        max_wait: Duration,
        target_accuracy_m: f64,
        hard_max_accuracy_m: f64,
        fallback_timeout: Duration,
    ) -> Result<Self, PolicyError> {
        Self {
            mode,
            max_wait,
            target_accuracy_m,
            hard_max_accuracy_m,
            fallback_timeout,
            preflight_timeout: DEFAULT_PREFLIGHT_TIMEOUT,
            deadline_grace: DEFAULT_DEADLINE_GRACE,
            single_shot: false,
        }
        .validated()
    }

    /// Canonical Full profile.
    pub fn full() -> Self {
        Self {
            mode: AcquisitionMode::Full,
            max_wait: FULL_MAX_WAIT,
            target_accuracy_m: FULL_TARGET_ACCURACY_M,
            hard_max_accuracy_m: FULL_HARD_MAX_ACCURACY_M,
            fallback_timeout: FULL_FALLBACK_TIMEOUT,
            preflight_timeout: DEFAULT_PREFLIGHT_TIMEOUT,
            deadline_grace: DEFAULT_DEADLINE_GRACE,
            single_shot: false,
        }
    }

    /// Canonical Quick profile (single-shot).
    ///
    /// Quick has no early-accept target of its own; the target is pinned to
    /// the soft threshold so the hard max >= target invariant holds.
    pub fn quick() -> Self {
        Self {
            mode: AcquisitionMode::Quick,
            max_wait: QUICK_MAX_WAIT,
            target_accuracy_m: QUICK_SOFT_ACCURACY_M,
            hard_max_accuracy_m: QUICK_SOFT_ACCURACY_M,
            fallback_timeout: QUICK_MAX_WAIT,
            preflight_timeout: DEFAULT_PREFLIGHT_TIMEOUT,
            deadline_grace: DEFAULT_DEADLINE_GRACE,
            single_shot: true,
        }
    }

    /// Canonical profile for a mode.
    pub fn for_mode(mode: AcquisitionMode) -> Self {
        match mode {
            AcquisitionMode::Full => Self::full(),
            AcquisitionMode::Quick => Self::quick(),
        }
    }

    fn validated(self) -> Result<Self, PolicyError> {
        if self.max_wait.is_zero() {
            return Err(PolicyError::ZeroDuration("max wait"));
        }
        if self.fallback_timeout.is_zero() {
            return Err(PolicyError::ZeroDuration("fallback timeout"));
        }
        if self.preflight_timeout.is_zero() {
            return Err(PolicyError::ZeroDuration("preflight timeout"));
        }
        check_duration("max wait", self.max_wait)?;
        check_duration("preflight timeout", self.preflight_timeout)?;
        check_duration("deadline grace", self.deadline_grace)?;
        check_accuracy("target accuracy", self.target_accuracy_m)?;
        check_accuracy("hard max accuracy", self.hard_max_accuracy_m)?;
        if self.hard_max_accuracy_m < self.target_accuracy_m {
            return Err(PolicyError::HardMaxBelowTarget {
                target_m: self.target_accuracy_m,
                hard_max_m: self.hard_max_accuracy_m,
            });
        }
        if self.fallback_timeout > self.max_wait {
            return Err(PolicyError::FallbackExceedsMaxWait {
                fallback: self.fallback_timeout,
                max_wait: self.max_wait,
            });
        }
        if self.single_shot && self.mode != AcquisitionMode::Quick {
            return Err(PolicyError::SingleShotRequiresQuick);
        }
        Ok(self)
    }

    /// Set the maximum sampling time.
    ///
    /// The fallback timeout is clamped down to the new max wait.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Result<Self, PolicyError> {
        self.max_wait = max_wait;
        self.fallback_timeout = self.fallback_timeout.min(max_wait);
        self.validated()
    }

    /// Set the early-accept accuracy.
    pub fn with_target_accuracy_m(mut self, target: f64) -> Result<Self, PolicyError> {
        self.target_accuracy_m = target;
        self.validated()
    }

    /// Set the hard max (Full) or soft threshold (Quick).
    pub fn with_hard_max_accuracy_m(mut self, hard_max: f64) -> Result<Self, PolicyError> {
        self.hard_max_accuracy_m = hard_max;
        self.validated()
    }

    /// Set the Quick soft threshold, clamping the target to it.
    pub fn with_soft_accuracy_m(mut self, soft: f64) -> Result<Self, PolicyError> {
        self.hard_max_accuracy_m = soft;
        self.target_accuracy_m = self.target_accuracy_m.min(soft);
        self.validated()
    }

    /// Set the one-shot fallback timeout.
    pub fn with_fallback_timeout(mut self, timeout: Duration) -> Result<Self, PolicyError> {
        self.fallback_timeout = timeout;
        self.validated()
    }

    /// Set the permission-dialog preflight timeout.
    pub fn with_preflight_timeout(mut self, timeout: Duration) -> Result<Self, PolicyError> {
        self.preflight_timeout = timeout;
        self.validated()
    }

    /// Set the grace period after the deadline.
    pub fn with_deadline_grace(mut self, grace: Duration) -> Result<Self, PolicyError> {
        self.deadline_grace = grace;
        self.validated()
    }

    /// Enable or disable the Quick single-shot short-circuit.
    pub fn with_single_shot(mut self, single_shot: bool) -> Result<Self, PolicyError> {
        self.single_shot = single_shot;
        self.validated()
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn target_accuracy_m(&self) -> f64 {
        self.target_accuracy_m
    }

    pub fn hard_max_accuracy_m(&self) -> f64 {
        self.hard_max_accuracy_m
    }

    pub fn fallback_timeout(&self) -> Duration {
        self.fallback_timeout
    }

    pub fn preflight_timeout(&self) -> Duration {
        self.preflight_timeout
    }

    pub fn deadline_grace(&self) -> Duration {
        self.deadline_grace
    }

    pub fn single_shot(&self) -> bool {
        self.single_shot
    }

    /// Quick mode's coarse threshold (same value as the hard max).
    pub fn soft_threshold_m(&self) -> f64 {
        self.hard_max_accuracy_m
    }

    /// Whether reaching the target ends sampling early.
    pub fn early_accept(&self) -> bool {
        self.mode == AcquisitionMode::Full
    }

    /// Timeout for the one-shot read raced against the stream.
    pub fn one_shot_timeout(&self) -> Duration {
        self.fallback_timeout.min(self.max_wait)
    }

    /// Time from sampling start until the deadline fires.
    pub fn deadline(&self) -> Duration {
        self.max_wait.saturating_add(self.deadline_grace)
    }

    /// Whether a fix with this accuracy is reported as coarse.
    pub fn is_coarse(&self, accuracy_m: f64) -> bool {
        self.mode == AcquisitionMode::Quick && accuracy_m > self.soft_threshold_m()
    }
}

fn check_duration(name: &'static str, value: Duration) -> Result<(), PolicyError> {
    if value <= MAX_POLICY_DURATION {
        Ok(())
    } else {
        Err(PolicyError::DurationTooLong {
            name,
            value,
            max: MAX_POLICY_DURATION,
        })
    }
}

fn check_accuracy(name: &'static str, value: f64) -> Result<(), PolicyError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PolicyError::InvalidAccuracy { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_profile_values() {
        let policy = AcquisitionPolicy::full();
        assert_eq!(policy.mode(), AcquisitionMode::Full);
        assert_eq!(policy.max_wait(), Duration::from_secs(30));
        assert_eq!(policy.target_accuracy_m(), 20.0);
        assert_eq!(policy.hard_max_accuracy_m(), 80.0);
        assert_eq!(policy.fallback_timeout(), Duration::from_secs(12));
        assert!(policy.early_accept());
        assert!(!policy.single_shot());
        assert_eq!(policy.clone().validated(), Ok(policy));
    }

    #[test]
    fn test_quick_profile_values() {
        let policy = AcquisitionPolicy::quick();
        assert_eq!(policy.mode(), AcquisitionMode::Quick);
        assert_eq!(policy.max_wait(), Duration::from_secs(5));
        assert_eq!(policy.soft_threshold_m(), 100.0);
        assert!(!policy.early_accept());
        assert!(policy.single_shot());
        assert_eq!(policy.clone().validated(), Ok(policy));
    }

    #[test]
    fn test_derived_timings() {
        let policy = AcquisitionPolicy::full();
        assert_eq!(policy.one_shot_timeout(), Duration::from_secs(12));
        assert_eq!(policy.deadline(), Duration::from_millis(30_500));
        assert_eq!(policy.preflight_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_coarse_only_in_quick_mode() {
        let quick = AcquisitionPolicy::quick();
        assert!(quick.is_coarse(150.0));
        assert!(!quick.is_coarse(100.0));
        assert!(!quick.is_coarse(40.0));

        let full = AcquisitionPolicy::full();
        assert!(!full.is_coarse(150.0));
    }

    #[test]
    fn test_rejects_hard_max_below_target() {
        let err = AcquisitionPolicy::new(
            AcquisitionMode::Full,
            Duration::from_secs(30),
            50.0,
            40.0,
            Duration::from_secs(10),
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::HardMaxBelowTarget { .. }));
    }

    #[test]
    fn test_rejects_zero_durations() {
        assert_eq!(
            AcquisitionPolicy::full().with_max_wait(Duration::ZERO),
            Err(PolicyError::ZeroDuration("max wait"))
        );
        assert_eq!(
            AcquisitionPolicy::full().with_fallback_timeout(Duration::ZERO),
            Err(PolicyError::ZeroDuration("fallback timeout"))
        );
        assert_eq!(
            AcquisitionPolicy::full().with_preflight_timeout(Duration::ZERO),
            Err(PolicyError::ZeroDuration("preflight timeout"))
        );
    }

    #[test]
    fn test_rejects_unbounded_durations() {
        let huge = Duration::from_secs(u64::MAX);
        assert!(matches!(
            AcquisitionPolicy::full().with_max_wait(huge),
            Err(PolicyError::DurationTooLong { name: "max wait", .. })
        ));
        assert!(matches!(
            AcquisitionPolicy::full().with_preflight_timeout(huge),
            Err(PolicyError::DurationTooLong { name: "preflight timeout", .. })
        ));
        assert!(matches!(
            AcquisitionPolicy::full().with_deadline_grace(huge),
            Err(PolicyError::DurationTooLong { name: "deadline grace", .. })
        ));

        let longest = AcquisitionPolicy::full()
            .with_max_wait(MAX_POLICY_DURATION)
            .unwrap()
            .with_deadline_grace(MAX_POLICY_DURATION)
            .unwrap();
        assert_eq!(longest.deadline(), MAX_POLICY_DURATION * 2);
    }

    #[test]
    fn test_zero_grace_allowed() {
        let policy = AcquisitionPolicy::full()
            .with_deadline_grace(Duration::ZERO)
            .unwrap();
        assert_eq!(policy.deadline(), policy.max_wait());
    }

    #[test]
    fn test_rejects_fallback_longer_than_max_wait() {
        let err = AcquisitionPolicy::full()
            .with_fallback_timeout(Duration::from_secs(31))
            .unwrap_err();
        assert!(matches!(err, PolicyError::FallbackExceedsMaxWait { .. }));
    }

    #[test]
    fn test_max_wait_clamps_fallback() {
        let policy = AcquisitionPolicy::full()
            .with_max_wait(Duration::from_secs(8))
            .unwrap();
        assert_eq!(policy.fallback_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn test_rejects_bad_accuracy() {
        assert!(matches!(
            AcquisitionPolicy::full().with_target_accuracy_m(f64::NAN),
            Err(PolicyError::InvalidAccuracy { .. })
        ));
        assert!(matches!(
            AcquisitionPolicy::full().with_target_accuracy_m(0.0),
            Err(PolicyError::InvalidAccuracy { .. })
        ));
    }

    #[test]
    fn test_single_shot_requires_quick() {
        assert_eq!(
            AcquisitionPolicy::full().with_single_shot(true),
            Err(PolicyError::SingleShotRequiresQuick)
        );
        let streaming_quick = AcquisitionPolicy::quick().with_single_shot(false).unwrap();
        assert!(!streaming_quick.single_shot());
    }

    #[test]
    fn test_soft_threshold_clamps_target() {
        let policy = AcquisitionPolicy::quick()
            .with_soft_accuracy_m(60.0)
            .unwrap();
        assert_eq!(policy.soft_threshold_m(), 60.0);
        assert_eq!(policy.target_accuracy_m(), 60.0);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Full".parse(), Ok(AcquisitionMode::Full));
        assert_eq!("quick".parse(), Ok(AcquisitionMode::Quick));
        assert!("precise".parse::<AcquisitionMode>().is_err());
        assert_eq!(AcquisitionMode::Quick.to_string(), "quick");
    }
}
