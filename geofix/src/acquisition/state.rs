//! Acquisition state machine.
//!
//! The machine is synchronous and does no I/O: the engine turns sensor
//! callbacks, timers and cancellation into [`AcquisitionEvent`]s and feeds
//! them in one at a time. That keeps every decision in one place and makes
//! the protocol testable without a runtime.
//!
//! ```text
//!           begin()
//! Idle ───────────────► Preflight ──(prompt answered)──┐
//!   │                      │                           ▼
//!   │                      └──(denied)──► Resolved ◄── Sampling
//!   └──(no prompt needed)───────────────────────────────▲
//! ```
//!
//! Once `Resolved`, every further event is ignored.

use tracing::{debug, warn};

use super::error::{AcquiredFix, AcquisitionError, AcquisitionResult};
use super::progress::AcquisitionProgress;
use crate::fix::{BestFixSelector, Fix};
use crate::permission::PermissionState;
use crate::policy::{AcquisitionMode, AcquisitionPolicy};
use crate::source::SampleError;

/// Lifecycle phase of one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionPhase {
    /// Not started.
    Idle,
    /// Waiting for the permission dialog to be answered.
    Preflight,
    /// Sensor requests in flight.
    Sampling,
    /// Outcome decided.
    Resolved,
}

/// How sampling is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingPlan {
    /// Stream, one-shot fallback and deadline raced together.
    Race,
    /// Quick-mode single one-shot read, no deadline fallback.
    SingleShot,
}

/// What the engine must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Issue the permission-dialog one-shot.
    Preflight,
    /// Start sampling with the given plan.
    Sample(SamplingPlan),
    /// Keep waiting for events.
    Continue,
    /// Done; read the outcome.
    Resolved,
}

/// Something that happened during an acquisition.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionEvent {
    /// The preflight one-shot finished.
    PreflightResolved(Result<Fix, SampleError>),
    /// The stream produced a reading.
    StreamSample(Fix),
    /// The stream reported a non-fatal error.
    StreamError(SampleError),
    /// The stream finished.
    StreamEnded,
    /// The sampling one-shot finished.
    OneShotResolved(Result<Fix, SampleError>),
    /// The sampling deadline passed.
    DeadlineFired,
    /// The caller cancelled.
    Cancelled,
}

/// Decision logic for one `acquire` call.
#[derive(Debug)]
pub struct AcquisitionMachine {
    policy: AcquisitionPolicy,
    phase: AcquisitionPhase,
    plan: SamplingPlan,
    selector: BestFixSelector,
    stream_done: bool,
    one_shot_done: bool,
    denied_seen: bool,
    outcome: Option<AcquisitionResult>,
}

impl AcquisitionMachine {
    /// Create an idle machine.
    pub fn new(policy: AcquisitionPolicy) -> Self {
        let plan = if policy.single_shot() {
            SamplingPlan::SingleShot
        } else {
            SamplingPlan::Race
        };
        Self {
            policy,
            phase: AcquisitionPhase::Idle,
            plan,
            selector: BestFixSelector::new(),
            stream_done: false,
            one_shot_done: false,
            denied_seen: false,
            outcome: None,
        }
    }

    pub fn policy(&self) -> &AcquisitionPolicy {
        &self.policy
    }

    pub fn phase(&self) -> AcquisitionPhase {
        self.phase
    }

    /// Best fix folded so far.
    pub fn best(&self) -> Option<&Fix> {
        self.selector.best()
    }

    /// Samples folded so far.
    pub fn samples(&self) -> usize {
        self.selector.sample_count()
    }

    pub fn is_resolved(&self) -> bool {
        self.phase == AcquisitionPhase::Resolved
    }

    /// The decided outcome, if resolved.
    pub fn outcome(&self) -> Option<&AcquisitionResult> {
        self.outcome.as_ref()
    }

    /// Leave `Idle`.
    ///
    /// `available` is the source's capability check. Calling this on a
    /// machine that already started changes nothing.
    pub fn begin(&mut self, permission: PermissionState, available: bool) -> Step {
        if self.phase != AcquisitionPhase::Idle {
            return self.current_step();
        }

        self.phase = AcquisitionPhase::Preflight;

        if !available {
            return self.resolve(Err(AcquisitionError::CapabilityUnavailable));
        }

        match permission {
            PermissionState::Denied => self.resolve(Err(AcquisitionError::PermissionDenied)),
            PermissionState::Prompt => {
                debug!("Permission undecided, surfacing the platform prompt");
                Step::Preflight
            }
            PermissionState::Granted | PermissionState::Unknown => self.enter_sampling(),
        }
    }

    /// Apply one event and return the next step.
    pub fn handle(&mut self, event: AcquisitionEvent) -> Step {
        if self.is_resolved() {
            debug!(?event, "Ignoring event after resolution");
            return Step::Resolved;
        }

        match (self.phase, event) {
            (_, AcquisitionEvent::Cancelled) => self.resolve(Err(AcquisitionError::Cancelled)),

            (AcquisitionPhase::Preflight, AcquisitionEvent::PreflightResolved(result)) => {
                match result {
                    Err(SampleError::Denied) => {
                        self.resolve(Err(AcquisitionError::PermissionDenied))
                    }
                    other => {
                        let accuracy_m = other.as_ref().map(|f| f.accuracy_m());
                        debug!(outcome = ?accuracy_m, "Preflight finished");
                        self.enter_sampling()
                    }
                }
            }

            (AcquisitionPhase::Sampling, event) => match self.plan {
                SamplingPlan::Race => self.handle_race(event),
                SamplingPlan::SingleShot => self.handle_single_shot(event),
            },

            (phase, event) => {
                debug!(?phase, ?event, "Event not expected in this phase");
                Step::Continue
            }
        }
    }

    /// Resolve by applying the deadline rule if nothing decided yet.
    ///
    /// Returns the final outcome; never leaves the machine unresolved.
    pub fn conclude(&mut self) -> AcquisitionResult {
        if !self.is_resolved() {
            self.settle(false);
        }
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => Err(AcquisitionError::NoSignal),
        }
    }

    /// Snapshot for progress reporting.
    pub fn progress(&self, elapsed: std::time::Duration) -> AcquisitionProgress {
        AcquisitionProgress {
            mode: self.policy.mode(),
            phase: self.phase,
            samples: self.samples(),
            best_accuracy_m: self.best().map(Fix::accuracy_m),
            elapsed,
            outcome: self.outcome.clone(),
        }
    }

    fn handle_race(&mut self, event: AcquisitionEvent) -> Step {
        match event {
            AcquisitionEvent::StreamSample(fix) => self.fold(fix),
            AcquisitionEvent::StreamError(error) => {
                warn!(error = %error, "Location stream error");
                self.denied_seen |= error.is_denied();
                Step::Continue
            }
            AcquisitionEvent::StreamEnded => {
                self.stream_done = true;
                self.check_exhausted()
            }
            AcquisitionEvent::OneShotResolved(result) => {
                self.one_shot_done = true;
                match result {
                    Ok(fix) => {
                        let step = self.fold(fix);
                        if step == Step::Resolved {
                            return step;
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "Fallback location request failed");
                        self.denied_seen |= error.is_denied();
                    }
                }
                self.check_exhausted()
            }
            AcquisitionEvent::DeadlineFired => self.settle(false),
            other => {
                debug!(event = ?other, "Event not expected while sampling");
                Step::Continue
            }
        }
    }

    fn handle_single_shot(&mut self, event: AcquisitionEvent) -> Step {
        match event {
            AcquisitionEvent::OneShotResolved(Ok(fix)) => {
                self.selector.offer(fix);
                let coarse = self.policy.is_coarse(fix.accuracy_m());
                self.accept(fix, coarse)
            }
            AcquisitionEvent::OneShotResolved(Err(error)) => {
                let mapped = match error {
                    SampleError::Timeout => AcquisitionError::Timeout,
                    SampleError::Unavailable(_) => AcquisitionError::CapabilityUnavailable,
                    SampleError::Denied => AcquisitionError::PermissionDenied,
                    SampleError::Cancelled => AcquisitionError::Cancelled,
                };
                self.resolve(Err(mapped))
            }
            other => {
                debug!(event = ?other, "Event not expected in single-shot mode");
                Step::Continue
            }
        }
    }

    fn fold(&mut self, fix: Fix) -> Step {
        if self.selector.offer(fix) {
            debug!(
                accuracy_m = fix.accuracy_m(),
                samples = self.samples(),
                "New best fix"
            );
        }

        let Some(best) = self.selector.best().copied() else {
            return Step::Continue;
        };

        if self.policy.early_accept() && best.accuracy_m() <= self.policy.target_accuracy_m() {
            return self.accept(best, false);
        }
        Step::Continue
    }

    fn check_exhausted(&mut self) -> Step {
        if self.stream_done && self.one_shot_done {
            debug!("All sampling paths exhausted before the deadline");
            self.settle(true)
        } else {
            Step::Continue
        }
    }

    /// Deadline rule.
    fn settle(&mut self, exhausted: bool) -> Step {
        let Some(best) = self.selector.best().copied() else {
            let error = if exhausted && self.denied_seen {
                AcquisitionError::PermissionDenied
            } else {
                AcquisitionError::NoSignal
            };
            return self.resolve(Err(error));
        };

        match self.policy.mode() {
            AcquisitionMode::Quick => {
                let coarse = self.policy.is_coarse(best.accuracy_m());
                self.accept(best, coarse)
            }
            AcquisitionMode::Full if best.accuracy_m() <= self.policy.hard_max_accuracy_m() => {
                self.accept(best, false)
            }
            AcquisitionMode::Full => self.resolve(Err(AcquisitionError::AccuracyTooLow {
                best_accuracy_m: best.accuracy_m(),
            })),
        }
    }

    fn accept(&mut self, fix: Fix, coarse: bool) -> Step {
        let acquired = AcquiredFix {
            fix,
            coarse,
            mode: self.policy.mode(),
            samples: self.samples(),
        };
        self.resolve(Ok(acquired))
    }

    fn enter_sampling(&mut self) -> Step {
        self.phase = AcquisitionPhase::Sampling;
        Step::Sample(self.plan)
    }

    fn resolve(&mut self, outcome: AcquisitionResult) -> Step {
        self.phase = AcquisitionPhase::Resolved;
        self.outcome = Some(outcome);
        Step::Resolved
    }

    fn current_step(&self) -> Step {
        match self.phase {
            AcquisitionPhase::Idle => Step::Continue,
            AcquisitionPhase::Preflight => Step::Preflight,
            AcquisitionPhase::Sampling => Step::Sample(self.plan),
            AcquisitionPhase::Resolved => Step::Resolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(accuracy: f64) -> Fix {
        Fix::new(-37.81, 144.96, accuracy).unwrap()
    }

    fn sampling(policy: AcquisitionPolicy) -> AcquisitionMachine {
        let mut machine = AcquisitionMachine::new(policy);
        assert!(matches!(
            machine.begin(PermissionState::Granted, true),
            Step::Sample(_)
        ));
        machine
    }

    fn streaming_quick() -> AcquisitionPolicy {
        AcquisitionPolicy::quick().with_single_shot(false).unwrap()
    }

    #[test]
    fn test_begin_routes_on_permission() {
        let mut granted = AcquisitionMachine::new(AcquisitionPolicy::full());
        assert_eq!(
            granted.begin(PermissionState::Granted, true),
            Step::Sample(SamplingPlan::Race)
        );
        assert_eq!(granted.phase(), AcquisitionPhase::Sampling);

        let mut unknown = AcquisitionMachine::new(AcquisitionPolicy::full());
        assert_eq!(
            unknown.begin(PermissionState::Unknown, true),
            Step::Sample(SamplingPlan::Race)
        );

        let mut prompt = AcquisitionMachine::new(AcquisitionPolicy::full());
        assert_eq!(prompt.begin(PermissionState::Prompt, true), Step::Preflight);
        assert_eq!(prompt.phase(), AcquisitionPhase::Preflight);

        let mut denied = AcquisitionMachine::new(AcquisitionPolicy::full());
        assert_eq!(denied.begin(PermissionState::Denied, true), Step::Resolved);
        assert_eq!(
            denied.outcome(),
            Some(&Err(AcquisitionError::PermissionDenied))
        );
    }

    #[test]
    fn test_begin_unavailable_capability() {
        let mut machine = AcquisitionMachine::new(AcquisitionPolicy::full());
        assert_eq!(machine.begin(PermissionState::Granted, false), Step::Resolved);
        assert_eq!(
            machine.outcome(),
            Some(&Err(AcquisitionError::CapabilityUnavailable))
        );
    }

    #[test]
    fn test_begin_twice_is_noop() {
        let mut machine = AcquisitionMachine::new(AcquisitionPolicy::full());
        machine.begin(PermissionState::Prompt, true);
        assert_eq!(machine.begin(PermissionState::Denied, true), Step::Preflight);
        assert!(!machine.is_resolved());
    }

    #[test]
    fn test_preflight_denied_resolves() {
        let mut machine = AcquisitionMachine::new(AcquisitionPolicy::full());
        machine.begin(PermissionState::Prompt, true);
        let step = machine.handle(AcquisitionEvent::PreflightResolved(Err(SampleError::Denied)));
        assert_eq!(step, Step::Resolved);
        assert_eq!(
            machine.outcome(),
            Some(&Err(AcquisitionError::PermissionDenied))
        );
    }

    #[test]
    fn test_preflight_timeout_and_success_proceed() {
        for result in [Err(SampleError::Timeout), Ok(fix(5.0))] {
            let mut machine = AcquisitionMachine::new(AcquisitionPolicy::full());
            machine.begin(PermissionState::Prompt, true);
            let step = machine.handle(AcquisitionEvent::PreflightResolved(result));
            assert_eq!(step, Step::Sample(SamplingPlan::Race));
            // The preflight reading is discarded
            assert_eq!(machine.samples(), 0);
        }
    }

    #[test]
    fn test_full_early_accept() {
        let mut machine = sampling(AcquisitionPolicy::full());
        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(50.0))), Step::Continue);
        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(30.0))), Step::Continue);
        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(15.0))), Step::Resolved);

        let acquired = machine.outcome().unwrap().as_ref().unwrap();
        assert_eq!(acquired.accuracy_m(), 15.0);
        assert!(!acquired.coarse);
        assert_eq!(acquired.samples, 3);
    }

    #[test]
    fn test_early_accept_at_exact_target() {
        let mut machine = sampling(AcquisitionPolicy::full());
        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(20.0))), Step::Resolved);
    }

    #[test]
    fn test_one_shot_fix_can_early_accept() {
        let mut machine = sampling(AcquisitionPolicy::full());
        let step = machine.handle(AcquisitionEvent::OneShotResolved(Ok(fix(12.0))));
        assert_eq!(step, Step::Resolved);
        assert_eq!(machine.outcome().unwrap().as_ref().unwrap().accuracy_m(), 12.0);
    }

    #[test]
    fn test_full_deadline_within_hard_max() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamSample(fix(60.0)));
        machine.handle(AcquisitionEvent::StreamSample(fix(45.0)));
        assert_eq!(machine.handle(AcquisitionEvent::DeadlineFired), Step::Resolved);

        let acquired = machine.outcome().unwrap().as_ref().unwrap();
        assert_eq!(acquired.accuracy_m(), 45.0);
        assert!(!acquired.coarse);
    }

    #[test]
    fn test_full_deadline_accuracy_too_low() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamSample(fix(90.0)));
        machine.handle(AcquisitionEvent::DeadlineFired);
        assert_eq!(
            machine.outcome(),
            Some(&Err(AcquisitionError::AccuracyTooLow {
                best_accuracy_m: 90.0
            }))
        );
    }

    #[test]
    fn test_full_deadline_no_signal() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamError(SampleError::Timeout));
        machine.handle(AcquisitionEvent::DeadlineFired);
        assert_eq!(machine.outcome(), Some(&Err(AcquisitionError::NoSignal)));
    }

    #[test]
    fn test_quick_streaming_degrades_instead_of_failing() {
        let mut machine = sampling(streaming_quick());
        machine.handle(AcquisitionEvent::StreamSample(fix(150.0)));
        machine.handle(AcquisitionEvent::DeadlineFired);

        let acquired = machine.outcome().unwrap().as_ref().unwrap();
        assert!(acquired.coarse);
        assert_eq!(acquired.accuracy_m(), 150.0);
        assert_eq!(acquired.mode, AcquisitionMode::Quick);
    }

    #[test]
    fn test_quick_streaming_never_accepts_early() {
        let mut machine = sampling(streaming_quick());
        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(3.0))), Step::Continue);
        machine.handle(AcquisitionEvent::DeadlineFired);
        assert!(!machine.outcome().unwrap().as_ref().unwrap().coarse);
    }

    #[test]
    fn test_quick_single_shot() {
        let mut machine = AcquisitionMachine::new(AcquisitionPolicy::quick());
        assert_eq!(
            machine.begin(PermissionState::Granted, true),
            Step::Sample(SamplingPlan::SingleShot)
        );
        machine.handle(AcquisitionEvent::OneShotResolved(Ok(fix(150.0))));
        let acquired = machine.outcome().unwrap().as_ref().unwrap();
        assert!(acquired.coarse);
        assert_eq!(acquired.samples, 1);
    }

    #[test]
    fn test_quick_single_shot_error_mapping() {
        let cases = [
            (SampleError::Timeout, AcquisitionError::Timeout),
            (
                SampleError::Unavailable("off".to_string()),
                AcquisitionError::CapabilityUnavailable,
            ),
            (SampleError::Denied, AcquisitionError::PermissionDenied),
        ];
        for (sample_error, expected) in cases {
            let mut machine = sampling(AcquisitionPolicy::quick());
            machine.handle(AcquisitionEvent::OneShotResolved(Err(sample_error)));
            assert_eq!(machine.outcome(), Some(&Err(expected)));
        }
    }

    #[test]
    fn test_exhausted_paths_settle_early() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamSample(fix(40.0)));
        assert_eq!(machine.handle(AcquisitionEvent::StreamEnded), Step::Continue);
        let step = machine.handle(AcquisitionEvent::OneShotResolved(Err(SampleError::Timeout)));
        assert_eq!(step, Step::Resolved);
        assert_eq!(machine.outcome().unwrap().as_ref().unwrap().accuracy_m(), 40.0);
    }

    #[test]
    fn test_exhausted_with_denial_reports_permission() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamError(SampleError::Denied));
        machine.handle(AcquisitionEvent::StreamEnded);
        machine.handle(AcquisitionEvent::OneShotResolved(Err(SampleError::Timeout)));
        assert_eq!(
            machine.outcome(),
            Some(&Err(AcquisitionError::PermissionDenied))
        );
    }

    #[test]
    fn test_exhausted_without_denial_is_no_signal() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::OneShotResolved(Err(SampleError::Timeout)));
        machine.handle(AcquisitionEvent::StreamEnded);
        assert_eq!(machine.outcome(), Some(&Err(AcquisitionError::NoSignal)));
    }

    #[test]
    fn test_events_after_resolution_are_ignored() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamSample(fix(10.0)));
        let resolved = machine.outcome().cloned();

        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(1.0))), Step::Resolved);
        machine.handle(AcquisitionEvent::OneShotResolved(Err(SampleError::Denied)));
        machine.handle(AcquisitionEvent::DeadlineFired);
        machine.handle(AcquisitionEvent::Cancelled);

        assert_eq!(machine.outcome().cloned(), resolved);
        assert_eq!(machine.samples(), 1);
    }

    #[test]
    fn test_cancel_from_any_live_phase() {
        let mut idle = AcquisitionMachine::new(AcquisitionPolicy::full());
        idle.handle(AcquisitionEvent::Cancelled);
        assert_eq!(idle.outcome(), Some(&Err(AcquisitionError::Cancelled)));

        let mut preflight = AcquisitionMachine::new(AcquisitionPolicy::full());
        preflight.begin(PermissionState::Prompt, true);
        preflight.handle(AcquisitionEvent::Cancelled);
        assert_eq!(preflight.outcome(), Some(&Err(AcquisitionError::Cancelled)));
    }

    #[test]
    fn test_conclude_applies_deadline_rule() {
        let mut machine = sampling(AcquisitionPolicy::full());
        machine.handle(AcquisitionEvent::StreamSample(fix(70.0)));
        let outcome = machine.conclude().unwrap();
        assert_eq!(outcome.accuracy_m(), 70.0);
        assert!(machine.is_resolved());
    }

    #[test]
    fn test_samples_in_wrong_phase_ignored() {
        let mut machine = AcquisitionMachine::new(AcquisitionPolicy::full());
        machine.begin(PermissionState::Prompt, true);
        assert_eq!(machine.handle(AcquisitionEvent::StreamSample(fix(1.0))), Step::Continue);
        assert_eq!(machine.samples(), 0);
    }
}
