//! Async acquisition driver.
//!
//! Runs one [`AcquisitionMachine`] to completion, feeding it events from the
//! sample source, the deadline timer and the caller's cancellation token.
//!
//! # Sampling Race
//!
//! ```text
//!                    ┌── stream_samples ──► StreamSample / StreamError / StreamEnded ─┐
//! AcquisitionEngine ─┼── one_shot_sample ─► OneShotResolved ──────────────────────────┼─► machine
//!                    ├── sleep(deadline) ─► DeadlineFired ────────────────────────────┤
//!                    └── cancel token ────► Cancelled ────────────────────────────────┘
//! ```
//!
//! All four are polled from a single `select!` loop, so events are applied
//! one at a time. When the machine resolves, the loop exits, the stream and
//! one-shot futures are dropped and the per-acquisition token is cancelled;
//! nothing from this call can touch the outcome afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{AcquisitionError, AcquisitionResult};
use super::progress::AcquisitionProgress;
use super::state::{AcquisitionEvent, AcquisitionMachine, SamplingPlan, Step};
use crate::permission::{PermissionProber, PermissionState};
use crate::policy::{AcquisitionMode, AcquisitionPolicy};
use crate::source::SampleSource;

/// Clears the busy flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Location-fix acquisition engine.
///
/// One engine serves one acquisition at a time; a second concurrent call
/// fails fast with [`AcquisitionError::Busy`].
///
/// # Example
///
/// ```ignore
/// let engine = AcquisitionEngine::new(Arc::new(GpsdSource::default()), Arc::new(permission));
/// let mut progress = engine.subscribe_progress();
///
/// match engine.acquire(&AcquisitionPolicy::full()).await {
///     Ok(acquired) => println!("{}", acquired.fix),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub struct AcquisitionEngine {
    source: Arc<dyn SampleSource>,
    permission: Arc<dyn PermissionProber>,
    progress_tx: watch::Sender<AcquisitionProgress>,
    busy: AtomicBool,
}

impl AcquisitionEngine {
    pub fn new(source: Arc<dyn SampleSource>, permission: Arc<dyn PermissionProber>) -> Self {
        let (progress_tx, _) = watch::channel(AcquisitionProgress::idle(AcquisitionMode::Full));
        Self {
            source,
            permission,
            progress_tx,
            busy: AtomicBool::new(false),
        }
    }

    /// Receive progress snapshots of the running acquisition.
    pub fn subscribe_progress(&self) -> watch::Receiver<AcquisitionProgress> {
        self.progress_tx.subscribe()
    }

    /// Whether an acquisition is currently running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Acquire one fix under `policy`.
    pub async fn acquire(&self, policy: &AcquisitionPolicy) -> AcquisitionResult {
        self.acquire_with_cancel(policy, CancellationToken::new()).await
    }

    /// Acquire one fix, aborting with `Cancelled` when `cancel` fires.
    pub async fn acquire_with_cancel(
        &self,
        policy: &AcquisitionPolicy,
        cancel: CancellationToken,
    ) -> AcquisitionResult {
        let Some(_busy) = BusyGuard::try_acquire(&self.busy) else {
            warn!("Acquisition requested while another is running");
            return Err(AcquisitionError::Busy);
        };

        let started = Instant::now();
        let requests = cancel.child_token();
        let mut machine = AcquisitionMachine::new(policy.clone());

        let listener = self.permission.on_change(Box::new(|state: PermissionState| {
            debug!(%state, "Permission changed during acquisition");
        }));

        info!(
            mode = %policy.mode(),
            max_wait_ms = policy.max_wait().as_millis() as u64,
            "Starting location acquisition"
        );

        self.run(&mut machine, &requests, &cancel, started).await;

        requests.cancel();
        self.permission.remove_listener(listener);

        let outcome = machine.conclude();
        self.publish(&machine, started);

        match &outcome {
            Ok(acquired) => info!(
                accuracy_m = acquired.accuracy_m(),
                coarse = acquired.coarse,
                samples = acquired.samples,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Location acquired"
            ),
            Err(e) => warn!(
                error = %e,
                samples = machine.samples(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Location acquisition failed"
            ),
        }

        outcome
    }

    async fn run(
        &self,
        machine: &mut AcquisitionMachine,
        requests: &CancellationToken,
        cancel: &CancellationToken,
        started: Instant,
    ) {
        let permission = self.permission.current_state();
        debug!(%permission, "Permission state at start");

        let mut step = machine.begin(permission, self.source.is_available());
        self.publish(machine, started);

        if step == Step::Preflight {
            let preflight = self
                .source
                .one_shot_sample(machine.policy().preflight_timeout(), requests.child_token());

            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => AcquisitionEvent::Cancelled,
                result = preflight => AcquisitionEvent::PreflightResolved(result),
            };
            step = machine.handle(event);
            self.publish(machine, started);
        }

        match step {
            Step::Sample(SamplingPlan::Race) => self.race(machine, requests, cancel, started).await,
            Step::Sample(SamplingPlan::SingleShot) => {
                self.single_shot(machine, requests, cancel, started).await
            }
            Step::Preflight | Step::Continue | Step::Resolved => {}
        }
    }

    /// Stream, fallback one-shot and deadline raced until resolution.
    async fn race(
        &self,
        machine: &mut AcquisitionMachine,
        requests: &CancellationToken,
        cancel: &CancellationToken,
        started: Instant,
    ) {
        let policy = machine.policy().clone();

        let mut stream = self
            .source
            .stream_samples(policy.deadline(), requests.child_token());
        let mut one_shot = self
            .source
            .one_shot_sample(policy.one_shot_timeout(), requests.child_token());
        let deadline = tokio::time::sleep(policy.deadline());
        tokio::pin!(deadline);

        let mut stream_done = false;
        let mut one_shot_done = false;

        while !machine.is_resolved() {
            let event = tokio::select! {
                biased;

                _ = cancel.cancelled() => AcquisitionEvent::Cancelled,

                item = stream.next(), if !stream_done => match item {
                    Some(Ok(fix)) => AcquisitionEvent::StreamSample(fix),
                    Some(Err(e)) => AcquisitionEvent::StreamError(e),
                    None => {
                        stream_done = true;
                        AcquisitionEvent::StreamEnded
                    }
                },

                result = &mut one_shot, if !one_shot_done => {
                    one_shot_done = true;
                    AcquisitionEvent::OneShotResolved(result)
                }

                _ = &mut deadline => AcquisitionEvent::DeadlineFired,
            };

            machine.handle(event);
            self.publish(machine, started);
        }
    }

    /// Quick-mode single read bounded by the max wait.
    async fn single_shot(
        &self,
        machine: &mut AcquisitionMachine,
        requests: &CancellationToken,
        cancel: &CancellationToken,
        started: Instant,
    ) {
        let one_shot = self
            .source
            .one_shot_sample(machine.policy().max_wait(), requests.child_token());

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => AcquisitionEvent::Cancelled,
            result = one_shot => AcquisitionEvent::OneShotResolved(result),
        };
        machine.handle(event);
        self.publish(machine, started);
    }

    fn publish(&self, machine: &AcquisitionMachine, started: Instant) {
        self.progress_tx.send_replace(machine.progress(started.elapsed()));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::permission::{PermissionState, SharedPermission, StaticPermission};
    use crate::source::{OneShotOutcome, ScriptedErrorKind, ScriptedSource, StreamEnd};

    fn engine(source: ScriptedSource, permission: PermissionState) -> AcquisitionEngine {
        AcquisitionEngine::new(Arc::new(source), Arc::new(StaticPermission(permission)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_early_accept() {
        let source = ScriptedSource::new()
            .with_reading(1_000, 1.0, 2.0, 50.0)
            .with_reading(2_000, 1.0, 2.0, 30.0)
            .with_reading(3_000, 1.0, 2.0, 15.0);
        let engine = engine(source, PermissionState::Granted);

        let started = tokio::time::Instant::now();
        let acquired = engine.acquire(&AcquisitionPolicy::full()).await.unwrap();

        assert_eq!(acquired.accuracy_m(), 15.0);
        assert_eq!(acquired.samples, 3);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(!engine.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_one_shot_when_stream_is_silent() {
        let source = ScriptedSource::new()
            .with_one_shot(4_000, OneShotOutcome::fix(1.0, 2.0, 18.0));
        let engine = engine(source, PermissionState::Granted);

        let acquired = engine.acquire(&AcquisitionPolicy::full()).await.unwrap();
        assert_eq!(acquired.accuracy_m(), 18.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_and_failed_fallback_settle_early() {
        let source = ScriptedSource::new()
            .with_reading(500, 1.0, 2.0, 60.0)
            .with_stream_end(StreamEnd::Close)
            .with_one_shot(1_000, OneShotOutcome::error(ScriptedErrorKind::Timeout));
        let engine = engine(source, PermissionState::Granted);

        let started = tokio::time::Instant::now();
        let acquired = engine.acquire(&AcquisitionPolicy::full()).await.unwrap();

        assert_eq!(acquired.accuracy_m(), 60.0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reflects_resolution() {
        let source = ScriptedSource::new().with_reading(100, 1.0, 2.0, 5.0);
        let engine = engine(source, PermissionState::Granted);
        let progress = engine.subscribe_progress();

        engine.acquire(&AcquisitionPolicy::full()).await.unwrap();

        let last = progress.borrow().clone();
        assert!(last.is_resolved());
        assert_eq!(last.samples, 1);
        assert_eq!(last.best_accuracy_m, Some(5.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_listener_removed_after_acquire() {
        let permission = Arc::new(SharedPermission::new(PermissionState::Granted));
        let source = ScriptedSource::new().with_reading(100, 1.0, 2.0, 5.0);
        let engine = AcquisitionEngine::new(Arc::new(source), permission.clone());

        engine.acquire(&AcquisitionPolicy::full()).await.unwrap();
        assert_eq!(permission.listener_count(), 0);
    }
}
