//! Deterministic, timed sample source.
//!
//! Replays a script of readings, sensor errors and one-shot outcomes on the
//! tokio clock. Scripts can be built in code or loaded from JSON, which is how
//! recorded field traces are replayed from the command line.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "stream": [
//!     { "after_ms": 1000, "latitude": -41.29, "longitude": 174.78, "accuracy_m": 50.0 },
//!     { "after_ms": 4000, "latitude": -41.29, "longitude": 174.78, "accuracy_m": 15.0 }
//!   ],
//!   "stream_errors": [ { "after_ms": 2000, "error": "timeout" } ],
//!   "stream_end": "hold",
//!   "one_shots": [
//!     { "after_ms": 800, "outcome": { "kind": "fix", "latitude": -41.29, "longitude": 174.78, "accuracy_m": 65.0 } }
//!   ]
//! }
//! ```
//!
//! One-shot outcomes are consumed in call order. Once the queue is empty,
//! further one-shot requests never resolve on their own and end in
//! `SampleError::Timeout`.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::future::{self, BoxFuture};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{SampleError, SampleSource, SampleStream};
use crate::fix::{Fix, FixError};

/// Errors loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Failed to read the script file.
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),

    /// Script is not valid JSON for this format.
    #[error("Failed to parse script: {0}")]
    Parse(#[from] serde_json::Error),

    /// A reading in the script has invalid coordinates or accuracy.
    #[error("Invalid reading #{index}: {source}")]
    InvalidReading {
        index: usize,
        #[source]
        source: FixError,
    },
}

/// A reading emitted by the scripted stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedReading {
    /// Delay from stream start.
    pub after_ms: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Missing accuracy is treated like a platform that omitted it.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

impl ScriptedReading {
    fn to_fix(&self) -> Result<Fix, FixError> {
        Fix::from_reading(self.latitude, self.longitude, self.accuracy_m, Utc::now())
    }
}

/// Sensor error kinds a script can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedErrorKind {
    Timeout,
    Unavailable,
    Denied,
}

impl From<ScriptedErrorKind> for SampleError {
    fn from(kind: ScriptedErrorKind) -> Self {
        match kind {
            ScriptedErrorKind::Timeout => SampleError::Timeout,
            ScriptedErrorKind::Unavailable => SampleError::Unavailable("scripted".to_string()),
            ScriptedErrorKind::Denied => SampleError::Denied,
        }
    }
}

/// A non-fatal error emitted by the scripted stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedStreamError {
    pub after_ms: u64,
    pub error: ScriptedErrorKind,
}

/// What the stream does once its scripted events are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    /// Stay open without producing anything (a real sensor that went quiet).
    #[default]
    Hold,
    /// End the stream.
    Close,
}

/// Outcome of one scripted one-shot request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OneShotOutcome {
    /// Resolve with a reading.
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        accuracy_m: Option<f64>,
    },
    /// Fail with a sensor error.
    Error { error: ScriptedErrorKind },
    /// Never resolve (the request times out).
    Never,
}

impl OneShotOutcome {
    /// Resolve with a reading of the given accuracy.
    pub fn fix(latitude: f64, longitude: f64, accuracy_m: f64) -> Self {
        Self::Fix {
            latitude,
            longitude,
            accuracy_m: Some(accuracy_m),
        }
    }

    pub fn error(error: ScriptedErrorKind) -> Self {
        Self::Error { error }
    }
}

/// A queued one-shot response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedOneShot {
    /// Delay from the one-shot call.
    pub after_ms: u64,
    pub outcome: OneShotOutcome,
}

/// Complete script, as stored in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Script {
    pub available: bool,
    pub stream: Vec<ScriptedReading>,
    pub stream_errors: Vec<ScriptedStreamError>,
    pub stream_end: StreamEnd,
    pub one_shots: Vec<ScriptedOneShot>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            available: true,
            stream: Vec::new(),
            stream_errors: Vec::new(),
            stream_end: StreamEnd::Hold,
            one_shots: Vec::new(),
        }
    }
}

impl Script {
    fn validate(&self) -> Result<(), ScriptError> {
        for (index, reading) in self.stream.iter().enumerate() {
            reading
                .to_fix()
                .map_err(|source| ScriptError::InvalidReading { index, source })?;
        }
        Ok(())
    }

    /// Stream events merged by time; readings win ties with errors.
    fn timeline(&self) -> Vec<(Duration, StreamItem)> {
        let mut events: Vec<(Duration, StreamItem)> = self
            .stream
            .iter()
            .map(|r| (Duration::from_millis(r.after_ms), StreamItem::Reading(r.clone())))
            .chain(self.stream_errors.iter().map(|e| {
                (
                    Duration::from_millis(e.after_ms),
                    StreamItem::Error(e.error),
                )
            }))
            .collect();
        events.sort_by_key(|(after, _)| *after);
        events
    }
}

#[derive(Debug, Clone)]
enum StreamItem {
    Reading(ScriptedReading),
    Error(ScriptedErrorKind),
}

impl StreamItem {
    fn resolve(self) -> Result<Fix, SampleError> {
        match self {
            StreamItem::Reading(reading) => reading
                .to_fix()
                .map_err(|e| SampleError::Unavailable(e.to_string())),
            StreamItem::Error(kind) => Err(kind.into()),
        }
    }
}

/// Sample source driven by a [`Script`].
#[derive(Debug)]
pub struct ScriptedSource {
    script: Script,
    one_shots: Mutex<VecDeque<ScriptedOneShot>>,
    stream_starts: AtomicUsize,
    one_shot_calls: AtomicUsize,
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedSource {
    /// Empty script: an available sensor that never produces anything.
    pub fn new() -> Self {
        Self::from_script(Script::default())
    }

    fn from_script(script: Script) -> Self {
        let one_shots = Mutex::new(script.one_shots.iter().cloned().collect());
        Self {
            script,
            one_shots,
            stream_starts: AtomicUsize::new(0),
            one_shot_calls: AtomicUsize::new(0),
        }
    }

    /// Parse a JSON script.
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let script: Script = serde_json::from_str(json)?;
        script.validate()?;
        Ok(Self::from_script(script))
    }

    /// Load a JSON script from disk.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add a stream reading `after_ms` after stream start.
    pub fn with_reading(
        mut self,
        after_ms: u64,
        latitude: f64,
        longitude: f64,
        accuracy_m: f64,
    ) -> Self {
        self.script.stream.push(ScriptedReading {
            after_ms,
            latitude,
            longitude,
            accuracy_m: Some(accuracy_m),
        });
        self
    }

    /// Add a non-fatal stream error.
    pub fn with_stream_error(mut self, after_ms: u64, error: ScriptedErrorKind) -> Self {
        self.script
            .stream_errors
            .push(ScriptedStreamError { after_ms, error });
        self
    }

    /// Set what happens after the last stream event.
    pub fn with_stream_end(mut self, end: StreamEnd) -> Self {
        self.script.stream_end = end;
        self
    }

    /// Queue a one-shot response.
    pub fn with_one_shot(mut self, after_ms: u64, outcome: OneShotOutcome) -> Self {
        let shot = ScriptedOneShot { after_ms, outcome };
        self.one_shots.get_mut().push_back(shot.clone());
        self.script.one_shots.push(shot);
        self
    }

    /// Mark the capability as absent.
    pub fn unavailable(mut self) -> Self {
        self.script.available = false;
        self
    }

    /// Number of times `stream_samples` was called.
    pub fn stream_starts(&self) -> usize {
        self.stream_starts.load(Ordering::SeqCst)
    }

    /// Number of times `one_shot_sample` was called.
    pub fn one_shot_calls(&self) -> usize {
        self.one_shot_calls.load(Ordering::SeqCst)
    }
}

impl SampleSource for ScriptedSource {
    fn is_available(&self) -> bool {
        self.script.available
    }

    fn stream_samples(&self, deadline: Duration, cancel: CancellationToken) -> SampleStream<'_> {
        self.stream_starts.fetch_add(1, Ordering::SeqCst);

        let start = Instant::now();
        let timed = stream::iter(self.script.timeline()).then(move |(after, item)| async move {
            tokio::time::sleep(after.saturating_sub(start.elapsed())).await;
            item.resolve()
        });

        let tail: SampleStream<'static> = match self.script.stream_end {
            StreamEnd::Hold => stream::pending().boxed(),
            StreamEnd::Close => stream::empty().boxed(),
        };

        let stop = async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(deadline.saturating_sub(start.elapsed())) => {}
            }
        };

        timed.chain(tail).take_until(stop).boxed()
    }

    fn one_shot_sample(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Fix, SampleError>> {
        self.one_shot_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.one_shots.lock().pop_front();

        async move {
            let attempt = async move {
                let Some(shot) = next else {
                    return future::pending().await;
                };
                tokio::time::sleep(Duration::from_millis(shot.after_ms)).await;
                match shot.outcome {
                    OneShotOutcome::Fix {
                        latitude,
                        longitude,
                        accuracy_m,
                    } => Fix::from_reading(latitude, longitude, accuracy_m, Utc::now())
                        .map_err(|e| SampleError::Unavailable(e.to_string())),
                    OneShotOutcome::Error { error } => Err(error.into()),
                    OneShotOutcome::Never => future::pending().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => Err(SampleError::Cancelled),
                result = tokio::time::timeout(timeout, attempt) => {
                    result.unwrap_or(Err(SampleError::Timeout))
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix_outcome(accuracy_m: f64) -> OneShotOutcome {
        OneShotOutcome::Fix {
            latitude: 1.0,
            longitude: 2.0,
            accuracy_m: Some(accuracy_m),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_emits_in_time_order() {
        let source = ScriptedSource::new()
            .with_reading(3000, 1.0, 2.0, 15.0)
            .with_reading(1000, 1.0, 2.0, 50.0)
            .with_stream_error(2000, ScriptedErrorKind::Timeout)
            .with_stream_end(StreamEnd::Close);

        let items: Vec<_> = source
            .stream_samples(Duration::from_secs(30), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().accuracy_m(), 50.0);
        assert_eq!(items[1], Err(SampleError::Timeout));
        assert_eq!(items[2].as_ref().unwrap().accuracy_m(), 15.0);
        assert_eq!(source.stream_starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_stops_at_deadline() {
        let source = ScriptedSource::new()
            .with_reading(1000, 1.0, 2.0, 50.0)
            .with_reading(9000, 1.0, 2.0, 10.0);

        let items: Vec<_> = source
            .stream_samples(Duration::from_secs(5), CancellationToken::new())
            .collect()
            .await;

        assert_eq!(items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_deadline_does_not_overflow() {
        let source = ScriptedSource::new()
            .with_reading(1000, 1.0, 2.0, 50.0)
            .with_stream_end(StreamEnd::Close);

        let items: Vec<_> = source
            .stream_samples(Duration::MAX, CancellationToken::new())
            .collect()
            .await;

        assert_eq!(items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_stops_on_cancel() {
        let source = ScriptedSource::new();
        let cancel = CancellationToken::new();
        let mut stream = source.stream_samples(Duration::from_secs(30), cancel.clone());

        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shots_consumed_in_order() {
        let source = ScriptedSource::new()
            .with_one_shot(100, OneShotOutcome::Error {
                error: ScriptedErrorKind::Denied,
            })
            .with_one_shot(100, fix_outcome(30.0));

        let first = source
            .one_shot_sample(Duration::from_secs(10), CancellationToken::new())
            .await;
        let second = source
            .one_shot_sample(Duration::from_secs(10), CancellationToken::new())
            .await;

        assert_eq!(first, Err(SampleError::Denied));
        assert_eq!(second.unwrap().accuracy_m(), 30.0);
        assert_eq!(source.one_shot_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_times_out() {
        let source = ScriptedSource::new().with_one_shot(20_000, fix_outcome(5.0));
        let result = source
            .one_shot_sample(Duration::from_secs(5), CancellationToken::new())
            .await;
        assert_eq!(result, Err(SampleError::Timeout));

        let empty = source
            .one_shot_sample(Duration::from_secs(1), CancellationToken::new())
            .await;
        assert_eq!(empty, Err(SampleError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_cancelled() {
        let source = ScriptedSource::new().with_one_shot(0, OneShotOutcome::Never);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = source
            .one_shot_sample(Duration::from_secs(5), cancel)
            .await;
        assert_eq!(result, Err(SampleError::Cancelled));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "stream": [
                { "after_ms": 1000, "latitude": -41.29, "longitude": 174.78, "accuracy_m": 50.0 },
                { "after_ms": 2000, "latitude": -41.29, "longitude": 174.78 }
            ],
            "stream_errors": [ { "after_ms": 1500, "error": "unavailable" } ],
            "stream_end": "close",
            "one_shots": [
                { "after_ms": 800, "outcome": { "kind": "error", "error": "denied" } },
                { "after_ms": 800, "outcome": { "kind": "never" } }
            ]
        }"#;

        let source = ScriptedSource::from_json(json).unwrap();
        assert!(source.is_available());
        assert_eq!(source.script.stream.len(), 2);
        assert_eq!(source.script.stream[1].accuracy_m, None);
        assert_eq!(source.script.stream_end, StreamEnd::Close);
        assert_eq!(source.one_shots.lock().len(), 2);
    }

    #[test]
    fn test_from_json_defaults() {
        let source = ScriptedSource::from_json("{}").unwrap();
        assert!(source.is_available());
        assert_eq!(source.script.stream_end, StreamEnd::Hold);

        let absent = ScriptedSource::from_json(r#"{ "available": false }"#).unwrap();
        assert!(!absent.is_available());
    }

    #[test]
    fn test_from_json_rejects_invalid_reading() {
        let json = r#"{ "stream": [ { "after_ms": 0, "latitude": 95.0, "longitude": 0.0 } ] }"#;
        assert!(matches!(
            ScriptedSource::from_json(json),
            Err(ScriptError::InvalidReading { index: 0, .. })
        ));
    }

    #[test]
    fn test_unavailable_builder() {
        assert!(!ScriptedSource::new().unavailable().is_available());
    }
}
