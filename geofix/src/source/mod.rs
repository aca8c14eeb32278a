//! Sample source adapters.
//!
//! A positioning sensor exposes two acquisition primitives, and both are
//! wrapped behind [`SampleSource`]:
//!
//! - **Streaming**: a continuous sequence of fixes until cancelled or the
//!   deadline passes.
//! - **One-shot**: a single attempt that resolves or fails exactly once.
//!
//! Either primitive may never produce anything. Both must be callable
//! concurrently: some platforms stall the stream while still answering
//! one-shot requests, so the engine races them against each other.
//!
//! # Adapters
//!
//! | Adapter | Use |
//! |---------|-----|
//! | [`ScriptedSource`] | Deterministic timed trace (tests, recorded field traces) |
//! | [`BroadcastSource`] | Platforms that push readings through a callback |
//! | [`GpsdSource`] | gpsd daemon over TCP |
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures and streams so sources can be used as
//! `Arc<dyn SampleSource>`.

mod broadcast;
mod error;
mod gpsd;
mod scripted;

use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::fix::Fix;

pub use broadcast::{BroadcastSource, SampleFeed, DEFAULT_FEED_CAPACITY};
pub use error::SampleError;
pub use gpsd::{parse_report, GpsdReport, GpsdSource, DEFAULT_GPSD_ADDRESS};
pub use scripted::{
    OneShotOutcome, Script, ScriptError, ScriptedErrorKind, ScriptedOneShot, ScriptedReading,
    ScriptedSource, ScriptedStreamError, StreamEnd,
};

/// Stream of samples; `Err` items are non-fatal sensor errors.
pub type SampleStream<'a> = BoxStream<'a, Result<Fix, SampleError>>;

/// Uniform "emit or fail" interface over a positioning sensor.
pub trait SampleSource: Send + Sync {
    /// Whether the positioning capability exists at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Start a continuous sample stream.
    ///
    /// The stream ends when `cancel` fires or `deadline` (relative to the
    /// call) elapses. Each element is an independent reading; the caller
    /// folds them.
    fn stream_samples(&self, deadline: Duration, cancel: CancellationToken) -> SampleStream<'_>;

    /// Take a single reading.
    ///
    /// Resolves `Err(SampleError::Timeout)` if nothing arrives within
    /// `timeout`, and `Err(SampleError::Cancelled)` if `cancel` fires first.
    fn one_shot_sample(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Fix, SampleError>>;
}
