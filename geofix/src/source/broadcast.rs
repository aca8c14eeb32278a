//! Push-based sample source.
//!
//! For platforms that deliver readings through a callback: the platform side
//! holds a [`SampleFeed`] and pushes readings or errors into it; every active
//! stream and one-shot request sees them through a `broadcast` channel.
//!
//! ```ignore
//! let (source, feed) = BroadcastSource::new(DEFAULT_FEED_CAPACITY);
//!
//! // Platform callback
//! feed.push(Fix::new(lat, lon, accuracy)?);
//!
//! // Engine side
//! let engine = AcquisitionEngine::new(Arc::new(source), permission);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{SampleError, SampleSource, SampleStream};
use crate::fix::Fix;

/// Default number of buffered readings per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

type FeedItem = Result<Fix, SampleError>;

/// Platform-side handle for pushing readings.
#[derive(Clone)]
pub struct SampleFeed {
    tx: broadcast::Sender<FeedItem>,
    available: Arc<AtomicBool>,
}

impl SampleFeed {
    /// Deliver a reading. Returns how many requests received it.
    pub fn push(&self, fix: Fix) -> usize {
        self.tx.send(Ok(fix)).unwrap_or(0)
    }

    /// Deliver a sensor error. Returns how many requests received it.
    pub fn fail(&self, error: SampleError) -> usize {
        self.tx.send(Err(error)).unwrap_or(0)
    }

    /// Report whether the capability is present.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of streams and one-shot requests currently listening.
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Sample source fed by a [`SampleFeed`].
pub struct BroadcastSource {
    tx: broadcast::Sender<FeedItem>,
    available: Arc<AtomicBool>,
}

impl BroadcastSource {
    /// Create a source and the feed that drives it.
    pub fn new(capacity: usize) -> (Self, SampleFeed) {
        let (tx, _) = broadcast::channel(capacity);
        let available = Arc::new(AtomicBool::new(true));
        let feed = SampleFeed {
            tx: tx.clone(),
            available: Arc::clone(&available),
        };
        (Self { tx, available }, feed)
    }
}

/// Next item from the feed, skipping over lag.
async fn next_item(rx: &mut broadcast::Receiver<FeedItem>) -> Option<FeedItem> {
    loop {
        match rx.recv().await {
            Ok(item) => return Some(item),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Sample feed lagged, readings dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

impl SampleSource for BroadcastSource {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn stream_samples(&self, deadline: Duration, cancel: CancellationToken) -> SampleStream<'_> {
        let rx = self.tx.subscribe();
        let samples = stream::unfold(rx, |mut rx| async move {
            next_item(&mut rx).await.map(|item| (item, rx))
        });

        let stop = async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {}
            }
        };

        samples.take_until(stop).boxed()
    }

    fn one_shot_sample(
        &self,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Fix, SampleError>> {
        let mut rx = self.tx.subscribe();

        async move {
            let first = async move {
                let closed = || Err(SampleError::Unavailable("sample feed closed".to_string()));
                next_item(&mut rx).await.unwrap_or_else(closed)
            };

            tokio::select! {
                _ = cancel.cancelled() => Err(SampleError::Cancelled),
                result = tokio::time::timeout(timeout, first) => {
                    result.unwrap_or(Err(SampleError::Timeout))
                }
            }
        }
        .boxed()
    }
}
