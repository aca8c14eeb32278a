//! gpsd sample source.
//!
//! Connects to a gpsd daemon over TCP, enables the JSON watcher and turns TPV
//! (time-position-velocity) reports into fixes.
//!
//! # Protocol
//!
//! ```text
//! client ──► ?WATCH={"enable":true,"json":true};
//! gpsd   ──► {"class":"VERSION",...}
//! gpsd   ──► {"class":"DEVICES","devices":[...]}
//! gpsd   ──► {"class":"TPV","mode":3,"lat":..,"lon":..,"epx":..,"epy":..}
//! ```
//!
//! Accuracy is the larger of the longitude/latitude error estimates
//! (`epx`/`epy`), falling back to `eph`. TPV reports with `mode` below 2 carry
//! no position and are skipped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{SampleError, SampleSource, SampleStream};
use crate::fix::Fix;

/// Default gpsd listen address.
pub const DEFAULT_GPSD_ADDRESS: &str = "127.0.0.1:2947";

/// Watch command enabling JSON reports.
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Minimum TPV mode that carries a 2D position.
const MIN_FIX_MODE: u8 = 2;

/// A decoded gpsd report line.
#[derive(Debug, Clone, PartialEq)]
pub enum GpsdReport {
    /// TPV report with a usable position.
    Fix(Fix),
    /// TPV report without a position (mode 0/1).
    NoFix,
    /// DEVICES report listing no receivers.
    NoDevice,
    /// Any other report class.
    Other(String),
}

#[derive(Debug, Deserialize)]
struct RawReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    time: Option<DateTime<Utc>>,
    devices: Option<Vec<serde_json::Value>>,
}

/// Parse one line of gpsd JSON output.
pub fn parse_report(line: &str) -> Result<GpsdReport, serde_json::Error> {
    let raw: RawReport = serde_json::from_str(line)?;

    match raw.class.as_str() {
        "TPV" => {
            let (Some(lat), Some(lon)) = (raw.lat, raw.lon) else {
                return Ok(GpsdReport::NoFix);
            };
            if raw.mode < MIN_FIX_MODE {
                return Ok(GpsdReport::NoFix);
            }

            let accuracy = match (raw.epx, raw.epy) {
                (Some(x), Some(y)) => Some(x.max(y)),
                _ => raw.eph,
            };
            let captured_at = raw.time.unwrap_or_else(Utc::now);

            Ok(Fix::from_reading(lat, lon, accuracy, captured_at)
                .map(GpsdReport::Fix)
                .unwrap_or(GpsdReport::NoFix))
        }
        "DEVICES" if raw.devices.as_ref().is_some_and(|d| d.is_empty()) => {
            Ok(GpsdReport::NoDevice)
        }
        _ => Ok(GpsdReport::Other(raw.class)),
    }
}

type ReportLines = Lines<BufReader<TcpStream>>;

async fn open_watch(address: &str) -> Result<ReportLines, SampleError> {
    let mut stream = TcpStream::connect(address).await.map_err(|e| {
        SampleError::Unavailable(format!("cannot reach gpsd at {}: {}", address, e))
    })?;
    stream
        .write_all(WATCH_COMMAND)
        .await
        .map_err(|e| SampleError::Unavailable(format!("gpsd watch failed: {}", e)))?;

    debug!(address, "gpsd watch enabled");
    Ok(BufReader::new(stream).lines())
}

/// Read until the next fix or device problem.
///
/// Returns `None` for the lines when the connection is finished.
async fn next_fix(
    mut lines: ReportLines,
) -> (Result<Fix, SampleError>, Option<ReportLines>) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_report(&line) {
                Ok(GpsdReport::Fix(fix)) => return (Ok(fix), Some(lines)),
                Ok(GpsdReport::NoDevice) => {
                    return (
                        Err(SampleError::Unavailable(
                            "no GPS receiver attached to gpsd".to_string(),
                        )),
                        Some(lines),
                    )
                }
                Ok(report) => trace!(?report, "Skipping gpsd report"),
                Err(e) => debug!(error = %e, "Unparseable gpsd line"),
            },
            Ok(None) => {
                return (
                    Err(SampleError::Unavailable(
                        "gpsd closed the connection".to_string(),
                    )),
                    None,
                )
            }
            Err(e) => return (Err(SampleError::Unavailable(e.to_string())), None),
        }
    }
}

enum StreamState {
    Connect(String),
    Reading(ReportLines),
    Done,
}

/// Sample source backed by a gpsd daemon.
#[derive(Debug, Clone)]
pub struct GpsdSource {
    address: String,
}

impl GpsdSource {
    /// Create a source for the daemon at `address` (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// The configured daemon address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Default for GpsdSource {
    fn default() -> Self {
        Self::new(DEFAULT_GPSD_ADDRESS)
    }
}

impl SampleSource for GpsdSource {
    fn stream_samples(&self, deadline: Duration, cancel: CancellationToken) -> SampleStream<'_> {
        info!(address = %self.address, "Starting gpsd sample stream");

        let samples = stream::unfold(
            StreamState::Connect(self.address.clone()),
            |state| async move {
                let lines = match state {
                    StreamState::Connect(address) => match open_watch(&address).await {
                        Ok(lines) => lines,
                        Err(e) => return Some((Err(e), StreamState::Done)),
                    },
                    StreamState::Reading(lines) => lines,
                    StreamState::Done => return None,
                };

                let (item, lines) = next_fix(lines).await;
                let next = lines.map_or(StreamState::Done, StreamState::Reading);
                Some((item, next))
            },
        );

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
        async move {
            let attempt = async {
                match open_watch(&self.address).await {
                    Ok(lines) => next_fix(lines).await.0,
                    Err(e) => Err(e),
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
