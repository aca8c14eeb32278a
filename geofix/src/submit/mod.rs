//! Handing acquired fixes to the record store.
//!
//! An [`AcquiredFix`] becomes a [`LocationSubmission`], tagged with a
//! [`SourceLabel`] so consumers can tell survey-grade locations from quick
//! coarse ones, and is written through a [`RecordSink`].
//!
//! # Example
//!
//! ```ignore
//! let acquired = engine.acquire(&AcquisitionPolicy::quick()).await?;
//! let submission = LocationSubmission::from(acquired);
//!
//! let sink = JsonLinesSink::new("locations.jsonl");
//! sink.submit(submission).await?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::acquisition::AcquiredFix;
use crate::fix::Fix;
use crate::policy::AcquisitionMode;

/// Spatial reference of emitted coordinates (WGS 84).
pub const SRID_WGS84: u32 = 4326;

/// Provenance tag stored with every location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLabel {
    GpsFull,
    GpsQuick,
    GpsQuickCoarse,
}

impl SourceLabel {
    /// Label for an acquisition result.
    pub fn for_result(acquired: &AcquiredFix) -> Self {
        match (acquired.mode, acquired.coarse) {
            (AcquisitionMode::Full, _) => Self::GpsFull,
            (AcquisitionMode::Quick, false) => Self::GpsQuick,
            (AcquisitionMode::Quick, true) => Self::GpsQuickCoarse,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GpsFull => "gps_full",
            Self::GpsQuick => "gps_quick",
            Self::GpsQuickCoarse => "gps_quick_coarse",
        }
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location record handed to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSubmission {
    pub fix: Fix,
    pub accuracy_m: f64,
    pub source_label: SourceLabel,
    pub coarse: bool,
}

impl LocationSubmission {
    /// Extended WKT point, longitude first: `SRID=4326;POINT(lon lat)`.
    pub fn to_ewkt(&self) -> String {
        format!(
            "SRID={};POINT({} {})",
            SRID_WGS84,
            self.fix.longitude(),
            self.fix.latitude()
        )
    }

    fn to_record(&self) -> SubmissionRecord {
        SubmissionRecord {
            location: self.to_ewkt(),
            latitude: self.fix.latitude(),
            longitude: self.fix.longitude(),
            location_accuracy_m: self.accuracy_m,
            location_source: self.source_label,
            coarse: self.coarse,
            captured_at: self.fix.captured_at().to_rfc3339(),
        }
    }
}

impl From<AcquiredFix> for LocationSubmission {
    fn from(acquired: AcquiredFix) -> Self {
        Self {
            fix: acquired.fix,
            accuracy_m: acquired.accuracy_m(),
            source_label: SourceLabel::for_result(&acquired),
            coarse: acquired.coarse,
        }
    }
}

/// Wire shape of a stored submission.
#[derive(Debug, Serialize)]
struct SubmissionRecord {
    location: String,
    latitude: f64,
    longitude: f64,
    location_accuracy_m: f64,
    location_source: SourceLabel,
    coarse: bool,
    captured_at: String,
}

/// Errors writing a submission.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write location record: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode location record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for acquired locations.
pub trait RecordSink: Send + Sync {
    fn submit(&self, submission: LocationSubmission) -> BoxFuture<'_, Result<(), SinkError>>;
}

/// Sink that keeps submissions in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LocationSubmission>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything submitted so far, in order.
    pub fn submissions(&self) -> Vec<LocationSubmission> {
        self.records.lock().clone()
    }
}

impl RecordSink for MemorySink {
    fn submit(&self, submission: LocationSubmission) -> BoxFuture<'_, Result<(), SinkError>> {
        self.records.lock().push(submission);
        futures::future::ready(Ok(())).boxed()
    }
}

/// Sink appending one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonLinesSink {
    fn submit(&self, submission: LocationSubmission) -> BoxFuture<'_, Result<(), SinkError>> {
        async move {
            let mut line = serde_json::to_string(&submission.to_record())?;
            line.push('\n');

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;

            debug!(
                path = %self.path.display(),
                source = %submission.source_label,
                "Location record written"
            );
            Ok(())
        }
        .boxed()
    }
}
