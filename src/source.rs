//! Collaborator interfaces: where activities come from and how their files
//! become telemetry.
//!
//! The detection engine knows nothing about either. [`analyze_latest_activity`]
//! wires a source, a decoder, the engine and the summarizer together.

use chrono::{NaiveDate, NaiveDateTime};
use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::{detect_intervals_with_report, DetectionReport};
use crate::error::Result;
use crate::summary::{summarize, SessionSummary};
use crate::{ActivityTelemetry, DetectionConfig};

/// Activity listing entry as reported by a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    pub id: String,
    pub name: Option<String>,
    pub sport_type: Option<String>,
    /// Local start time of the activity
    pub start_date: Option<NaiveDateTime>,
    pub distance_meters: Option<f64>,
    pub moving_time_seconds: Option<u64>,
}

/// A place activities can be fetched from.
pub trait ActivitySource {
    /// Raw file of the most recent activity (FIT, possibly zipped).
    fn fetch_latest_activity_binary(&self) -> Result<Vec<u8>>;

    /// Activities that started between `start` and `end`, inclusive.
    fn fetch_activities_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ActivityMetadata>>;
}

/// Turns an activity file into aligned 1 Hz telemetry.
pub trait TelemetryDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ActivityTelemetry>;
}

/// Everything produced by one end-to-end analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAnalysis {
    pub telemetry: ActivityTelemetry,
    pub report: DetectionReport,
    pub summary: SessionSummary,
}

/// Fetch the latest activity, decode it, detect intervals and summarize them.
///
/// # Errors
/// Propagates source, decoder and configuration errors. Poor-quality
/// telemetry yields an analysis with no intervals rather than an error.
pub fn analyze_latest_activity(
    source: &dyn ActivitySource,
    decoder: &dyn TelemetryDecoder,
    config: &DetectionConfig,
) -> Result<ActivityAnalysis> {
    let bytes = source.fetch_latest_activity_binary()?;
    let telemetry = decoder.decode(&bytes)?;
    info!(
        "[Analysis] Decoded {} samples from {} bytes",
        telemetry.len(),
        bytes.len()
    );

    let report = detect_intervals_with_report(&telemetry.speed, config)?;
    let summary = summarize(&report.intervals, &telemetry)?;

    Ok(ActivityAnalysis {
        telemetry,
        report,
        summary,
    })
}
