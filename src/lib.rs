//! # Interval Detector
//!
//! Segmentation of 1 Hz workout speed telemetry into work intervals and
//! recoveries, plus the plumbing to fetch and decode activities from
//! intervals.icu.
//!
//! This library provides:
//! - Gap filling and smoothing of raw speed samples
//! - Adaptive thresholds derived from the series' own statistics
//! - Peak, state-machine and percentile candidate generators combined by a
//!   tiered policy, with an alternative windowed-acceleration scan
//! - Reconciliation into sorted, non-overlapping intervals
//! - Per-interval and per-recovery summaries (speed, heart rate, distance)
//!
//! ## Features
//!
//! - **`parallel`** - Run independent candidate generators with rayon
//! - **`http`** - intervals.icu activity source
//! - **`fit`** - FIT file decoding (plain or zipped)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use interval_detector::{detect_intervals, summarize, ActivityTelemetry, DetectionConfig};
//!
//! // Warm-up, one hard effort, cool-down (km/h, one sample per second)
//! let mut speed: Vec<Option<f64>> = vec![Some(7.0); 90];
//! speed.extend(vec![Some(17.0); 120]);
//! speed.extend(vec![Some(7.0); 90]);
//!
//! let config = DetectionConfig::default();
//! let intervals = detect_intervals(&speed, &config).unwrap();
//! assert_eq!(intervals.len(), 1);
//!
//! let telemetry = ActivityTelemetry::from_speed(speed);
//! let summary = summarize(&intervals, &telemetry).unwrap();
//! println!("{:.1} km/h", summary.intervals[0].avg_speed_kmh.unwrap());
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{IntervalError, OptionExt, Result};

// Tunable detection parameters
pub mod config;
pub use config::{DetectionConfig, DetectionStrategy};

// Gap filling and smoothing
pub mod preprocess;
pub use preprocess::{fill_gaps, preprocess, smooth};

// Gradient, statistics and adaptive thresholds
pub mod features;
pub use features::{
    compute_thresholds, extract_features, gradient, percentile, FeatureSet, SeriesStats,
    Thresholds,
};

// Candidate generators (peaks, state machine, percentile, windowed scan)
pub mod candidates;
pub use candidates::{
    find_peaks, CandidateGenerator, DetectionState, PeakGenerator, PercentileGenerator,
    StateMachineGenerator, WindowedAccelerationGenerator,
};

// Merge and filter candidates into final intervals
pub mod reconcile;
pub use reconcile::{merge_close, merge_overlapping, reconcile};

// Detection orchestrator
pub mod engine;
pub use engine::{
    detect_intervals, detect_intervals_dense, detect_intervals_with_report, DetectionReport,
};

// Interval and recovery statistics
pub mod summary;
pub use summary::{summarize, SessionSummary, SpanSummary, DEFAULT_HIGH_HR_BPM};

// Collaborator seams: activity source and file decoder
pub mod source;
pub use source::{
    analyze_latest_activity, ActivityAnalysis, ActivityMetadata, ActivitySource,
    TelemetryDecoder,
};

// intervals.icu client
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::IntervalsIcuSource;

// FIT decoding
#[cfg(feature = "fit")]
pub mod fit;
#[cfg(feature = "fit")]
pub use fit::{unpack_activity_archive, FitDecoder};

// ============================================================================
// Core Types
// ============================================================================

/// A work interval as an inclusive pair of sample indices.
///
/// # Example
/// ```
/// use interval_detector::Interval;
/// let interval = Interval::new(120, 300);
/// assert_eq!(interval.duration(), 180);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// First sample of the effort
    pub start: usize,
    /// Last sample of the effort
    pub end: usize,
}

impl Interval {
    /// Create a new interval.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in samples (`end - start`), which is seconds at 1 Hz.
    pub fn duration(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the sample index falls inside the interval.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }

    /// Whether the two intervals share at least one sample.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Time-aligned telemetry for one activity, one sample per second.
///
/// Speed is in km/h; heart rate in bpm; distance is cumulative meters.
/// Missing samples are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTelemetry {
    pub speed: Vec<Option<f64>>,
    pub heart_rate: Option<Vec<Option<f64>>>,
    pub distance: Option<Vec<Option<f64>>>,
}

impl ActivityTelemetry {
    /// Telemetry with only a speed series.
    pub fn from_speed(speed: Vec<Option<f64>>) -> Self {
        Self {
            speed,
            heart_rate: None,
            distance: None,
        }
    }

    pub fn with_heart_rate(mut self, heart_rate: Vec<Option<f64>>) -> Self {
        self.heart_rate = Some(heart_rate);
        self
    }

    pub fn with_distance(mut self, distance: Vec<Option<f64>>) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Number of speed samples.
    pub fn len(&self) -> usize {
        self.speed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speed.is_empty()
    }
}
