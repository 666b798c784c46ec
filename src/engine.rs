//! # Detection Engine
//!
//! Orchestrates preprocessing, feature extraction, candidate generation and
//! reconciliation into one stateless call.
//!
//! ## Tiered policy
//!
//! 1. Always run peak detection.
//! 2. If it finds nothing, or the series has low variability (coefficient of
//!    variation below `cv_threshold`, where peaks discriminate poorly), also
//!    run the state machine and merge overlapping candidates.
//! 3. If there is still nothing, use the percentile fallback alone.
//! 4. Reconcile.
//!
//! Each call owns all of its state. Data-quality problems (empty series,
//! all samples missing, zero variance) produce an empty interval list;
//! only configuration errors are returned to the caller.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::candidates::{
    CandidateGenerator, PeakGenerator, PercentileGenerator, StateMachineGenerator,
    WindowedAccelerationGenerator,
};
use crate::error::{IntervalError, Result};
use crate::features::{extract_features, FeatureSet, SeriesStats, Thresholds};
use crate::preprocess::preprocess;
use crate::reconcile::{merge_overlapping, reconcile};
use crate::{DetectionConfig, DetectionStrategy, Interval};

/// Detection result with the intermediate values that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Final, reconciled intervals
    pub intervals: Vec<Interval>,
    /// Number of input samples
    pub sample_count: usize,
    /// Statistics of the smoothed series (None when preprocessing failed)
    pub stats: Option<SeriesStats>,
    /// Thresholds the generators ran with
    pub thresholds: Option<Thresholds>,
    /// Generators whose candidates reached reconciliation
    pub generators: Vec<String>,
    /// Raw candidate count before reconciliation
    pub candidate_count: usize,
}

impl DetectionReport {
    fn empty(sample_count: usize) -> Self {
        Self {
            intervals: Vec::new(),
            sample_count,
            stats: None,
            thresholds: None,
            generators: Vec::new(),
            candidate_count: 0,
        }
    }
}

/// Detect work intervals in a raw speed series (km/h, 1 Hz).
///
/// Missing samples are `None`. Returns an empty list for empty, all-missing
/// or constant input.
///
/// # Errors
/// `Config` if the configuration fails validation.
///
/// # Example
/// ```
/// use interval_detector::{detect_intervals, DetectionConfig};
///
/// let mut speed: Vec<Option<f64>> = vec![Some(6.0); 60];
/// speed.extend(vec![Some(18.0); 90]);
/// speed.extend(vec![Some(6.0); 60]);
///
/// let intervals = detect_intervals(&speed, &DetectionConfig::default()).unwrap();
/// assert_eq!(intervals.len(), 1);
/// ```
pub fn detect_intervals(
    raw_speed: &[Option<f64>],
    config: &DetectionConfig,
) -> Result<Vec<Interval>> {
    detect_intervals_with_report(raw_speed, config).map(|report| report.intervals)
}

/// Detect work intervals in a gap-free speed series.
pub fn detect_intervals_dense(speed: &[f64], config: &DetectionConfig) -> Result<Vec<Interval>> {
    let raw: Vec<Option<f64>> = speed.iter().copied().map(Some).collect();
    detect_intervals(&raw, config)
}

/// Like [`detect_intervals`], but also returns thresholds, statistics and the
/// generators that contributed.
pub fn detect_intervals_with_report(
    raw_speed: &[Option<f64>],
    config: &DetectionConfig,
) -> Result<DetectionReport> {
    config.validate()?;

    let smoothed = match preprocess(raw_speed, config) {
        Ok(smoothed) => smoothed,
        Err(IntervalError::DataQuality { message }) => {
            warn!("[Intervals] Skipping detection: {}", message);
            return Ok(DetectionReport::empty(raw_speed.len()));
        }
        Err(e) => return Err(e),
    };

    let features = extract_features(&smoothed, config);
    let mut report = DetectionReport::empty(raw_speed.len());
    report.stats = Some(features.stats);
    report.thresholds = Some(features.thresholds);

    if features.stats.is_degenerate() {
        warn!(
            "[Intervals] Skipping detection: constant series at {:.2} km/h",
            features.stats.mean
        );
        return Ok(report);
    }

    debug!(
        "[Intervals] mean={:.2} std={:.2} cv={:.3} high={:.2} low={:.2} accel={:.3}",
        features.stats.mean,
        features.stats.std_dev,
        features.stats.coefficient_of_variation(),
        features.thresholds.high_speed,
        features.thresholds.low_speed,
        features.thresholds.acceleration
    );

    let (candidates, generators) = match config.strategy {
        DetectionStrategy::Tiered => run_tiered(&smoothed, &features, config),
        DetectionStrategy::WindowedAcceleration => {
            let generator = WindowedAccelerationGenerator;
            (
                generator.generate(&smoothed, &features, config),
                vec![generator.name()],
            )
        }
    };

    report.candidate_count = candidates.len();
    report.generators = generators.into_iter().map(String::from).collect();
    report.intervals = reconcile(candidates, config);

    info!(
        "[Intervals] Detected {} intervals in {} samples ({} candidates from {})",
        report.intervals.len(),
        report.sample_count,
        report.candidate_count,
        report.generators.join("+")
    );

    Ok(report)
}

/// Run two generators over the same inputs.
#[cfg(feature = "parallel")]
fn generate_pair(
    a: &dyn CandidateGenerator,
    b: &dyn CandidateGenerator,
    speed: &[f64],
    features: &FeatureSet,
    config: &DetectionConfig,
) -> (Vec<Interval>, Vec<Interval>) {
    rayon::join(
        || a.generate(speed, features, config),
        || b.generate(speed, features, config),
    )
}

#[cfg(not(feature = "parallel"))]
fn generate_pair(
    a: &dyn CandidateGenerator,
    b: &dyn CandidateGenerator,
    speed: &[f64],
    features: &FeatureSet,
    config: &DetectionConfig,
) -> (Vec<Interval>, Vec<Interval>) {
    (
        a.generate(speed, features, config),
        b.generate(speed, features, config),
    )
}

/// The tiered peak / state-machine / percentile policy.
fn run_tiered(
    speed: &[f64],
    features: &FeatureSet,
    config: &DetectionConfig,
) -> (Vec<Interval>, Vec<&'static str>) {
    let peaks = PeakGenerator;
    let state_machine = StateMachineGenerator;
    let fallback = PercentileGenerator;

    let low_variability = features.stats.coefficient_of_variation() < config.cv_threshold;

    let (peak_candidates, machine_candidates) = if low_variability {
        let (p, s) = generate_pair(&peaks, &state_machine, speed, features, config);
        (p, Some(s))
    } else {
        let p = peaks.generate(speed, features, config);
        let s = p
            .is_empty()
            .then(|| state_machine.generate(speed, features, config));
        (p, s)
    };

    let mut generators = vec![peaks.name()];
    let combined = match machine_candidates {
        Some(machine) => {
            generators.push(state_machine.name());
            let mut all = peak_candidates;
            all.extend(machine);
            merge_overlapping(all)
        }
        None => peak_candidates,
    };

    if combined.is_empty() {
        debug!("[Intervals] No structured candidates, using percentile fallback");
        return (
            fallback.generate(speed, features, config),
            vec![fallback.name()],
        );
    }

    (combined, generators)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(speed: &[f64]) -> Vec<Option<f64>> {
        speed.iter().copied().map(Some).collect()
    }

    fn blocks(parts: &[(f64, usize)]) -> Vec<f64> {
        parts
            .iter()
            .flat_map(|&(v, n)| std::iter::repeat(v).take(n))
            .collect()
    }

    #[test]
    fn test_empty_and_missing_input() {
        let config = DetectionConfig::default();
        assert!(detect_intervals(&[], &config).unwrap().is_empty());
        assert!(detect_intervals(&[None; 100], &config).unwrap().is_empty());
    }

    #[test]
    fn test_constant_series_is_empty() {
        let config = DetectionConfig::default();
        let report = detect_intervals_with_report(&dense(&[14.0; 300]), &config).unwrap();
        assert!(report.intervals.is_empty());
        assert!(report.generators.is_empty());
    }

    #[test]
    fn test_invalid_config_surfaces() {
        let config = DetectionConfig {
            smoothing_window: 0,
            ..DetectionConfig::default()
        };
        let result = detect_intervals(&dense(&[10.0; 50]), &config);
        assert!(matches!(result, Err(IntervalError::Config { .. })));
    }

    #[test]
    fn test_oversized_window_rejected_before_detection() {
        let config = DetectionConfig {
            peak_search_window: usize::MAX,
            ..DetectionConfig::default()
        };
        let speed = blocks(&[(6.0, 60), (18.0, 60), (6.0, 60)]);
        let result = detect_intervals(&dense(&speed), &config);
        assert!(matches!(result, Err(IntervalError::Config { .. })));
    }

    #[test]
    fn test_clear_intervals_use_peaks_only() {
        let speed = blocks(&[
            (6.0, 60),
            (18.0, 60),
            (6.0, 60),
            (18.0, 60),
            (6.0, 60),
        ]);
        let report =
            detect_intervals_with_report(&dense(&speed), &DetectionConfig::default()).unwrap();

        assert_eq!(report.intervals.len(), 2);
        assert_eq!(report.generators, vec!["peaks".to_string()]);
        for interval in &report.intervals {
            assert!(interval.duration() >= 30);
        }
    }

    #[test]
    fn test_low_variability_runs_state_machine() {
        // Small bumps over a high baseline: CV well below 0.3
        let speed = blocks(&[(12.0, 60), (14.0, 60), (12.0, 60)]);
        let report =
            detect_intervals_with_report(&dense(&speed), &DetectionConfig::default()).unwrap();

        assert!(report.stats.unwrap().coefficient_of_variation() < 0.3);
        assert!(report.generators.contains(&"state_machine".to_string()));
    }

    #[test]
    fn test_windowed_strategy() {
        let speed = blocks(&[(6.0, 60), (18.0, 60), (6.0, 60)]);
        let config =
            DetectionConfig::default().with_strategy(DetectionStrategy::WindowedAcceleration);
        let report = detect_intervals_with_report(&dense(&speed), &config).unwrap();

        assert_eq!(report.generators, vec!["windowed_acceleration".to_string()]);
        assert_eq!(report.intervals.len(), 1);
    }

    #[test]
    fn test_dense_matches_optional() {
        let speed = blocks(&[(6.0, 60), (18.0, 60), (6.0, 60)]);
        let config = DetectionConfig::default();
        assert_eq!(
            detect_intervals_dense(&speed, &config).unwrap(),
            detect_intervals(&dense(&speed), &config).unwrap()
        );
    }
}
