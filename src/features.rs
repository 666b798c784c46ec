//! Feature extraction: acceleration, series statistics and thresholds.

use serde::{Deserialize, Serialize};

use crate::DetectionConfig;

/// Standard deviation at or below which a series is treated as constant.
pub const DEGENERATE_STD_DEV: f64 = 1e-9;

/// Summary statistics of a smoothed speed series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl SeriesStats {
    /// Compute statistics over a dense series. Empty input yields zeros.
    pub fn from_series(series: &[f64]) -> Self {
        if series.is_empty() {
            return Self::default();
        }

        let n = series.len() as f64;
        let mean = series.iter().sum::<f64>() / n;
        let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let (min, max) = series
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        Self {
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
        }
    }

    /// Standard deviation divided by mean; 0 for a zero-mean series.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean.abs() <= f64::EPSILON {
            0.0
        } else {
            self.std_dev / self.mean
        }
    }

    /// True when the series has no usable variation.
    pub fn is_degenerate(&self) -> bool {
        self.std_dev <= DEGENERATE_STD_DEV
    }
}

/// Speed and acceleration thresholds used by the generators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// km/h
    pub high_speed: f64,
    /// km/h
    pub low_speed: f64,
    /// km/h per sample
    pub acceleration: f64,
}

impl Thresholds {
    /// Fixed thresholds straight from the configuration.
    pub fn fixed(config: &DetectionConfig) -> Self {
        Self {
            high_speed: config.speed_threshold,
            low_speed: config.low_speed_threshold,
            acceleration: config.acceleration_threshold,
        }
    }
}

/// Everything the candidate generators read besides the speed series itself.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Instantaneous acceleration, one value per sample
    pub gradient: Vec<f64>,
    pub stats: SeriesStats,
    pub thresholds: Thresholds,
}

/// Discrete derivative of a series.
///
/// Central differences in the interior, one-sided differences at the ends.
pub fn gradient(series: &[f64]) -> Vec<f64> {
    let n = series.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    series[1] - series[0]
                } else if i == n - 1 {
                    series[n - 1] - series[n - 2]
                } else {
                    (series[i + 1] - series[i - 1]) / 2.0
                }
            })
            .collect(),
    }
}

/// Percentile `p` (0-100) with linear interpolation between closest ranks.
///
/// Returns `None` for an empty series.
pub fn percentile(series: &[f64], p: f64) -> Option<f64> {
    if series.is_empty() {
        return None;
    }

    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Derive thresholds from series statistics.
///
/// Adaptive mode uses `mean + 0.5σ` (floored at the configured speed
/// threshold), `mean - 0.3σ` and `0.3σ`. A constant series, or adaptive mode
/// switched off, falls back to the fixed configuration values.
pub fn compute_thresholds(stats: &SeriesStats, config: &DetectionConfig) -> Thresholds {
    if !config.adaptive_threshold || stats.is_degenerate() {
        return Thresholds::fixed(config);
    }

    Thresholds {
        high_speed: config
            .speed_threshold
            .max(stats.mean + 0.5 * stats.std_dev),
        low_speed: stats.mean - 0.3 * stats.std_dev,
        acceleration: 0.3 * stats.std_dev,
    }
}

/// Compute gradient, statistics and thresholds for a smoothed series.
pub fn extract_features(smoothed: &[f64], config: &DetectionConfig) -> FeatureSet {
    let stats = SeriesStats::from_series(smoothed);
    FeatureSet {
        gradient: gradient(smoothed),
        thresholds: compute_thresholds(&stats, config),
        stats,
    }
}
