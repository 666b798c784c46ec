//! Detection configuration.
//!
//! Every tunable of the engine lives in [`DetectionConfig`] and is threaded
//! explicitly through each call. There is no global state.

use serde::{Deserialize, Serialize};

use crate::error::{IntervalError, Result};

/// Upper bound for every sample window (one hour at 1 Hz).
pub const MAX_WINDOW: usize = 3600;

/// Which detection policy the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// Peak detection, with the state machine and percentile fallback
    /// brought in when the data lacks clear structure.
    #[default]
    Tiered,
    /// Single pass of windowed mean-acceleration scanning.
    WindowedAcceleration,
}

/// Configuration for interval detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum length of a work interval (samples, i.e. seconds at 1 Hz)
    pub min_interval_duration: usize,
    /// Gaps shorter than this between intervals are bridged (samples)
    pub min_recovery_duration: usize,
    /// High speed threshold in km/h. Floor of the adaptive high threshold,
    /// or the fixed value when adaptive thresholds are off.
    pub speed_threshold: f64,
    /// Fixed low speed threshold in km/h
    pub low_speed_threshold: f64,
    /// Fixed acceleration threshold in km/h per sample
    pub acceleration_threshold: f64,
    /// Derive thresholds from the series statistics
    pub adaptive_threshold: bool,
    /// Centered moving-average width (samples)
    pub smoothing_window: usize,
    /// How far the peak generator scans for onset/offset (samples)
    pub peak_search_window: usize,
    /// Gradient below which the peak scan stops (km/h per sample)
    pub steep_deceleration: f64,
    /// Coefficient of variation below which the state machine also runs
    pub cv_threshold: f64,
    /// Percentile used by the relative-intensity fallback
    pub fallback_percentile: f64,
    /// Window used by the windowed-acceleration strategy (samples)
    pub acceleration_window: usize,
    /// Detection policy
    pub strategy: DetectionStrategy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_interval_duration: 30,
            min_recovery_duration: 15,
            speed_threshold: 11.0,
            low_speed_threshold: 8.0,
            acceleration_threshold: 0.5,
            adaptive_threshold: true,
            smoothing_window: 5,
            peak_search_window: 60,
            steep_deceleration: -0.5,
            cv_threshold: 0.3,
            fallback_percentile: 70.0,
            acceleration_window: 10,
            strategy: DetectionStrategy::Tiered,
        }
    }
}

impl DetectionConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// The parsed configuration is validated before it is returned.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IntervalError::config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if self.min_interval_duration == 0 {
            return Err(IntervalError::config("min_interval_duration must be at least 1"));
        }
        let windows = [
            ("smoothing_window", self.smoothing_window),
            ("peak_search_window", self.peak_search_window),
            ("acceleration_window", self.acceleration_window),
        ];
        for (name, value) in windows {
            if value == 0 || value > MAX_WINDOW {
                return Err(IntervalError::config(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_WINDOW, value
                )));
            }
        }

        let non_negative = [
            ("speed_threshold", self.speed_threshold),
            ("low_speed_threshold", self.low_speed_threshold),
            ("acceleration_threshold", self.acceleration_threshold),
            ("cv_threshold", self.cv_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(IntervalError::config(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !self.steep_deceleration.is_finite() {
            return Err(IntervalError::config("steep_deceleration must be finite"));
        }
        if self.low_speed_threshold > self.speed_threshold {
            return Err(IntervalError::config(format!(
                "low_speed_threshold ({}) exceeds speed_threshold ({})",
                self.low_speed_threshold, self.speed_threshold
            )));
        }
        if !(self.fallback_percentile > 0.0 && self.fallback_percentile < 100.0) {
            return Err(IntervalError::config(format!(
                "fallback_percentile must be in (0, 100), got {}",
                self.fallback_percentile
            )));
        }

        Ok(())
    }

    /// Builder-style override of the minimum interval duration.
    pub fn with_min_interval_duration(mut self, samples: usize) -> Self {
        self.min_interval_duration = samples;
        self
    }

    /// Builder-style override of the minimum recovery duration.
    pub fn with_min_recovery_duration(mut self, samples: usize) -> Self {
        self.min_recovery_duration = samples;
        self
    }

    /// Builder-style override of the detection strategy.
    pub fn with_strategy(mut self, strategy: DetectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inconsistent_thresholds_rejected() {
        let config = DetectionConfig {
            speed_threshold: 8.0,
            low_speed_threshold: 12.0,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IntervalError::Config { .. })
        ));
    }

    #[test]
    fn test_zero_min_interval_rejected() {
        let config = DetectionConfig::default().with_min_interval_duration(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_percentile_rejected() {
        let config = DetectionConfig {
            fallback_percentile: 100.0,
            ..DetectionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = DetectionConfig::from_json(
            r#"{"min_interval_duration": 15, "strategy": "windowed_acceleration"}"#,
        )
        .unwrap();
        assert_eq!(config.min_interval_duration, 15);
        assert_eq!(config.min_recovery_duration, 15);
        assert_eq!(config.strategy, DetectionStrategy::WindowedAcceleration);
    }

    #[test]
    fn test_from_json_negative_recovery_is_config_error() {
        let result = DetectionConfig::from_json(r#"{"min_recovery_duration": -5}"#);
        assert!(matches!(result, Err(IntervalError::Config { .. })));
    }

    #[test]
    fn test_huge_window_rejected() {
        let result = DetectionConfig::from_json(r#"{"peak_search_window": 18446744073709551615}"#);
        assert!(matches!(result, Err(IntervalError::Config { .. })));

        for config in [
            DetectionConfig {
                smoothing_window: MAX_WINDOW + 1,
                ..DetectionConfig::default()
            },
            DetectionConfig {
                acceleration_window: usize::MAX,
                ..DetectionConfig::default()
            },
            DetectionConfig {
                peak_search_window: 0,
                ..DetectionConfig::default()
            },
        ] {
            assert!(config.validate().is_err());
        }

        let at_bound = DetectionConfig {
            peak_search_window: MAX_WINDOW,
            ..DetectionConfig::default()
        };
        assert!(at_bound.validate().is_ok());
    }
}
