//! Windowed mean-acceleration scan.
//!
//! Slides a fixed window over the series. A window with strong mean
//! acceleration opens an interval, a fast window with strong mean
//! deceleration (or a window that falls to or below the series mean) closes
//! it. Spans whose mean speed does not beat the series mean are discarded.
//!
//! Window means dilute the per-sample gradient, so this scan compares against
//! the fixed `acceleration_threshold` rather than the adaptive one.

use log::debug;

use super::{span_mean, CandidateGenerator};
use crate::features::FeatureSet;
use crate::{DetectionConfig, Interval};

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowedAccelerationGenerator;

impl CandidateGenerator for WindowedAccelerationGenerator {
    fn name(&self) -> &'static str {
        "windowed_acceleration"
    }

    fn generate(
        &self,
        speed: &[f64],
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> Vec<Interval> {
        let n = speed.len();
        let window = config.acceleration_window;
        let accel = &features.gradient;
        let threshold = config.acceleration_threshold;
        let series_mean = features.stats.mean;

        let mut candidates = Vec::new();
        let mut open: Option<usize> = None;

        let close = |start: usize, end: usize, candidates: &mut Vec<Interval>| {
            if end > start && span_mean(speed, start, end) > series_mean {
                candidates.push(Interval::new(start, end));
            }
        };

        let mut t = 0;
        while t + window < n {
            let window_speed = &speed[t..t + window];
            let window_accel = &accel[t..t + window];
            let mean_speed = window_speed.iter().sum::<f64>() / window as f64;
            let mean_accel = window_accel.iter().sum::<f64>() / window as f64;

            match open {
                None if mean_accel > threshold => {
                    open = window_accel.iter().position(|&a| a > 0.0).map(|k| t + k);
                }
                None => {}
                Some(start) => {
                    if mean_speed > series_mean && mean_accel < -threshold {
                        if let Some(k) = window_accel.iter().position(|&a| a < 0.0) {
                            close(start, t + k, &mut candidates);
                            open = None;
                        }
                    } else if mean_speed <= series_mean {
                        close(start, t, &mut candidates);
                        open = None;
                    }
                }
            }

            t += 1;
        }

        if let Some(start) = open {
            close(start, n - 1, &mut candidates);
        }

        debug!(
            "[Windowed] window={} threshold={:.2} -> {} candidates",
            window,
            threshold,
            candidates.len()
        );

        candidates
    }
}
