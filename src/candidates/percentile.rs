//! Relative-intensity fallback: runs above a high percentile.

use log::debug;

use super::CandidateGenerator;
use crate::features::{percentile, FeatureSet};
use crate::{DetectionConfig, Interval};

/// Maximal runs of samples strictly above the configured percentile of the
/// series. Used when neither peaks nor transitions give any structure, e.g.
/// fartlek-style sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentileGenerator;

impl CandidateGenerator for PercentileGenerator {
    fn name(&self) -> &'static str {
        "percentile"
    }

    fn generate(
        &self,
        speed: &[f64],
        _features: &FeatureSet,
        config: &DetectionConfig,
    ) -> Vec<Interval> {
        let Some(threshold) = percentile(speed, config.fallback_percentile) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        let mut run_start: Option<usize> = None;

        // A sentinel step past the end closes a run reaching the final sample
        for i in 0..=speed.len() {
            let above = speed.get(i).is_some_and(|&v| v > threshold);
            match (run_start, above) {
                (None, true) => run_start = Some(i),
                (Some(start), false) => {
                    let end = i - 1;
                    if end - start >= config.min_interval_duration {
                        candidates.push(Interval::new(start, end));
                    }
                    run_start = None;
                }
                _ => {}
            }
        }

        debug!(
            "[Percentile] p{:.0} = {:.2} km/h -> {} candidates",
            config.fallback_percentile,
            threshold,
            candidates.len()
        );

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::test_support::features_for;

    #[test]
    fn test_runs_above_percentile() {
        let config = DetectionConfig::default().with_min_interval_duration(5);
        let mut speed = vec![8.0; 30];
        speed.extend(vec![15.0; 10]);
        speed.extend(vec![8.0; 20]);
        speed.extend(vec![14.0; 3]);
        speed.extend(vec![8.0; 20]);
        let features = features_for(&speed, &config);

        let candidates = PercentileGenerator.generate(&speed, &features, &config);
        assert_eq!(candidates, vec![Interval::new(30, 39)]);
    }

    #[test]
    fn test_run_reaching_final_sample() {
        let config = DetectionConfig::default().with_min_interval_duration(5);
        let mut speed = vec![6.0; 45];
        speed.extend(vec![16.0; 15]);
        let features = features_for(&speed, &config);

        let candidates = PercentileGenerator.generate(&speed, &features, &config);
        assert_eq!(candidates, vec![Interval::new(45, 59)]);
    }
}
