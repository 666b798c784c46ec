//! Peak-anchored candidate generation.

use log::debug;

use super::CandidateGenerator;
use crate::features::FeatureSet;
use crate::{DetectionConfig, Interval};

/// Indices of local maxima higher than `min_height`, at least `min_distance`
/// samples apart.
///
/// A flat top counts as one peak located at its middle. Endpoints are never
/// peaks. When two peaks are too close the higher one wins; equal heights
/// keep the earlier index.
pub fn find_peaks(series: &[f64], min_height: f64, min_distance: usize) -> Vec<usize> {
    let n = series.len();
    if n < 3 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    let mut i = 1;
    while i < n - 1 {
        if series[i - 1] < series[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && series[ahead] == series[i] {
                ahead += 1;
            }
            if series[ahead] < series[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    peaks.retain(|&p| series[p] > min_height);
    if min_distance <= 1 || peaks.len() < 2 {
        return peaks;
    }

    // Highest first, then earliest
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        series[peaks[b]]
            .total_cmp(&series[peaks[a]])
            .then(peaks[a].cmp(&peaks[b]))
    });

    let mut keep = vec![true; peaks.len()];
    for &idx in &order {
        if !keep[idx] {
            continue;
        }
        let pos = peaks[idx];

        // peaks is sorted by position, so neighbours are contiguous
        let mut k = idx;
        while k > 0 && pos - peaks[k - 1] < min_distance {
            k -= 1;
            keep[k] = false;
        }
        let mut k = idx + 1;
        while k < peaks.len() && peaks[k] - pos < min_distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

/// Expands each prominent speed peak into an onset/offset pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeakGenerator;

impl PeakGenerator {
    /// Does sample `i` mark the edge of an effort?
    #[inline]
    fn is_boundary(
        i: usize,
        speed: &[f64],
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> bool {
        speed[i] < features.thresholds.low_speed
            || features.gradient[i] < config.steep_deceleration
    }

    fn expand_peak(
        peak: usize,
        speed: &[f64],
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> Interval {
        let last = speed.len() - 1;
        let scan_start = peak.saturating_sub(config.peak_search_window);
        let scan_end = peak.saturating_add(config.peak_search_window).min(last);

        let start = (scan_start..peak)
            .rev()
            .find(|&i| Self::is_boundary(i, speed, features, config))
            .unwrap_or(scan_start);
        let end = (peak + 1..=scan_end)
            .find(|&i| Self::is_boundary(i, speed, features, config))
            .unwrap_or(scan_end);

        Interval::new(start, end)
    }
}

impl CandidateGenerator for PeakGenerator {
    fn name(&self) -> &'static str {
        "peaks"
    }

    fn generate(
        &self,
        speed: &[f64],
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> Vec<Interval> {
        let peaks = find_peaks(
            speed,
            features.thresholds.high_speed,
            config.min_interval_duration,
        );

        let candidates: Vec<Interval> = peaks
            .iter()
            .map(|&p| Self::expand_peak(p, speed, features, config))
            .filter(|c| c.duration() >= config.min_interval_duration)
            .collect();

        debug!(
            "[Peaks] {} peaks above {:.2} km/h -> {} candidates",
            peaks.len(),
            features.thresholds.high_speed,
            candidates.len()
        );

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::test_support::{features_for, plateau_series};

    #[test]
    fn test_find_peaks_simple() {
        let series = vec![0.0, 1.0, 5.0, 1.0, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&series, 0.0, 1), vec![2, 5]);
        assert_eq!(find_peaks(&series, 3.0, 1), vec![2]);
    }

    #[test]
    fn test_find_peaks_flat_top_uses_middle() {
        let series = vec![0.0, 3.0, 3.0, 3.0, 3.0, 3.0, 0.0];
        assert_eq!(find_peaks(&series, 0.0, 1), vec![3]);
    }

    #[test]
    fn test_find_peaks_ignores_edges() {
        let series = vec![9.0, 1.0, 2.0, 1.0, 9.0];
        assert_eq!(find_peaks(&series, 0.0, 1), vec![2]);
    }

    #[test]
    fn test_find_peaks_distance_keeps_highest() {
        let series = vec![0.0, 4.0, 0.0, 6.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0];
        assert_eq!(find_peaks(&series, 0.0, 3), vec![3, 10]);
    }

    #[test]
    fn test_plateau_yields_one_candidate() {
        let config = DetectionConfig::default().with_min_interval_duration(15);
        let speed = plateau_series(5.0, 18.0, 20, 10, 30, 40);
        let features = features_for(&speed, &config);

        let candidates = PeakGenerator.generate(&speed, &features, &config);
        assert_eq!(candidates.len(), 1);
        let c = candidates[0];
        assert!(c.start >= 20 && c.start <= 32, "start {}", c.start);
        assert!(c.end >= 58 && c.end <= 72, "end {}", c.end);
    }

    #[test]
    fn test_no_peaks_below_threshold() {
        let config = DetectionConfig::default();
        let speed = plateau_series(2.0, 6.0, 20, 10, 30, 40);
        let mut features = features_for(&speed, &config);
        features.thresholds.high_speed = 50.0;

        assert!(PeakGenerator.generate(&speed, &features, &config).is_empty());
    }

    #[test]
    fn test_unbounded_search_window_clamps_to_series() {
        let config = DetectionConfig {
            peak_search_window: usize::MAX,
            ..DetectionConfig::default().with_min_interval_duration(15)
        };
        let speed = plateau_series(5.0, 18.0, 20, 10, 30, 40);
        let features = features_for(&speed, &config);

        let candidates = PeakGenerator.generate(&speed, &features, &config);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].end < speed.len());
    }
}
