//! Reconciliation of raw candidates into the final interval list.
//!
//! Order matters: fragments are merged before the duration filter runs, so a
//! short piece that only becomes a valid interval once bridged to its
//! neighbour is kept.

use log::debug;

use crate::{DetectionConfig, Interval};

/// Sort candidates and merge the ones that overlap or touch.
pub fn merge_overlapping(mut candidates: Vec<Interval>) -> Vec<Interval> {
    candidates.sort_unstable_by_key(|c| (c.start, c.end));

    let mut merged: Vec<Interval> = Vec::with_capacity(candidates.len());
    for current in candidates {
        match merged.last_mut() {
            Some(last) if current.start <= last.end => {
                last.end = last.end.max(current.end);
            }
            _ => merged.push(current),
        }
    }
    merged
}

/// Bridge gaps shorter than `min_gap` between consecutive sorted,
/// non-overlapping intervals.
pub fn merge_close(intervals: Vec<Interval>, min_gap: usize) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for current in intervals {
        match merged.last_mut() {
            Some(last) if current.start.saturating_sub(last.end) < min_gap => {
                last.end = last.end.max(current.end);
            }
            _ => merged.push(current),
        }
    }
    merged
}

/// Produce the final interval list: sorted, non-overlapping, separated by at
/// least `min_recovery_duration` and each at least `min_interval_duration`
/// long.
///
/// Running it again on its own output changes nothing.
pub fn reconcile(candidates: Vec<Interval>, config: &DetectionConfig) -> Vec<Interval> {
    let candidate_count = candidates.len();

    let merged = merge_overlapping(candidates);
    let overlap_merged = merged.len();

    let bridged = merge_close(merged, config.min_recovery_duration);
    let bridged_count = bridged.len();

    let result: Vec<Interval> = bridged
        .into_iter()
        .filter(|i| i.duration() >= config.min_interval_duration)
        .collect();

    debug!(
        "[Reconcile] {} candidates -> {} after overlap merge -> {} after gap merge -> {} final",
        candidate_count,
        overlap_merged,
        bridged_count,
        result.len()
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_interval: usize, min_recovery: usize) -> DetectionConfig {
        DetectionConfig::default()
            .with_min_interval_duration(min_interval)
            .with_min_recovery_duration(min_recovery)
    }

    #[test]
    fn test_overlapping_and_touching_merge() {
        let merged = merge_overlapping(vec![
            Interval::new(50, 80),
            Interval::new(10, 30),
            Interval::new(25, 40),
            Interval::new(40, 45),
        ]);
        assert_eq!(merged, vec![Interval::new(10, 45), Interval::new(50, 80)]);
    }

    #[test]
    fn test_contained_candidate_absorbed() {
        let merged = merge_overlapping(vec![Interval::new(10, 100), Interval::new(20, 30)]);
        assert_eq!(merged, vec![Interval::new(10, 100)]);
    }

    #[test]
    fn test_near_gap_bridged() {
        let result = reconcile(
            vec![Interval::new(0, 40), Interval::new(50, 90)],
            &config(30, 15),
        );
        assert_eq!(result, vec![Interval::new(0, 90)]);
    }

    #[test]
    fn test_wide_gap_kept() {
        let result = reconcile(
            vec![Interval::new(0, 40), Interval::new(60, 100)],
            &config(30, 15),
        );
        assert_eq!(result, vec![Interval::new(0, 40), Interval::new(60, 100)]);
    }

    #[test]
    fn test_short_fragments_rescued_by_bridging() {
        // Neither fragment is long enough on its own
        let result = reconcile(
            vec![Interval::new(0, 20), Interval::new(25, 45)],
            &config(30, 15),
        );
        assert_eq!(result, vec![Interval::new(0, 45)]);
    }

    #[test]
    fn test_short_isolated_dropped() {
        let result = reconcile(
            vec![Interval::new(0, 10), Interval::new(100, 150)],
            &config(30, 15),
        );
        assert_eq!(result, vec![Interval::new(100, 150)]);
    }

    #[test]
    fn test_chain_of_close_candidates() {
        let result = reconcile(
            vec![
                Interval::new(0, 10),
                Interval::new(15, 25),
                Interval::new(30, 40),
                Interval::new(45, 55),
            ],
            &config(30, 15),
        );
        assert_eq!(result, vec![Interval::new(0, 55)]);
    }

    #[test]
    fn test_idempotent() {
        let cfg = config(20, 10);
        let candidates = vec![
            Interval::new(5, 12),
            Interval::new(14, 40),
            Interval::new(45, 50),
            Interval::new(90, 130),
            Interval::new(125, 140),
            Interval::new(200, 205),
        ];
        let once = reconcile(candidates, &cfg);
        let twice = reconcile(once.clone(), &cfg);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty() {
        assert!(reconcile(Vec::new(), &DetectionConfig::default()).is_empty());
    }
}
