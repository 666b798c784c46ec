//! Per-interval and per-recovery statistics for reporting.
//!
//! Pure aggregation over the engine's output and the aligned telemetry. No
//! detection logic lives here.
//!
//! ## Example
//! ```rust
//! use interval_detector::{summarize, ActivityTelemetry, Interval};
//!
//! let speed = vec![Some(12.0); 100];
//! let telemetry = ActivityTelemetry::from_speed(speed);
//! let summary = summarize(&[Interval::new(10, 40), Interval::new(60, 90)], &telemetry).unwrap();
//! assert_eq!(summary.intervals.len(), 2);
//! assert_eq!(summary.recoveries.len(), 1);
//! assert_eq!(summary.recoveries[0].duration_seconds, 20);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{IntervalError, Result};
use crate::{ActivityTelemetry, Interval};

/// Mean heart rate above which an interval counts as a hard effort.
pub const DEFAULT_HIGH_HR_BPM: f64 = 150.0;

/// Statistics for one span of the activity (a work interval or a recovery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSummary {
    pub start: usize,
    pub end: usize,
    /// Elapsed seconds (`end - start` at 1 Hz)
    pub duration_seconds: usize,
    /// Mean speed in km/h over valid samples
    pub avg_speed_kmh: Option<f64>,
    /// Mean heart rate in bpm over valid samples
    pub avg_heart_rate: Option<f64>,
    /// Distance covered in meters
    pub distance_meters: Option<f64>,
}

impl SpanSummary {
    /// Duration rounded to whole minutes
    pub fn duration_minutes(&self) -> u64 {
        (self.duration_seconds as f64 / 60.0).round() as u64
    }
}

/// Summary of a whole session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// One entry per work interval
    pub intervals: Vec<SpanSummary>,
    /// One entry per gap between consecutive work intervals
    pub recoveries: Vec<SpanSummary>,
}

impl SessionSummary {
    /// Work intervals whose mean heart rate is above `min_bpm`.
    pub fn high_heart_rate_intervals(&self, min_bpm: f64) -> Vec<&SpanSummary> {
        self.intervals
            .iter()
            .filter(|s| s.avg_heart_rate.is_some_and(|hr| hr > min_bpm))
            .collect()
    }

    /// Total seconds spent in work intervals.
    pub fn total_work_seconds(&self) -> usize {
        self.intervals.iter().map(|s| s.duration_seconds).sum()
    }
}

/// Mean of the valid samples in `series[start..=end]`.
fn valid_mean(series: &[Option<f64>], start: usize, end: usize) -> Option<f64> {
    let (sum, count) = series[start..=end]
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Last valid cumulative distance minus the first valid one in the span.
fn distance_delta(series: &[Option<f64>], start: usize, end: usize) -> Option<f64> {
    let span = &series[start..=end];
    let first = span.iter().flatten().find(|v| v.is_finite())?;
    let last = span.iter().rev().flatten().find(|v| v.is_finite())?;
    Some(last - first)
}

fn check_bounds(series: &'static str, len: usize, span: &Interval) -> Result<()> {
    if span.end >= len || span.start > span.end {
        return Err(IntervalError::OutOfBounds {
            series,
            index: span.end.max(span.start),
            len,
        });
    }
    Ok(())
}

fn summarize_span(span: Interval, telemetry: &ActivityTelemetry) -> Result<SpanSummary> {
    check_bounds("speed", telemetry.speed.len(), &span)?;
    if let Some(hr) = &telemetry.heart_rate {
        check_bounds("heart_rate", hr.len(), &span)?;
    }
    if let Some(distance) = &telemetry.distance {
        check_bounds("distance", distance.len(), &span)?;
    }

    Ok(SpanSummary {
        start: span.start,
        end: span.end,
        duration_seconds: span.duration(),
        avg_speed_kmh: valid_mean(&telemetry.speed, span.start, span.end),
        avg_heart_rate: telemetry
            .heart_rate
            .as_deref()
            .and_then(|hr| valid_mean(hr, span.start, span.end)),
        distance_meters: telemetry
            .distance
            .as_deref()
            .and_then(|d| distance_delta(d, span.start, span.end)),
    })
}

/// Summarize work intervals and the recoveries between them.
///
/// # Errors
/// `OutOfBounds` if an interval reaches past the end of any provided series.
pub fn summarize(intervals: &[Interval], telemetry: &ActivityTelemetry) -> Result<SessionSummary> {
    let work = intervals
        .iter()
        .map(|&i| summarize_span(i, telemetry))
        .collect::<Result<Vec<_>>>()?;

    let recoveries = intervals
        .windows(2)
        .filter(|pair| pair[1].start > pair[0].end)
        .map(|pair| summarize_span(Interval::new(pair[0].end, pair[1].start), telemetry))
        .collect::<Result<Vec<_>>>()?;

    Ok(SessionSummary {
        intervals: work,
        recoveries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry() -> ActivityTelemetry {
        let speed: Vec<Option<f64>> = (0..100)
            .map(|i| Some(if (20..50).contains(&i) { 18.0 } else { 6.0 }))
            .collect();
        let heart_rate: Vec<Option<f64>> = (0..100)
            .map(|i| {
                if i == 30 {
                    None
                } else if (20..50).contains(&i) {
                    Some(165.0)
                } else {
                    Some(120.0)
                }
            })
            .collect();
        let distance: Vec<Option<f64>> = (0..100).map(|i| Some(i as f64 * 4.0)).collect();

        ActivityTelemetry::from_speed(speed)
            .with_heart_rate(heart_rate)
            .with_distance(distance)
    }

    #[test]
    fn test_interval_stats() {
        let summary = summarize(&[Interval::new(20, 49)], &telemetry()).unwrap();
        let s = &summary.intervals[0];

        assert_eq!(s.duration_seconds, 29);
        assert_eq!(s.avg_speed_kmh, Some(18.0));
        assert_eq!(s.avg_heart_rate, Some(165.0));
        assert_eq!(s.distance_meters, Some(116.0));
        assert!(summary.recoveries.is_empty());
    }

    #[test]
    fn test_recovery_between_intervals() {
        let summary = summarize(
            &[Interval::new(0, 10), Interval::new(60, 90)],
            &telemetry(),
        )
        .unwrap();

        assert_eq!(summary.recoveries.len(), 1);
        let r = &summary.recoveries[0];
        assert_eq!((r.start, r.end), (10, 60));
        assert_eq!(r.duration_seconds, 50);
        assert_eq!(r.distance_meters, Some(200.0));
    }

    #[test]
    fn test_missing_aux_series() {
        let telemetry = ActivityTelemetry::from_speed(vec![Some(10.0); 50]);
        let summary = summarize(&[Interval::new(5, 45)], &telemetry).unwrap();

        assert_eq!(summary.intervals[0].avg_heart_rate, None);
        assert_eq!(summary.intervals[0].distance_meters, None);
    }

    #[test]
    fn test_out_of_bounds() {
        let result = summarize(&[Interval::new(80, 120)], &telemetry());
        assert!(matches!(
            result,
            Err(IntervalError::OutOfBounds {
                series: "speed",
                index: 120,
                len: 100
            })
        ));
    }

    #[test]
    fn test_short_aux_series_out_of_bounds() {
        let telemetry = ActivityTelemetry::from_speed(vec![Some(10.0); 100])
            .with_heart_rate(vec![Some(140.0); 50]);
        let result = summarize(&[Interval::new(40, 70)], &telemetry);
        assert!(matches!(
            result,
            Err(IntervalError::OutOfBounds {
                series: "heart_rate",
                ..
            })
        ));
    }

    #[test]
    fn test_high_heart_rate_filter() {
        let summary = summarize(
            &[Interval::new(20, 49), Interval::new(60, 95)],
            &telemetry(),
        )
        .unwrap();

        let hard = summary.high_heart_rate_intervals(DEFAULT_HIGH_HR_BPM);
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].start, 20);
        assert_eq!(summary.total_work_seconds(), 29 + 35);
    }

    #[test]
    fn test_duration_minutes_rounds() {
        let span = SpanSummary {
            start: 0,
            end: 90,
            duration_seconds: 90,
            avg_speed_kmh: None,
            avg_heart_rate: None,
            distance_meters: None,
        };
        assert_eq!(span.duration_minutes(), 2);
    }
}
