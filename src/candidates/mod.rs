//! # Candidate Generators
//!
//! Each generator proposes provisional `(start, end)` intervals from the
//! smoothed speed series and its features. They share one signature so the
//! engine can pick and combine them by policy:
//!
//! - [`PeakGenerator`] anchors on prominent speed peaks and scans outward
//!   for onset and offset. Precise on clearly bimodal efforts.
//! - [`StateMachineGenerator`] follows gradual build-up and decline through
//!   a Recovery / Building / Interval automaton.
//! - [`PercentileGenerator`] takes runs above a high percentile. Weak, but
//!   always finds something on a varied series.
//! - [`WindowedAccelerationGenerator`] scans windowed mean acceleration.
//!
//! Candidates may overlap and are not filtered for recovery gaps; that is
//! the reconciler's job.

mod peaks;
mod percentile;
mod state_machine;
mod windowed;

pub use peaks::{find_peaks, PeakGenerator};
pub use percentile::PercentileGenerator;
pub use state_machine::{DetectionState, StateMachineGenerator};
pub use windowed::WindowedAccelerationGenerator;

use crate::features::FeatureSet;
use crate::{DetectionConfig, Interval};

/// A detection strategy producing provisional intervals.
///
/// Implementations are read-only over their inputs, so several may run on
/// the same series concurrently.
pub trait CandidateGenerator: Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Propose candidate intervals. Every returned interval satisfies
    /// `start < end < speed.len()`.
    fn generate(
        &self,
        speed: &[f64],
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> Vec<Interval>;
}

/// Mean of `series[start..=end]`.
pub(crate) fn span_mean(series: &[f64], start: usize, end: usize) -> f64 {
    let span = &series[start..=end];
    span.iter().sum::<f64>() / span.len() as f64
}
