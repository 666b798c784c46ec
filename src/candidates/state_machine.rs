//! Three-state automaton for gradual intensity transitions.
//!
//! Peak detection needs a clear maximum. Efforts that ramp up slowly and fade
//! out slowly have none, so this generator tracks the transitions instead:
//!
//! ```text
//!   Recovery --(accel > a, speed > low)--> Building
//!   Building --(speed > high)------------> Interval
//!   Building --(accel < -a)--------------> Recovery
//!   Interval --(speed < low, or
//!               long enough and accel < -a/2)--> Recovery
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use super::CandidateGenerator;
use crate::features::FeatureSet;
use crate::{DetectionConfig, Interval};

/// State of the automaton at one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionState {
    Recovery,
    /// Intensity rising; `potential_start` is where the rise began
    Building { potential_start: usize },
    /// Committed to an interval that began at `start`; `entered` is the
    /// sample at which the state was entered
    Interval { start: usize, entered: usize },
}

/// Candidate generator driven by [`DetectionState`] transitions.
///
/// An interval still open at the end of the series is closed at the last
/// sample and kept if it has lasted long enough.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMachineGenerator;

impl StateMachineGenerator {
    /// Advance the automaton by one sample, returning the next state and any
    /// completed interval.
    fn step(
        state: DetectionState,
        i: usize,
        speed: f64,
        accel: f64,
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> (DetectionState, Option<Interval>) {
        let t = &features.thresholds;

        match state {
            DetectionState::Recovery => {
                if accel > t.acceleration && speed > t.low_speed {
                    (DetectionState::Building { potential_start: i }, None)
                } else {
                    (state, None)
                }
            }
            DetectionState::Building { potential_start } => {
                if speed > t.high_speed {
                    (
                        DetectionState::Interval {
                            start: potential_start,
                            entered: i,
                        },
                        None,
                    )
                } else if accel < -t.acceleration {
                    (DetectionState::Recovery, None)
                } else {
                    (state, None)
                }
            }
            DetectionState::Interval { start, entered } => {
                let elapsed = i - entered;
                let dropped = speed < t.low_speed;
                let soft_decline =
                    elapsed > config.min_interval_duration && accel < -t.acceleration / 2.0;

                if dropped || soft_decline {
                    let emitted = (elapsed >= config.min_interval_duration)
                        .then(|| Interval::new(start, i));
                    (DetectionState::Recovery, emitted)
                } else {
                    (state, None)
                }
            }
        }
    }
}

impl CandidateGenerator for StateMachineGenerator {
    fn name(&self) -> &'static str {
        "state_machine"
    }

    fn generate(
        &self,
        speed: &[f64],
        features: &FeatureSet,
        config: &DetectionConfig,
    ) -> Vec<Interval> {
        let mut state = DetectionState::Recovery;
        let mut candidates = Vec::new();
        let mut false_starts = 0usize;

        for (i, (&v, &a)) in speed.iter().zip(&features.gradient).enumerate() {
            let (next, emitted) = Self::step(state, i, v, a, features, config);
            if matches!(state, DetectionState::Building { .. })
                && next == DetectionState::Recovery
            {
                false_starts += 1;
            }
            candidates.extend(emitted);
            state = next;
        }

        if let DetectionState::Interval { start, entered } = state {
            let last = speed.len() - 1;
            if last - entered >= config.min_interval_duration {
                candidates.push(Interval::new(start, last));
            }
        }

        debug!(
            "[StateMachine] {} candidates, {} false starts",
            candidates.len(),
            false_starts
        );

        candidates
    }
}
