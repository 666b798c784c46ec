//! Gap filling and smoothing of raw speed samples.
//!
//! Sensor dropout shows up as missing samples. They are filled by linear
//! interpolation over the index axis, and the resulting dense series is
//! smoothed with a centered moving average so single-sample jitter does not
//! register as acceleration.

use log::debug;

use crate::error::{OptionExt, Result};
use crate::DetectionConfig;

/// Returns the sample if it can be used as a speed value.
#[inline]
fn valid_sample(sample: Option<f64>) -> Option<f64> {
    sample.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Fill missing samples.
///
/// Interior gaps are linearly interpolated between the surrounding valid
/// samples. Gaps at the head or tail take the nearest valid value.
///
/// Non-finite and negative samples count as missing.
///
/// # Errors
/// `DataQuality` if the input is empty or has no valid sample.
pub fn fill_gaps(raw: &[Option<f64>]) -> Result<Vec<f64>> {
    let first_valid = raw
        .iter()
        .position(|s| valid_sample(*s).is_some())
        .ok_or_data_quality("speed series is empty or entirely missing")?;

    let mut filled = Vec::with_capacity(raw.len());
    let head_value = valid_sample(raw[first_valid]).unwrap_or_default();
    filled.resize(first_valid, head_value);

    let mut last_valid = first_valid;
    let mut missing = 0usize;
    filled.push(head_value);

    for (i, sample) in raw.iter().enumerate().skip(first_valid + 1) {
        let Some(value) = valid_sample(*sample) else {
            missing += 1;
            continue;
        };

        let gap = i - last_valid;
        if gap > 1 {
            let from = filled[last_valid];
            let step = (value - from) / gap as f64;
            for k in 1..gap {
                filled.push(from + step * k as f64);
            }
        }
        filled.push(value);
        last_valid = i;
    }

    // Tail back-fill
    let tail_value = filled[last_valid];
    filled.resize(raw.len(), tail_value);

    if missing > 0 || first_valid > 0 {
        debug!(
            "[Preprocess] Filled {} missing samples of {}",
            missing + first_valid,
            raw.len()
        );
    }

    Ok(filled)
}

/// Mirror an out-of-range index back into `0..len` (`d c b a | a b c d | d c b a`).
#[inline]
fn reflect_index(idx: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let k = idx.rem_euclid(period);
    if k >= len as isize {
        (period - 1 - k) as usize
    } else {
        k as usize
    }
}

/// Centered moving average with mirrored edges.
///
/// The output has the same length as the input. For even windows the extra
/// sample is taken on the left.
pub fn smooth(series: &[f64], window: usize) -> Vec<f64> {
    if series.is_empty() || window <= 1 {
        return series.to_vec();
    }

    let len = series.len();
    let half = (window / 2) as isize;

    (0..len as isize)
        .map(|i| {
            let sum: f64 = (i - half..i - half + window as isize)
                .map(|j| series[reflect_index(j, len)])
                .sum();
            sum / window as f64
        })
        .collect()
}

/// Fill gaps, then smooth, using the configured window.
pub fn preprocess(raw: &[Option<f64>], config: &DetectionConfig) -> Result<Vec<f64>> {
    let filled = fill_gaps(raw)?;
    Ok(smooth(&filled, config.smoothing_window))
}
