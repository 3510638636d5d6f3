//! Strided rolling mean.
//!
//! Windows of `window` samples start every `stride` positions; the mean of
//! each window lands on its centre `start + window / 2`. Positions that are
//! never a centre keep the raw observation. No volume balancing happens here.

use super::{PrefixMean, clamp_non_negative};
use crate::error::{Result, StreamflowError};

/// Rolling mean evaluated every `stride` samples, back-filled from `raw`
pub fn rolling_with_stride(
    values: &[f64],
    raw: &[f64],
    window: usize,
    stride: usize,
) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(StreamflowError::invalid_parameter(
            "window_size",
            "must be at least 1",
        ));
    }
    if stride == 0 {
        return Err(StreamflowError::invalid_parameter("stride", "must be at least 1"));
    }
    if raw.len() != values.len() {
        return Err(StreamflowError::invalid_parameter(
            "raw",
            format!("{} raw values for {} samples", raw.len(), values.len()),
        ));
    }

    let n = values.len();
    let mut centres = vec![f64::NAN; n];
    if n >= window {
        let prefix = PrefixMean::new(values);
        for start in (0..=n - window).step_by(stride) {
            centres[start + window / 2] = prefix.mean(start, start + window - 1);
        }
    }
    clamp_non_negative(&mut centres);

    Ok(centres
        .into_iter()
        .zip(raw)
        .map(|(centre, &observed)| if centre.is_nan() { observed } else { centre })
        .collect())
}
