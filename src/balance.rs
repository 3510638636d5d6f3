//! Total-volume balancing.
//!
//! Every smoothing method ends by rescaling its output so the summed flow
//! equals the summed flow of its input: smoothing may move volume in time
//! but never creates or destroys it.

use crate::error::{Result, StreamflowError};
use tracing::debug;

/// Sum ignoring missing values
pub fn total_volume(values: &[f64]) -> f64 {
    values.iter().filter(|v| !v.is_nan()).sum()
}

/// Rescale `transformed` so its total matches the total of `original`.
///
/// Fails with [`StreamflowError::DegenerateSeries`] when the transformed
/// total is zero or not finite, since no scale factor exists.
pub fn balance(original: &[f64], transformed: &[f64]) -> Result<Vec<f64>> {
    if original.len() != transformed.len() {
        return Err(StreamflowError::invalid_parameter(
            "transformed",
            format!(
                "length {} does not match original length {}",
                transformed.len(),
                original.len()
            ),
        ));
    }

    let total_before = total_volume(original);
    let total_transformed = total_volume(transformed);

    if !total_before.is_finite() || !total_transformed.is_finite() {
        return Err(StreamflowError::degenerate(format!(
            "non-finite total volume (original {total_before}, transformed {total_transformed})"
        )));
    }
    if total_transformed == 0.0 {
        return Err(StreamflowError::degenerate(
            "transformed series sums to zero, volume cannot be rebalanced",
        ));
    }

    let scale = total_before / total_transformed;
    let balanced: Vec<f64> = transformed.iter().map(|v| v * scale).collect();

    debug!(
        total_before,
        total_after = total_volume(&balanced),
        scale,
        "volume balanced"
    );

    Ok(balanced)
}
