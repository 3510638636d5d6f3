//! Centered moving average and the forward/backward moving-average difference.

use super::{PrefixMean, clamp_non_negative};
use crate::balance::balance;
use crate::error::{Result, StreamflowError};

fn check_window(window_size: usize) -> Result<()> {
    if window_size == 0 {
        return Err(StreamflowError::invalid_parameter(
            "window_size",
            "must be at least 1",
        ));
    }
    Ok(())
}

/// Centered rolling mean, volume balanced.
///
/// The window for index `i` spans `i + (w-1)/2 + 1 - w ..= i + (w-1)/2`, so even
/// windows lean one sample to the past. Windows are clipped at the series
/// edges and averaged over the samples they still contain; any position with
/// no observed sample at all is filled backward, then forward.
pub fn moving_average(values: &[f64], window_size: usize) -> Result<Vec<f64>> {
    check_window(window_size)?;
    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let prefix = PrefixMean::new(values);
    let offset = (window_size - 1) / 2;
    let mut smoothed: Vec<f64> = (0..n)
        .map(|i| {
            let lo = (i + offset + 1).saturating_sub(window_size);
            let hi = (i + offset).min(n - 1);
            prefix.mean(lo, hi)
        })
        .collect();

    backward_fill(&mut smoothed);
    forward_fill(&mut smoothed);
    clamp_non_negative(&mut smoothed);

    balance(values, &smoothed)
}

/// Absolute difference between the trailing and the leading rolling mean.
///
/// This is a volatility signal rather than a denoised flow; it is still
/// balanced to the input volume so it can sit in a method chain.
pub fn moving_average_difference(values: &[f64], window_size: usize) -> Result<Vec<f64>> {
    check_window(window_size)?;
    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let prefix = PrefixMean::new(values);
    let mut difference: Vec<f64> = (0..n)
        .map(|i| {
            let forward = prefix.mean((i + 1).saturating_sub(window_size), i);
            let backward = prefix.mean(i, (i + window_size - 1).min(n - 1));
            (forward - backward).abs()
        })
        .collect();

    clamp_non_negative(&mut difference);
    balance(values, &difference)
}

pub(crate) fn backward_fill(values: &mut [f64]) {
    let mut next = f64::NAN;
    for value in values.iter_mut().rev() {
        if value.is_nan() {
            *value = next;
        } else {
            next = *value;
        }
    }
}

pub(crate) fn forward_fill(values: &mut [f64]) {
    let mut last = f64::NAN;
    for value in values.iter_mut() {
        if value.is_nan() {
            *value = last;
        } else {
            last = *value;
        }
    }
}
