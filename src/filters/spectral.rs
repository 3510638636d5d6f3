//! Iterative frequency-domain low-pass filter.
//!
//! Each pass transforms the current signal, zeroes every component whose
//! frequency magnitude exceeds the cutoff, inverse-transforms, keeps the
//! real part, clamps negatives, and rebalances against the input volume.
//! The next pass starts from that output.

use super::clamp_non_negative;
use crate::balance::balance;
use crate::error::{Result, StreamflowError};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Sample frequencies for an `n`-point transform with spacing `time_step`.
///
/// Ordered like the transform output: zero, positive frequencies, then
/// negative frequencies.
pub fn fft_frequencies(n: usize, time_step: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * time_step);
    let positive = (n - 1) / 2 + 1;
    (0..n)
        .map(|k| {
            if k < positive {
                k as f64 * scale
            } else {
                (k as f64 - n as f64) * scale
            }
        })
        .collect()
}

/// Frequency-truncated series after `iterations` passes
pub fn fft_filter(
    values: &[f64],
    cutoff_frequency: f64,
    time_step: f64,
    iterations: usize,
) -> Result<Vec<f64>> {
    if !(time_step.is_finite() && time_step > 0.0) {
        return Err(StreamflowError::invalid_parameter(
            "time_step",
            format!("must be a positive number, got {time_step}"),
        ));
    }
    if !(cutoff_frequency.is_finite() && cutoff_frequency >= 0.0) {
        return Err(StreamflowError::invalid_parameter(
            "cutoff_frequency",
            format!("must be a non-negative number, got {cutoff_frequency}"),
        ));
    }
    if iterations == 0 {
        return Err(StreamflowError::invalid_parameter(
            "iterations",
            "must be at least 1",
        ));
    }

    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);
    let frequencies = fft_frequencies(n, time_step);
    let norm = 1.0 / n as f64;

    let mut current = values.to_vec();
    for _ in 0..iterations {
        let mut spectrum: Vec<Complex<f64>> =
            current.iter().map(|&v| Complex::new(v, 0.0)).collect();
        forward.process(&mut spectrum);

        for (bin, frequency) in spectrum.iter_mut().zip(&frequencies) {
            if frequency.abs() > cutoff_frequency {
                *bin = Complex::new(0.0, 0.0);
            }
        }

        inverse.process(&mut spectrum);
        // rustfft is unnormalized
        let mut filtered: Vec<f64> = spectrum.iter().map(|c| c.re * norm).collect();

        clamp_non_negative(&mut filtered);
        current = balance(values, &filtered)?;
    }

    Ok(current)
}
