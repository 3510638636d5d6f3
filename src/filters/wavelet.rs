//! Continuous wavelet transform smoothing.
//!
//! The series is edge-padded, convolved with a complete Morlet wavelet at a
//! single scale, and the coefficient magnitude at that scale becomes the
//! smoothed signal. Only the requested row of the transform is evaluated;
//! the other scales never contribute to the output.

use super::clamp_non_negative;
use crate::balance::balance;
use crate::config::CWT_MAX_WIDTH;
use crate::error::{Result, StreamflowError};
use num_complex::Complex;
use std::f64::consts::PI;

/// Samples of edge value added on each side before the transform
pub const EDGE_PADDING: usize = 24;

/// Complete Morlet wavelet with `points` samples and frequency `omega`,
/// sampled on `[-2pi, 2pi]`
pub fn morlet(points: usize, omega: f64) -> Vec<Complex<f64>> {
    let start = -2.0 * PI;
    let step = if points > 1 {
        4.0 * PI / (points - 1) as f64
    } else {
        0.0
    };
    let correction = (-0.5 * omega * omega).exp();
    let norm = PI.powf(-0.25);

    (0..points)
        .map(|i| {
            let x = start + step * i as f64;
            let carrier = Complex::from_polar(1.0, omega * x) - correction;
            carrier * ((-0.5 * x * x).exp() * norm)
        })
        .collect()
}

/// Magnitude of the CWT row at `width`, same length as `data`
fn cwt_row_magnitude(data: &[f64], width: usize) -> Vec<f64> {
    let len = data.len();
    let points = (10 * width).min(len);
    let wavelet = morlet(points, width as f64);

    // Convolving with the reversed conjugate is correlating with the conjugate
    let kernel: Vec<Complex<f64>> = wavelet.iter().rev().map(|c| c.conj()).collect();
    let offset = (points - 1) / 2;

    (0..len)
        .map(|i| {
            let m = i + offset;
            let lo = (m + 1).saturating_sub(len);
            let hi = m.min(points - 1);
            (lo..=hi)
                .map(|q| kernel[q] * data[m - q])
                .fold(Complex::new(0.0, 0.0), |acc, term| acc + term)
                .norm()
        })
        .collect()
}

/// Wavelet-smoothed series at scale `cwt_row + 1`, volume balanced
pub fn wavelet_filter(values: &[f64], cwt_row: usize) -> Result<Vec<f64>> {
    if cwt_row >= CWT_MAX_WIDTH {
        return Err(StreamflowError::invalid_parameter(
            "cwt_row",
            format!("must be below {CWT_MAX_WIDTH}, got {cwt_row}"),
        ));
    }
    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let first = values[0];
    let last = values[n - 1];
    let mut padded = Vec::with_capacity(n + 2 * EDGE_PADDING);
    padded.extend(std::iter::repeat_n(first, EDGE_PADDING));
    padded.extend_from_slice(values);
    padded.extend(std::iter::repeat_n(last, EDGE_PADDING));

    let row = cwt_row_magnitude(&padded, cwt_row + 1);
    let mut smoothed = row[EDGE_PADDING..EDGE_PADDING + n].to_vec();

    clamp_non_negative(&mut smoothed);
    balance(values, &smoothed)
}
