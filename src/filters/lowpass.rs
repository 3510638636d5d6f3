//! Digital Butterworth low-pass filter applied forward and backward.
//!
//! The design follows the usual analog-prototype route: Butterworth poles
//! on the unit circle, frequency prewarping, low-pass scaling, and the
//! bilinear transform. Zero-phase filtering pads the signal with an odd
//! reflection of `3 * (order + 1)` samples at each end and starts both
//! passes from steady-state initial conditions.

use super::clamp_non_negative;
use super::linalg::solve;
use crate::balance::balance;
use crate::error::{Result, StreamflowError};
use num_complex::Complex;
use std::f64::consts::PI;

/// Transfer-function coefficients, `a[0] == 1`
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCoefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Design an `order`-th order low-pass at `normalized_cutoff` (fraction of Nyquist, in (0, 1))
pub fn butterworth_lowpass(order: usize, normalized_cutoff: f64) -> Result<FilterCoefficients> {
    if order == 0 {
        return Err(StreamflowError::invalid_parameter("order", "must be at least 1"));
    }
    if !(normalized_cutoff > 0.0 && normalized_cutoff < 1.0) {
        return Err(StreamflowError::invalid_parameter(
            "cutoff_frequency",
            format!("normalized cutoff {normalized_cutoff} must lie strictly between 0 and 1"),
        ));
    }

    let n = order as f64;
    // Analog prototype poles: -exp(i*pi*m/(2n)) for m = -n+1, -n+3, ..., n-1
    let prototype: Vec<Complex<f64>> = (0..order)
        .map(|j| {
            let m = -(n - 1.0) + 2.0 * j as f64;
            -Complex::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();

    // Prewarp for a sample rate of 2 (Nyquist = 1)
    let fs = 2.0;
    let warped = 2.0 * fs * (PI * normalized_cutoff / fs).tan();
    let analog_poles: Vec<Complex<f64>> = prototype.iter().map(|&p| p * warped).collect();
    let analog_gain = warped.powi(order as i32);

    // Bilinear transform: all zeros land on z = -1
    let fs2 = Complex::new(2.0 * fs, 0.0);
    let digital_poles: Vec<Complex<f64>> = analog_poles
        .iter()
        .map(|&p| (fs2 + p) / (fs2 - p))
        .collect();
    let denominator_gain = analog_poles
        .iter()
        .fold(Complex::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
    let gain = analog_gain * (Complex::new(1.0, 0.0) / denominator_gain).re;

    let zeros = vec![Complex::new(-1.0, 0.0); order];
    let b = poly(&zeros).into_iter().map(|c| c * gain).collect();
    let a = poly(&digital_poles);

    Ok(FilterCoefficients { b, a })
}

/// Real coefficients of the monic polynomial with the given roots, highest power first
fn poly(roots: &[Complex<f64>]) -> Vec<f64> {
    let mut coefficients = vec![Complex::new(1.0, 0.0)];
    for &root in roots {
        let mut next = coefficients.clone();
        next.push(Complex::new(0.0, 0.0));
        for (i, c) in coefficients.iter().enumerate() {
            next[i + 1] -= root * *c;
        }
        coefficients = next;
    }
    coefficients.into_iter().map(|c| c.re).collect()
}

/// Direct form II transposed IIR filter starting from state `zi`
fn lfilter(coefficients: &FilterCoefficients, input: &[f64], zi: &[f64]) -> Vec<f64> {
    let FilterCoefficients { b, a } = coefficients;
    let order = a.len() - 1;
    let mut state = zi.to_vec();
    let mut output = Vec::with_capacity(input.len());

    for &x in input {
        let y = b[0] * x + state.first().copied().unwrap_or(0.0);
        for i in 0..order {
            let carried = if i + 1 < order { state[i + 1] } else { 0.0 };
            state[i] = b[i + 1] * x + carried - a[i + 1] * y;
        }
        output.push(y);
    }
    output
}

/// Steady-state initial conditions for a unit step input
fn lfilter_zi(coefficients: &FilterCoefficients) -> Result<Vec<f64>> {
    let FilterCoefficients { b, a } = coefficients;
    let order = a.len() - 1;

    // (I - companion(a)^T) zi = b[1..] - a[1..] * b[0]
    let matrix = (0..order)
        .map(|row| {
            (0..order)
                .map(|col| {
                    let identity = if row == col { 1.0 } else { 0.0 };
                    let first_column = if col == 0 { -a[row + 1] } else { 0.0 };
                    let superdiagonal = if col == row + 1 { 1.0 } else { 0.0 };
                    identity - first_column - superdiagonal
                })
                .collect()
        })
        .collect();
    let rhs = (0..order).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();

    solve(matrix, rhs).ok_or_else(|| {
        StreamflowError::degenerate("filter initial conditions are singular")
    })
}

/// Zero-phase forward-backward filtering with odd-reflection padding
pub fn filtfilt(coefficients: &FilterCoefficients, values: &[f64]) -> Result<Vec<f64>> {
    let padlen = 3 * coefficients.a.len().max(coefficients.b.len());
    let n = values.len();
    if n <= padlen {
        return Err(StreamflowError::SeriesTooShort { len: n, min: padlen });
    }

    let first = values[0];
    let last = values[n - 1];
    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - values[i]));
    extended.extend_from_slice(values);
    extended.extend((1..=padlen).map(|i| 2.0 * last - values[n - 1 - i]));

    let zi = lfilter_zi(coefficients)?;

    let seed: Vec<f64> = zi.iter().map(|z| z * extended[0]).collect();
    let mut forward = lfilter(coefficients, &extended, &seed);

    forward.reverse();
    let seed: Vec<f64> = zi.iter().map(|z| z * forward[0]).collect();
    let mut backward = lfilter(coefficients, &forward, &seed);
    backward.reverse();

    Ok(backward[padlen..padlen + n].to_vec())
}

/// Low-pass filtered series, volume balanced.
///
/// Fails with `InvalidParameter` unless `0 < cutoff_frequency < sampling_rate / 2`.
pub fn lowpass_filter(
    values: &[f64],
    cutoff_frequency: f64,
    sampling_rate: f64,
    order: usize,
) -> Result<Vec<f64>> {
    if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
        return Err(StreamflowError::invalid_parameter(
            "sampling_rate",
            format!("must be a positive number, got {sampling_rate}"),
        ));
    }
    let nyquist = 0.5 * sampling_rate;
    if !(cutoff_frequency > 0.0 && cutoff_frequency < nyquist) {
        return Err(StreamflowError::invalid_parameter(
            "cutoff_frequency",
            format!("{cutoff_frequency} must lie between 0 and the Nyquist frequency {nyquist}"),
        ));
    }

    let coefficients = butterworth_lowpass(order, cutoff_frequency / nyquist)?;
    let mut filtered = filtfilt(&coefficients, values)?;

    clamp_non_negative(&mut filtered);
    balance(values, &filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_order_design_matches_closed_form() {
        // Wn = 0.5: k = tan(pi/4) = 1, b = [0.5, 0.5], a = [1, 0]
        let coefficients = butterworth_lowpass(1, 0.5).unwrap();
        assert!((coefficients.b[0] - 0.5).abs() < 1e-12);
        assert!((coefficients.b[1] - 0.5).abs() < 1e-12);
        assert!((coefficients.a[0] - 1.0).abs() < 1e-12);
        assert!(coefficients.a[1].abs() < 1e-12);
    }

    #[test]
    fn second_order_design_matches_reference() {
        // scipy.signal.butter(2, 0.2)
        let coefficients = butterworth_lowpass(2, 0.2).unwrap();
        let b = [0.067_455_27, 0.134_910_55, 0.067_455_27];
        let a = [1.0, -1.142_980_5, 0.412_801_6];
        for (got, want) in coefficients.b.iter().zip(b) {
            assert!((got - want).abs() < 1e-6, "b = {:?}", coefficients.b);
        }
        for (got, want) in coefficients.a.iter().zip(a) {
            assert!((got - want).abs() < 1e-6, "a = {:?}", coefficients.a);
        }
    }

    #[test]
    fn unity_dc_gain() {
        let coefficients = butterworth_lowpass(5, 0.07).unwrap();
        let gain = coefficients.b.iter().sum::<f64>() / coefficients.a.iter().sum::<f64>();
        assert!((gain - 1.0).abs() < 1e-6);
    }

    #[test]
    fn constant_signal_passes_unchanged() {
        let coefficients = butterworth_lowpass(3, 0.1).unwrap();
        let filtered = filtfilt(&coefficients, &[4.0; 50]).unwrap();
        assert!(filtered.iter().all(|v| (v - 4.0).abs() < 1e-8));
    }

    #[test]
    fn high_frequency_is_attenuated() {
        let values: Vec<f64> = (0..200)
            .map(|i| 10.0 + if i % 2 == 0 { 3.0 } else { -3.0 })
            .collect();
        let filtered = lowpass_filter(&values, 0.05, 1.0, 4).unwrap();
        // the +/-3 oscillation is gone away from the padded edges
        for pair in filtered[50..150].windows(2) {
            assert!((pair[0] - pair[1]).abs() < 0.05);
        }
        for v in &filtered[50..150] {
            assert!((v - 10.0).abs() < 0.5);
        }
    }

    #[test]
    fn cutoff_at_nyquist_rejected() {
        let err = lowpass_filter(&[1.0; 100], 0.5, 1.0, 5).unwrap_err();
        assert!(matches!(
            err,
            StreamflowError::InvalidParameter { ref name, .. } if name == "cutoff_frequency"
        ));
    }

    #[test]
    fn short_series_rejected() {
        let err = lowpass_filter(&[1.0; 18], 0.035, 1.0, 5).unwrap_err();
        assert!(matches!(err, StreamflowError::SeriesTooShort { len: 18, min: 18 }));
    }
}
