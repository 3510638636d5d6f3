//! Robust correction against a quadratic trend.
//!
//! A quadratic is fitted by least squares, then observations whose residual
//! exceeds `k * sigma` are down-weighted to `k * sigma / |residual|` over ten
//! reweighting passes, recomputing `sigma` each pass. The corrected value
//! blends observation and trend by that weight.

use super::clamp_non_negative;
use super::linalg::solve;
use crate::balance::balance;
use crate::error::{Result, StreamflowError};

const REWEIGHT_PASSES: usize = 10;

/// Quadratic trend `a*x^2 + b*x + c` over a rescaled time axis
#[derive(Debug, Clone, Copy)]
struct QuadraticTrend {
    coefficients: [f64; 3],
    center: f64,
    half_span: f64,
}

impl QuadraticTrend {
    /// Ordinary least squares over `t = 0..n`
    fn fit(values: &[f64]) -> Result<Self> {
        let n = values.len();
        if n < 3 {
            return Err(StreamflowError::FitConvergence {
                reason: format!("{n} observations cannot determine a quadratic"),
            });
        }

        // Map t onto [-1, 1] to keep the normal equations well conditioned
        let center = (n - 1) as f64 / 2.0;
        let half_span = center.max(1.0);

        let mut moments = [0.0_f64; 5];
        let mut rhs = [0.0_f64; 3];
        for (t, &y) in values.iter().enumerate() {
            let x = (t as f64 - center) / half_span;
            let mut power = 1.0;
            for (k, moment) in moments.iter_mut().enumerate() {
                *moment += power;
                if k < 3 {
                    rhs[k] += power * y;
                }
                power *= x;
            }
        }

        // Unknowns ordered (c, b, a)
        let normal = (0..3)
            .map(|row| (0..3).map(|col| moments[row + col]).collect())
            .collect();
        let [c, b, a]: [f64; 3] = solve(normal, rhs.to_vec())
            .and_then(|x| x.try_into().ok())
            .ok_or_else(|| StreamflowError::FitConvergence {
                reason: "normal equations are singular".to_string(),
            })?;

        Ok(Self {
            coefficients: [a, b, c],
            center,
            half_span,
        })
    }

    fn evaluate(&self, t: usize) -> f64 {
        let x = (t as f64 - self.center) / self.half_span;
        let [a, b, c] = self.coefficients;
        a * x * x + b * x + c
    }
}

fn reweight(residuals: &[f64], k: f64, sigma: f64) -> Vec<f64> {
    let limit = k * sigma;
    residuals
        .iter()
        .map(|r| if r.abs() <= limit { 1.0 } else { limit / r.abs() })
        .collect()
}

fn weighted_sigma(residuals: &[f64], weights: &[f64]) -> f64 {
    let dof = (residuals.len() - 1) as f64;
    let weighted: f64 = residuals
        .iter()
        .zip(weights)
        .map(|(r, w)| w * r * r)
        .sum();
    (weighted / dof).sqrt()
}

/// Robustly corrected series, volume balanced
pub fn robust_fitting(values: &[f64], k: f64) -> Result<Vec<f64>> {
    if !(k.is_finite() && k > 0.0) {
        return Err(StreamflowError::invalid_parameter(
            "robust_k",
            format!("must be a positive number, got {k}"),
        ));
    }

    let trend = QuadraticTrend::fit(values)?;
    let fitted: Vec<f64> = (0..values.len()).map(|t| trend.evaluate(t)).collect();
    let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();

    let mut sigma = weighted_sigma(&residuals, &vec![1.0; residuals.len()]);
    let mut weights = vec![1.0; residuals.len()];
    for _ in 0..REWEIGHT_PASSES {
        weights = reweight(&residuals, k, sigma);
        sigma = weighted_sigma(&residuals, &weights);
    }
    if !sigma.is_finite() {
        return Err(StreamflowError::FitConvergence {
            reason: format!("residual scale diverged to {sigma}"),
        });
    }

    let mut corrected: Vec<f64> = values
        .iter()
        .zip(&fitted)
        .zip(&weights)
        .map(|((y, f), w)| w * y + (1.0 - w) * f)
        .collect();

    clamp_non_negative(&mut corrected);
    balance(values, &corrected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_quadratic_is_recovered() {
        let values: Vec<f64> = (0..30)
            .map(|t| {
                let t = t as f64;
                0.05 * t * t - 0.3 * t + 12.0
            })
            .collect();
        let trend = QuadraticTrend::fit(&values).unwrap();
        for (t, v) in values.iter().enumerate() {
            assert!((trend.evaluate(t) - v).abs() < 1e-8);
        }
        // no residuals, so the corrected series equals the input
        let corrected = robust_fitting(&values, 1.5).unwrap();
        for (c, v) in corrected.iter().zip(&values) {
            assert!((c - v).abs() < 1e-8);
        }
    }

    #[test]
    fn outlier_is_pulled_toward_trend() {
        let mut values = vec![10.0; 40];
        values[20] = 200.0;
        let corrected = robust_fitting(&values, 1.5).unwrap();
        let spike_ratio = corrected[20] / corrected[5];
        assert!(spike_ratio < 200.0 / 10.0);
        let total: f64 = corrected.iter().sum();
        assert!((total - values.iter().sum::<f64>()).abs() < 1e-9);
    }

    #[test]
    fn too_few_points_fail_to_converge() {
        let err = robust_fitting(&[1.0, 2.0], 1.5).unwrap_err();
        assert!(matches!(err, StreamflowError::FitConvergence { .. }));
    }

    #[test]
    fn non_positive_k_rejected() {
        assert!(matches!(
            robust_fitting(&[1.0, 2.0, 3.0, 4.0], 0.0),
            Err(StreamflowError::InvalidParameter { .. })
        ));
    }
}
