//! Scalar Kalman smoother with a random-walk state.

use super::clamp_non_negative;
use crate::balance::balance;
use crate::error::Result;

/// Process noise variance
const PROCESS_NOISE: f64 = 0.01;
/// Observation noise variance
const OBSERVATION_NOISE: f64 = 0.01;
/// Variance of the initial state estimate
const INITIAL_VARIANCE: f64 = 0.01;

/// Filtering state carried from one observation to the next
#[derive(Debug, Clone, Copy)]
struct KalmanState {
    estimate: f64,
    variance: f64,
}

impl KalmanState {
    /// One predict/update cycle against `measurement`
    fn step(self, measurement: f64) -> Self {
        let predicted_variance = self.variance + PROCESS_NOISE;
        let gain = predicted_variance / (predicted_variance + OBSERVATION_NOISE);
        Self {
            estimate: self.estimate + gain * (measurement - self.estimate),
            variance: predicted_variance - gain * predicted_variance,
        }
    }
}

/// Filter the series sequentially, seeding the state with the first value
pub fn kalman_filter(values: &[f64]) -> Result<Vec<f64>> {
    let Some(&first) = values.first() else {
        return Ok(Vec::new());
    };

    let mut state = KalmanState {
        estimate: first,
        variance: INITIAL_VARIANCE,
    };
    let mut estimates: Vec<f64> = values
        .iter()
        .map(|&measurement| {
            state = state.step(measurement);
            state.estimate
        })
        .collect();

    clamp_non_negative(&mut estimates);
    balance(values, &estimates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_series_is_unchanged() {
        let result = kalman_filter(&[7.0; 12]).unwrap();
        assert!(result.iter().all(|v| (v - 7.0).abs() < 1e-9));
    }

    #[test]
    fn first_gain_matches_hand_computation() {
        // P- = 0.02, K = 0.02 / 0.03
        let state = KalmanState {
            estimate: 0.0,
            variance: INITIAL_VARIANCE,
        }
        .step(3.0);
        assert!((state.estimate - 2.0).abs() < 1e-12);
        assert!((state.variance - 0.02 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn step_response_lags_the_jump() {
        let mut values = vec![10.0; 10];
        values.extend(vec![50.0; 10]);
        let result = kalman_filter(&values).unwrap();
        // the filtered series approaches the new level gradually
        assert!(result[10] < result[11]);
        assert!(result[11] < result[15]);
        assert!((result.iter().sum::<f64>() - 600.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(kalman_filter(&[]).unwrap().is_empty());
    }
}
