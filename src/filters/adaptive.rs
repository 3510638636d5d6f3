//! Value-dependent variable-width moving average.
//!
//! The window width is state carried from one observation to the next: an
//! observation at or above the threshold divides it by the decay factor
//! (never below the floor), anything else multiplies it (never above the
//! ceiling). Each output is the mean of the observations whose timestamps
//! fall within half a window on either side. Width evolution is strictly
//! left to right.

use super::PrefixMean;
use crate::config::AdaptiveWindowConfig;
use crate::error::{Result, StreamflowError};
use chrono::{Duration, NaiveDateTime};

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveWindowAggregator {
    config: AdaptiveWindowConfig,
}

impl AdaptiveWindowAggregator {
    pub fn new(config: AdaptiveWindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AdaptiveWindowConfig {
        &self.config
    }

    /// Width after observing `value` with the previous width `window`
    fn next_width(&self, window: usize, value: f64) -> usize {
        let AdaptiveWindowConfig {
            threshold,
            min_window,
            max_window,
            decay_factor,
            ..
        } = self.config;

        if value >= threshold {
            (window / decay_factor).max(min_window)
        } else {
            window.saturating_mul(decay_factor).min(max_window)
        }
    }

    /// Window width in effect at every observation
    pub fn window_widths(&self, values: &[f64]) -> Vec<usize> {
        let (_, widths) = values.iter().fold(
            (self.config.initial_window, Vec::with_capacity(values.len())),
            |(window, mut widths), &value| {
                let window = self.next_width(window, value);
                widths.push(window);
                (window, widths)
            },
        );
        widths
    }

    /// Smoothed series over strictly increasing hourly-labelled `times`.
    ///
    /// Missing values are skipped inside a window; a window with no
    /// observations yields `NaN`.
    pub fn aggregate(&self, times: &[NaiveDateTime], values: &[f64]) -> Result<Vec<f64>> {
        if times.len() != values.len() {
            return Err(StreamflowError::invalid_parameter(
                "values",
                format!("{} values for {} timestamps", values.len(), times.len()),
            ));
        }
        if let Some(pair) = times.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(StreamflowError::degenerate(format!(
                "timestamps must be strictly increasing, found {} followed by {}",
                pair[0], pair[1]
            )));
        }

        let n = values.len();
        let prefix = PrefixMean::new(values);

        let smoothed = self
            .window_widths(values)
            .into_iter()
            .enumerate()
            .map(|(i, width)| {
                let half = width / 2;
                let offset = Duration::hours(half as i64);

                // Positional boundary check, then label-based window
                let lo = if i < half {
                    0
                } else {
                    times.partition_point(|t| *t < times[i] - offset)
                };
                let hi = if i + half >= n {
                    n - 1
                } else {
                    times.partition_point(|t| *t <= times[i] + offset) - 1
                };
                prefix.mean(lo, hi)
            })
            .collect();

        Ok(smoothed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::hours(i as i64)).collect()
    }

    fn small_config() -> AdaptiveWindowConfig {
        AdaptiveWindowConfig {
            threshold: 10.0,
            initial_window: 4,
            min_window: 2,
            max_window: 8,
            decay_factor: 2,
        }
    }

    #[test]
    fn width_halves_on_high_values_and_doubles_on_low() {
        let aggregator = AdaptiveWindowAggregator::new(small_config());
        let widths = aggregator.window_widths(&[20.0, 20.0, 20.0, 1.0, 1.0, 1.0, 10.0]);
        assert_eq!(widths, vec![2, 2, 2, 4, 8, 8, 4]);
    }

    #[test]
    fn missing_value_grows_the_window() {
        let aggregator = AdaptiveWindowAggregator::new(small_config());
        assert_eq!(aggregator.window_widths(&[f64::NAN]), vec![8]);
    }

    #[test]
    fn means_follow_the_evolving_window() {
        let aggregator = AdaptiveWindowAggregator::new(small_config());
        let values = [20.0, 20.0, 30.0, 1.0, 1.0, 1.0];
        let smoothed = aggregator.aggregate(&hours(6), &values).unwrap();

        // widths 2, 2, 2, 4, 8, 8 so half windows 1, 1, 1, 2, 4, 4;
        // row 4 reaches both ends, row 5 starts at row 1
        assert_eq!(smoothed[0], 20.0);
        assert!((smoothed[1] - 70.0 / 3.0).abs() < 1e-12);
        assert_eq!(smoothed[2], 17.0);
        assert!((smoothed[3] - 53.0 / 5.0).abs() < 1e-12);
        assert!((smoothed[4] - 73.0 / 6.0).abs() < 1e-12);
        assert!((smoothed[5] - 53.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn labels_define_the_window_not_positions() {
        let aggregator = AdaptiveWindowAggregator::new(AdaptiveWindowConfig {
            threshold: 100.0,
            initial_window: 2,
            min_window: 2,
            max_window: 2,
            decay_factor: 2,
        });
        let mut times = hours(5);
        // a six-hour hole between the second and third observation
        for t in times.iter_mut().skip(2) {
            *t += Duration::hours(6);
        }
        let smoothed = aggregator
            .aggregate(&times, &[1.0, 3.0, 10.0, 20.0, 30.0])
            .unwrap();
        assert_eq!(smoothed[1], 2.0);
        assert_eq!(smoothed[2], 15.0);
    }

    #[test]
    fn unsorted_times_rejected() {
        let aggregator = AdaptiveWindowAggregator::new(small_config());
        let mut times = hours(3);
        times.swap(0, 2);
        assert!(aggregator.aggregate(&times, &[1.0, 2.0, 3.0]).is_err());
    }
}
