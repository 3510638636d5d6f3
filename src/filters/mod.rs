//! Smoothing and filtering methods for inflow series.
//!
//! Every method is a pure function of an imputed (gap-free) series and the
//! bound [`CleanerConfig`]; it returns a series of the same length and
//! timestamps. Methods clamp negative flow to zero and finish with
//! [`crate::balance::balance`], except `rolling_mean`, which back-fills from
//! the raw series instead.

pub mod adaptive;
pub mod kalman;
pub(crate) mod linalg;
pub mod lowpass;
pub mod moving_average;
pub mod robust;
pub mod seasonal;
pub mod spectral;
pub mod strided;
pub mod wavelet;

use crate::config::CleanerConfig;
use crate::error::Result;
use crate::models::{FlowSeries, MethodKind};
use tracing::debug;

impl MethodKind {
    /// Run this method over `series`.
    ///
    /// `raw` is the series as read from disk (with gaps); only `rolling_mean`
    /// consults it, to back-fill positions that are not window centres.
    pub fn apply(
        &self,
        series: &FlowSeries,
        raw: &[f64],
        config: &CleanerConfig,
    ) -> Result<FlowSeries> {
        debug!("Applying {} to {} samples", self, series.len());

        let values = series.values();
        let output = match self {
            MethodKind::MovingAverage => moving_average::moving_average(values, config.window_size)?,
            MethodKind::Kalman => kalman::kalman_filter(values)?,
            MethodKind::MovingAverageDiff => {
                moving_average::moving_average_difference(values, config.window_size)?
            }
            MethodKind::RobustFit => robust::robust_fitting(values, config.robust_k)?,
            MethodKind::Lowpass => lowpass::lowpass_filter(
                values,
                config.cutoff_frequency,
                config.sampling_rate,
                config.order,
            )?,
            MethodKind::Fft => spectral::fft_filter(
                values,
                config.cutoff_frequency,
                config.time_step,
                config.iterations,
            )?,
            MethodKind::Wavelet => wavelet::wavelet_filter(values, config.cwt_row)?,
            MethodKind::RollingMean => {
                strided::rolling_with_stride(values, raw, config.window_size, config.stride)?
            }
            MethodKind::SeasonalEma => seasonal::seasonal_ema(series, config)?,
        };

        series.with_values(output)
    }
}

/// Replace negative flow with zero, leaving missing values alone
pub(crate) fn clamp_non_negative(values: &mut [f64]) {
    for value in values.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// Prefix sums over observed values, for O(1) window means
pub(crate) struct PrefixMean {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl PrefixMean {
    pub(crate) fn new(values: &[f64]) -> Self {
        let mut sums = Vec::with_capacity(values.len() + 1);
        let mut counts = Vec::with_capacity(values.len() + 1);
        sums.push(0.0);
        counts.push(0);
        for value in values {
            let (sum, count) = (sums[sums.len() - 1], counts[counts.len() - 1]);
            if value.is_nan() {
                sums.push(sum);
                counts.push(count);
            } else {
                sums.push(sum + value);
                counts.push(count + 1);
            }
        }
        Self { sums, counts }
    }

    /// Mean of observed values in `lo..=hi`; `NaN` if the window holds none
    pub(crate) fn mean(&self, lo: usize, hi: usize) -> f64 {
        let count = self.counts[hi + 1] - self.counts[lo];
        if count == 0 {
            return f64::NAN;
        }
        (self.sums[hi + 1] - self.sums[lo]) / count as f64
    }
}
