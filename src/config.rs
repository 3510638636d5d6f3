//! Configuration management and validation.
//!
//! Provides configuration structures for filter parameters, the seasonal
//! adaptive smoother, the backtrack stages, and batch processing. All
//! parameters are bound once per pipeline instance.

use crate::error::{Result, StreamflowError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest wavelet scale evaluated by the CWT (scales run 1..=30)
pub const CWT_MAX_WIDTH: usize = 30;

/// Settings for one variant of the adaptive moving average
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveWindowConfig {
    /// Values at or above this shrink the window
    pub threshold: f64,

    /// Window width (hours) before the first observation
    pub initial_window: usize,

    /// Lower bound on the window width (hours)
    pub min_window: usize,

    /// Upper bound on the window width (hours)
    pub max_window: usize,

    /// Factor the window is divided or multiplied by at each step
    pub decay_factor: usize,
}

impl AdaptiveWindowConfig {
    /// Variant tuned to the high-flow season
    pub fn high_flow() -> Self {
        Self {
            threshold: 40.0,
            initial_window: 168,
            min_window: 24,
            max_window: 168,
            decay_factor: 2,
        }
    }

    /// Variant tuned to the low-flow season
    pub fn low_flow() -> Self {
        Self {
            threshold: 40.0,
            initial_window: 168,
            min_window: 168,
            max_window: 720,
            decay_factor: 2,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min_window == 0 {
            return Err(StreamflowError::invalid_parameter(
                format!("{name}.min_window"),
                "must be at least 1 hour",
            ));
        }
        if self.min_window > self.max_window {
            return Err(StreamflowError::invalid_parameter(
                format!("{name}.min_window"),
                format!(
                    "{} exceeds max_window {}",
                    self.min_window, self.max_window
                ),
            ));
        }
        if !(self.min_window..=self.max_window).contains(&self.initial_window) {
            return Err(StreamflowError::invalid_parameter(
                format!("{name}.initial_window"),
                format!(
                    "{} lies outside [{}, {}]",
                    self.initial_window, self.min_window, self.max_window
                ),
            ));
        }
        if self.decay_factor < 2 {
            return Err(StreamflowError::invalid_parameter(
                format!("{name}.decay_factor"),
                "must be at least 2",
            ));
        }
        if !self.threshold.is_finite() {
            return Err(StreamflowError::invalid_parameter(
                format!("{name}.threshold"),
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// Parameters shared by every smoothing method in one cleaning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanerConfig {
    /// Rolling window length in samples
    pub window_size: usize,

    /// Step between strided windows
    pub stride: usize,

    /// Cutoff frequency for the lowpass and FFT filters
    pub cutoff_frequency: f64,

    /// Sample spacing used to build FFT frequencies
    pub time_step: f64,

    /// Number of FFT filter passes
    pub iterations: usize,

    /// Sampling rate for the Butterworth design
    pub sampling_rate: f64,

    /// Butterworth filter order
    pub order: usize,

    /// Wavelet scale row (0-based, width = row + 1)
    pub cwt_row: usize,

    /// Residual multiplier for robust reweighting
    pub robust_k: f64,

    /// Adaptive smoother used for high-flow months
    pub high_flow: AdaptiveWindowConfig,

    /// Adaptive smoother used for the remaining months
    pub low_flow: AdaptiveWindowConfig,

    /// Calendar months (1-12) that select the high-flow variant
    pub high_flow_months: Vec<u32>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            window_size: 24,
            stride: 1,
            cutoff_frequency: 0.035,
            time_step: 1.0,
            iterations: 3,
            sampling_rate: 1.0,
            order: 5,
            cwt_row: 8,
            robust_k: 1.5,
            high_flow: AdaptiveWindowConfig::high_flow(),
            low_flow: AdaptiveWindowConfig::low_flow(),
            high_flow_months: vec![5, 6, 7, 8, 9, 10],
        }
    }
}

impl CleanerConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_cutoff_frequency(mut self, cutoff_frequency: f64) -> Self {
        self.cutoff_frequency = cutoff_frequency;
        self
    }

    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_sampling_rate(mut self, sampling_rate: f64) -> Self {
        self.sampling_rate = sampling_rate;
        self
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_cwt_row(mut self, cwt_row: usize) -> Self {
        self.cwt_row = cwt_row;
        self
    }

    pub fn with_robust_k(mut self, robust_k: f64) -> Self {
        self.robust_k = robust_k;
        self
    }

    /// Check every bound parameter; the Nyquist limit is checked by the lowpass filter itself
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(StreamflowError::invalid_parameter(
                "window_size",
                "must be at least 1",
            ));
        }
        if self.stride == 0 {
            return Err(StreamflowError::invalid_parameter("stride", "must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(StreamflowError::invalid_parameter(
                "iterations",
                "must be at least 1",
            ));
        }
        if self.order == 0 {
            return Err(StreamflowError::invalid_parameter("order", "must be at least 1"));
        }
        for (name, value) in [
            ("cutoff_frequency", self.cutoff_frequency),
            ("time_step", self.time_step),
            ("sampling_rate", self.sampling_rate),
            ("robust_k", self.robust_k),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(StreamflowError::invalid_parameter(
                    name,
                    format!("must be a positive number, got {value}"),
                ));
            }
        }
        if self.cwt_row >= CWT_MAX_WIDTH {
            return Err(StreamflowError::invalid_parameter(
                "cwt_row",
                format!("must be below {CWT_MAX_WIDTH}, got {}", self.cwt_row),
            ));
        }
        if let Some(month) = self.high_flow_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(StreamflowError::invalid_parameter(
                "high_flow_months",
                format!("{month} is not a calendar month"),
            ));
        }
        self.high_flow.validate("high_flow")?;
        self.low_flow.validate("low_flow")?;

        debug!("Cleaner configuration validated: {:?}", self);
        Ok(())
    }
}

/// Constants for the four backtrack stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktrackConfig {
    /// Step in storage W (to either neighbour) that marks a row anomalous
    pub anomaly_threshold: f64,

    /// Converts storage units per second into inflow units
    pub storage_unit: f64,

    /// Window length for negative-inflow redistribution
    pub redistribution_window: usize,

    /// Step between redistribution windows
    pub redistribution_stride: usize,

    /// Longest run of missing hours that is still interpolated
    pub max_gap_hours: usize,
}

impl Default for BacktrackConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 200.0,
            storage_unit: 1e6,
            redistribution_window: 7,
            redistribution_stride: 4,
            max_gap_hours: 168,
        }
    }
}

impl BacktrackConfig {
    pub fn with_max_gap_hours(mut self, hours: usize) -> Self {
        self.max_gap_hours = hours;
        self
    }

    pub fn with_anomaly_threshold(mut self, threshold: f64) -> Self {
        self.anomaly_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.anomaly_threshold.is_finite() && self.anomaly_threshold > 0.0) {
            return Err(StreamflowError::invalid_parameter(
                "anomaly_threshold",
                "must be a positive number",
            ));
        }
        if !self.storage_unit.is_finite() {
            return Err(StreamflowError::invalid_parameter(
                "storage_unit",
                "must be finite",
            ));
        }
        if self.redistribution_window == 0 || self.redistribution_stride == 0 {
            return Err(StreamflowError::invalid_parameter(
                "redistribution_window",
                "window and stride must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Batch execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum basins processed at the same time
    pub max_concurrent_files: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_files: num_cpus::get().max(1),
        }
    }
}

impl ProcessorConfig {
    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.max_concurrent_files = max_files.max(1);
        self
    }
}
