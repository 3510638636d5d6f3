//! Core data structures and types for streamflow processing.
//!
//! Defines the basin column vocabulary, the in-memory flow series, the
//! missing-value mask, the smoothing method vocabulary, and processing
//! statistics used throughout the library.

use crate::error::{Result, StreamflowError};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Column names of a basin record
pub mod columns {
    pub const STCD: &str = "STCD";
    pub const TM: &str = "TM";
    pub const INQ: &str = "INQ";
    pub const W: &str = "W";
    pub const OTQ: &str = "OTQ";
    pub const RZ: &str = "RZ";

    /// Column order written by the backtrack stages
    pub const STANDARD: [&str; 11] = [
        "STCD", "TM", "RZ", "INQ", "W", "OTQ", "RWCHRCD", "RWPTN", "INQDR", "MSQMT", "BLRZ",
    ];
}

/// Ordered inflow values with one timestamp per value.
///
/// Missing observations are `NaN`. Length and index alignment are preserved
/// by every transform in the crate.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSeries {
    times: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl FlowSeries {
    pub fn new(times: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self> {
        if times.len() != values.len() {
            return Err(StreamflowError::invalid_parameter(
                "values",
                format!(
                    "{} values for {} timestamps",
                    values.len(),
                    times.len()
                ),
            ));
        }
        Ok(Self { times, values })
    }

    /// Build an hourly series starting at `start`
    pub fn hourly(start: NaiveDateTime, values: Vec<f64>) -> Self {
        let times = (0..values.len())
            .map(|i| start + Duration::hours(i as i64))
            .collect();
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Same timestamps, new values
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        Self::new(self.times.clone(), values)
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }
}

/// Positions where the raw inflow was never observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMask(Vec<bool>);

impl MissingMask {
    pub fn from_values(values: &[f64]) -> Self {
        Self(values.iter().map(|v| v.is_nan()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.0.iter().filter(|m| **m).count()
    }

    pub fn is_missing(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Null out every masked position
    pub fn apply(&self, values: &mut [f64]) {
        for (value, missing) in values.iter_mut().zip(&self.0) {
            if *missing {
                *value = f64::NAN;
            }
        }
    }
}

/// Smoothing method vocabulary accepted by the method pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    MovingAverage,
    Kalman,
    MovingAverageDiff,
    RobustFit,
    Lowpass,
    Fft,
    Wavelet,
    RollingMean,
    SeasonalEma,
}

impl MethodKind {
    pub const ALL: [MethodKind; 9] = [
        MethodKind::MovingAverage,
        MethodKind::Kalman,
        MethodKind::MovingAverageDiff,
        MethodKind::RobustFit,
        MethodKind::Lowpass,
        MethodKind::Fft,
        MethodKind::Wavelet,
        MethodKind::RollingMean,
        MethodKind::SeasonalEma,
    ];

    /// Look up a method by its selector name (case sensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Selector name, also used as the output column name
    pub fn name(&self) -> &'static str {
        match self {
            MethodKind::MovingAverage => "moving_average",
            MethodKind::Kalman => "kalman",
            MethodKind::MovingAverageDiff => "moving_average_diff",
            MethodKind::RobustFit => "robfit",
            MethodKind::Lowpass => "lowpass",
            MethodKind::Fft => "FFT",
            MethodKind::Wavelet => "wavelet",
            MethodKind::RollingMean => "rolling_mean",
            MethodKind::SeasonalEma => "EMA",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of running a method chain over one series
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Name of the output column (first requested method)
    pub column: String,
    /// Processed values, `NaN` where the raw input was missing
    pub values: Vec<f64>,
    pub applied_methods: Vec<MethodKind>,
    pub skipped_methods: Vec<String>,
    /// Number of positions re-masked after the chain
    pub masked: usize,
}

/// A basin file that could not be processed in a batch run
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_failed: usize,
    pub failures: Vec<FileFailure>,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn method_names_round_trip() {
        for kind in MethodKind::ALL {
            assert_eq!(MethodKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(MethodKind::from_name("fft"), None);
        assert_eq!(MethodKind::from_name("savgol"), None);
    }

    #[test]
    fn mask_reapplies_nan() {
        let raw = [1.0, f64::NAN, 3.0, f64::NAN];
        let mask = MissingMask::from_values(&raw);
        assert_eq!(mask.missing_count(), 2);

        let mut processed = vec![1.5, 2.0, 2.5, 3.0];
        mask.apply(&mut processed);
        assert_eq!(processed[0], 1.5);
        assert!(processed[1].is_nan());
        assert_eq!(processed[2], 2.5);
        assert!(processed[3].is_nan());
    }

    #[test]
    fn series_rejects_misaligned_values() {
        let series = FlowSeries::hourly(start(), vec![1.0, 2.0, 3.0]);
        assert!(series.with_values(vec![1.0]).is_err());
        assert_eq!(series.times()[2], start() + Duration::hours(2));
    }
}
