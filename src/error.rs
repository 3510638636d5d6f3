//! Error handling for streamflow processing operations.
//!
//! Provides error types with context for filter parameter validation,
//! numerical failures, and basin file schema problems.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Degenerate series: {reason}")]
    DegenerateSeries { reason: String },

    #[error("Robust fit failed to converge: {reason}")]
    FitConvergence { reason: String },

    #[error("Series too short: got {len} observations, need more than {min}")]
    SeriesTooShort { len: usize, min: usize },

    #[error("Missing required column '{column}' in file: {path}")]
    Schema { path: PathBuf, column: String },

    #[error("Unparseable timestamp '{value}' at row {row} in file: {path}")]
    InvalidTimestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("Dataset not found at path: {path}")]
    DatasetNotFound { path: PathBuf },

    #[error("Processing failed for file: {path} - {reason}")]
    ProcessingFailed { path: PathBuf, reason: String },

    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl StreamflowError {
    pub(crate) fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateSeries {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamflowError>;
