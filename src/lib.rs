//! Streamflow Processor Library
//!
//! A Rust library for denoising hourly reservoir inflow records and for
//! reconstructing inflow from storage and outflow observations.
//!
//! This library provides tools for:
//! - Volume-conserving smoothing (moving averages, Kalman, robust fitting,
//!   Butterworth lowpass, FFT, wavelet and seasonal adaptive EMA)
//! - Chaining methods over a gap-masked series with [`MethodPipeline`]
//! - The four-stage backtrack reconstruction in [`BacktrackPipeline`]
//! - Concurrent folder processing with per-basin failure isolation

pub mod backtrack;
pub mod balance;
pub mod cli;
pub mod config;
pub mod error;
pub mod filters;
pub mod frame;
pub mod models;
pub mod pipeline;
pub mod processor;

// Re-export commonly used types
pub use backtrack::{BacktrackPipeline, BacktrackReport, BacktrackStage};
pub use balance::balance;
pub use config::{AdaptiveWindowConfig, BacktrackConfig, CleanerConfig, ProcessorConfig};
pub use error::{Result, StreamflowError};
pub use filters::adaptive::AdaptiveWindowAggregator;
pub use frame::BasinFrame;
pub use models::{FlowSeries, MethodKind, PipelineOutcome, ProcessingStats};
pub use pipeline::{MethodPipeline, clean_file};
pub use processor::{BacktrackProcessor, CleanProcessor};
