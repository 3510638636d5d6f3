//! Method chaining over one inflow series.
//!
//! The raw series is imputed once (linear between observations, zero at
//! the leading and trailing edges), the named methods run in order with
//! each output feeding the next, and finally every position that was
//! missing in the raw input is set back to missing.

use crate::config::CleanerConfig;
use crate::error::{Result, StreamflowError};
use crate::frame::BasinFrame;
use crate::models::{FlowSeries, MethodKind, MissingMask, PipelineOutcome, columns};
use std::path::Path;
use tracing::{debug, info, warn};

/// Fill missing values: linear between observations, 0 before the first
/// and after the last observation
pub fn impute(values: &[f64]) -> Vec<f64> {
    let mut filled = values.to_vec();
    let observed: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();

    let (Some(&first), Some(&last)) = (observed.first(), observed.last()) else {
        filled.fill(0.0);
        return filled;
    };

    filled[..first].fill(0.0);
    filled[last + 1..].fill(0.0);
    for pair in observed.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if hi - lo < 2 {
            continue;
        }
        let (y0, y1) = (values[lo], values[hi]);
        let span = (hi - lo) as f64;
        for (offset, value) in filled[lo + 1..hi].iter_mut().enumerate() {
            let fraction = (offset + 1) as f64 / span;
            *value = y0 + (y1 - y0) * fraction;
        }
    }
    filled
}

/// Ordered smoothing methods bound to one configuration
#[derive(Debug, Clone)]
pub struct MethodPipeline {
    config: CleanerConfig,
}

impl MethodPipeline {
    pub fn new(config: CleanerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Run `methods` over `series`.
    ///
    /// Unknown method names are logged and skipped. Parameter and
    /// degeneracy errors from any method abort the run.
    pub fn run<S: AsRef<str>>(&self, series: &FlowSeries, methods: &[S]) -> Result<PipelineOutcome> {
        let Some(first) = methods.first() else {
            return Err(StreamflowError::invalid_parameter(
                "methods",
                "at least one method is required",
            ));
        };

        let mut applied_methods = Vec::new();
        let mut skipped_methods = Vec::new();
        let mut chain = Vec::new();
        for name in methods {
            match MethodKind::from_name(name.as_ref()) {
                Some(kind) => chain.push(kind),
                None => {
                    warn!("Unknown method '{}' skipped", name.as_ref());
                    skipped_methods.push(name.as_ref().to_string());
                }
            }
        }

        let raw = series.values();
        let mask = MissingMask::from_values(raw);
        let mut current = series.with_values(impute(raw))?;

        if !series.is_empty() {
            for kind in chain {
                if current.has_missing() {
                    debug!("Re-imputing before {}", kind);
                    current = current.with_values(impute(current.values()))?;
                }
                current = kind.apply(&current, raw, &self.config)?;
                applied_methods.push(kind);
            }
        }

        let mut values = current.into_values();
        mask.apply(&mut values);
        info!(
            "Applied {} method(s) to {} samples, {} re-masked",
            applied_methods.len(),
            values.len(),
            mask.missing_count()
        );

        Ok(PipelineOutcome {
            column: first.as_ref().to_string(),
            values,
            applied_methods,
            skipped_methods,
            masked: mask.missing_count(),
        })
    }
}

/// Clean the `INQ` column of one basin CSV and write the frame with the
/// result appended as a new column
pub fn clean_file<S: AsRef<str>>(
    input: &Path,
    output: &Path,
    methods: &[S],
    config: &CleanerConfig,
) -> Result<PipelineOutcome> {
    let pipeline = MethodPipeline::new(config.clone())?;

    let mut frame = BasinFrame::read_csv(input)?;
    frame.require_columns(&[columns::TM, columns::INQ])?;
    let series = FlowSeries::new(
        frame.timestamps(columns::TM)?,
        frame.float_column(columns::INQ)?,
    )?;

    let outcome = pipeline.run(&series, methods)?;
    frame.set_float_column(&outcome.column, &outcome.values)?;
    frame.write_csv_atomic(output)?;

    debug!(
        "Cleaned {} into column '{}' at {}",
        input.display(),
        outcome.column,
        output.display()
    );
    Ok(outcome)
}
