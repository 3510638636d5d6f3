//! Storage anomaly excision.
//!
//! A row whose storage `W` differs from either neighbour by more than the
//! threshold is treated as a recording error: its `W` becomes missing and
//! the row is exported for audit together with both differences.

use crate::error::Result;
use crate::frame::BasinFrame;
use crate::models::columns;
use std::path::Path;
use tracing::{debug, info};

pub const DIFF_PREV: &str = "diff_prev";
pub const DIFF_NEXT: &str = "diff_next";

/// Absolute step in storage to each neighbour; `NaN` at the edges or next to missing values
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSteps {
    pub prev: Vec<f64>,
    pub next: Vec<f64>,
}

impl StorageSteps {
    pub fn compute(storage: &[f64]) -> Self {
        let n = storage.len();
        let prev = (0..n)
            .map(|i| {
                if i == 0 {
                    f64::NAN
                } else {
                    (storage[i] - storage[i - 1]).abs()
                }
            })
            .collect();
        let next = (0..n)
            .map(|i| {
                if i + 1 == n {
                    f64::NAN
                } else {
                    (storage[i] - storage[i + 1]).abs()
                }
            })
            .collect();
        Self { prev, next }
    }

    /// Rows where either step exceeds `threshold`; missing steps never flag
    pub fn flags(&self, threshold: f64) -> Vec<bool> {
        self.prev
            .iter()
            .zip(&self.next)
            .map(|(prev, next)| *prev > threshold || *next > threshold)
            .collect()
    }
}

/// Null the flagged storage values, returning how many were removed
pub fn excise(storage: &mut [f64], flags: &[bool]) -> usize {
    let mut removed = 0;
    for (value, flagged) in storage.iter_mut().zip(flags) {
        if *flagged {
            *value = f64::NAN;
            removed += 1;
        }
    }
    removed
}

/// Run the stage over `input`, writing the audit rows and the cleaned frame.
/// Returns the number of rows flagged.
pub fn run(input: &Path, cleaned: &Path, anomalies: &Path, threshold: f64) -> Result<usize> {
    let mut frame = BasinFrame::read_csv(input)?;
    frame.require_columns(&[columns::W])?;

    let mut storage = frame.float_column(columns::W)?;
    let steps = StorageSteps::compute(&storage);
    let flags = steps.flags(threshold);

    let mut audit = frame.clone();
    audit.set_float_column(DIFF_PREV, &steps.prev)?;
    audit.set_float_column(DIFF_NEXT, &steps.next)?;
    let mut audit = audit.filter_rows(&flags)?;
    audit.write_csv_atomic(anomalies)?;

    let removed = excise(&mut storage, &flags);
    frame.set_float_column(columns::W, &storage)?;
    frame.write_csv_atomic(cleaned)?;

    if removed > 0 {
        info!(
            "Removed {} anomalous storage value(s) from {}",
            removed,
            input.display()
        );
    } else {
        debug!("No storage anomalies in {}", input.display());
    }
    Ok(removed)
}
