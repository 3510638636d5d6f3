//! Inflow back-calculation from the reservoir water balance.
//!
//! `INQ_derived = OTQ + storage_unit * dW / dt` with `dt` in seconds. The
//! derived value only fills rows where the recorded inflow is missing.

use crate::error::Result;
use crate::frame::BasinFrame;
use crate::models::columns;
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::debug;

/// Seconds since the previous row; the first row is 0
pub fn time_steps(times: &[NaiveDateTime]) -> Vec<f64> {
    let mut steps = Vec::with_capacity(times.len());
    if !times.is_empty() {
        steps.push(0.0);
    }
    steps.extend(
        times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0),
    );
    steps
}

/// Water-balance inflow per row.
///
/// The first row, rows with a non-positive time step, and rows next to a
/// missing storage value have no derived inflow.
pub fn derive_inflow(
    times: &[NaiveDateTime],
    storage: &[f64],
    outflow: &[f64],
    storage_unit: f64,
) -> Vec<f64> {
    let steps = time_steps(times);
    (0..storage.len())
        .map(|i| {
            if i == 0 {
                return f64::NAN;
            }
            let dt = steps[i];
            if !(dt.is_finite() && dt > 0.0) {
                return f64::NAN;
            }
            outflow[i] + storage_unit * (storage[i] - storage[i - 1]) / dt
        })
        .collect()
}

/// Recorded inflow where present, otherwise the derived value
pub fn fill_inflow(recorded: &[f64], derived: &[f64]) -> Vec<f64> {
    recorded
        .iter()
        .zip(derived)
        .map(|(r, d)| if r.is_nan() { *d } else { *r })
        .collect()
}

/// Run the stage; returns the number of rows whose inflow was derived
pub fn run(input: &Path, output: &Path, storage_unit: f64) -> Result<usize> {
    let mut frame = BasinFrame::read_csv(input)?;
    frame.require_columns(&[columns::TM, columns::W, columns::OTQ, columns::INQ])?;

    let times = frame.timestamps(columns::TM)?;
    let storage = frame.float_column(columns::W)?;
    let outflow = frame.float_column(columns::OTQ)?;
    let recorded = frame.float_column(columns::INQ)?;

    let derived = derive_inflow(&times, &storage, &outflow, storage_unit);
    let inflow = fill_inflow(&recorded, &derived);
    let filled = recorded
        .iter()
        .zip(&inflow)
        .filter(|(r, i)| r.is_nan() && !i.is_nan())
        .count();

    frame.set_float_column(columns::INQ, &inflow)?;
    frame.select_or_empty(&columns::STANDARD)?.write_csv_atomic(output)?;

    debug!("Back-calculated {} inflow value(s) for {}", filled, input.display());
    Ok(filled)
}
