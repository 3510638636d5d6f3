//! Gap-limited interpolation on an hourly grid.
//!
//! Rows are placed on a complete hourly grid from the first to the last
//! timestamp (off-grid timestamps are kept as extra rows). A run of missing
//! inflow is filled linearly only when its length is at most the gap limit;
//! longer runs stay missing. Inflow is clipped at zero afterwards.

use crate::error::Result;
use crate::filters::clamp_non_negative;
use crate::frame::{BasinFrame, OUTPUT_TIMESTAMP_FORMAT};
use crate::models::columns;
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Timestamps of the hourly grid joined with `times`, ascending, and for
/// each the source row (last occurrence wins) or `None` for inserted rows
pub fn hourly_grid(times: &[NaiveDateTime]) -> Vec<(NaiveDateTime, Option<usize>)> {
    let mut rows: BTreeMap<NaiveDateTime, Option<usize>> = BTreeMap::new();
    for (row, time) in times.iter().enumerate() {
        rows.insert(*time, Some(row));
    }

    if let (Some(&start), Some(&end)) = (rows.keys().next(), rows.keys().next_back()) {
        let mut cursor = start;
        while cursor <= end {
            rows.entry(cursor).or_insert(None);
            cursor += Duration::hours(1);
        }
    }
    rows.into_iter().collect()
}

/// Fill runs of at most `max_gap` missing values between two observations.
/// Returns the filled series and the number of values filled.
pub fn interpolate_limited(values: &[f64], max_gap: usize) -> (Vec<f64>, usize) {
    let mut filled = values.to_vec();
    let mut count = 0;
    let mut previous: Option<usize> = None;

    for (i, value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        if let Some(lo) = previous {
            let missing = i - lo - 1;
            if missing > 0 && missing <= max_gap {
                let (y0, y1) = (values[lo], *value);
                let span = (i - lo) as f64;
                for (offset, slot) in filled[lo + 1..i].iter_mut().enumerate() {
                    *slot = y0 + (y1 - y0) * (offset + 1) as f64 / span;
                }
                count += missing;
            }
        }
        previous = Some(i);
    }
    (filled, count)
}

/// Run the stage; returns the number of inflow values filled
pub fn run(input: &Path, output: &Path, max_gap_hours: usize) -> Result<usize> {
    let frame = BasinFrame::read_csv(input)?;
    frame.require_columns(&[columns::TM, columns::INQ])?;

    let times = frame.timestamps(columns::TM)?;
    let grid = hourly_grid(&times);
    let rows: Vec<Option<usize>> = grid.iter().map(|(_, row)| *row).collect();

    let recorded = frame.float_column(columns::INQ)?;
    let aligned: Vec<f64> = rows
        .iter()
        .map(|row| row.map_or(f64::NAN, |r| recorded[r]))
        .collect();
    let (mut inflow, filled) = interpolate_limited(&aligned, max_gap_hours);
    clamp_non_negative(&mut inflow);

    let mut gridded = frame.take_rows(&rows)?;
    gridded.set_float_column(columns::INQ, &inflow)?;
    gridded.set_string_column(
        columns::TM,
        grid.iter()
            .map(|(t, _)| Some(t.format(OUTPUT_TIMESTAMP_FORMAT).to_string()))
            .collect(),
    )?;
    if gridded.has_column(columns::STCD) {
        let codes = gridded.string_column(columns::STCD)?;
        let station = codes.iter().flatten().next().cloned();
        gridded.set_string_column(columns::STCD, vec![station; codes.len()])?;
    }

    gridded
        .select_or_empty(&columns::STANDARD)?
        .write_csv_atomic(output)?;

    debug!(
        "Filled {} inflow value(s) across {} grid rows for {}",
        filled,
        grid.len(),
        input.display()
    );
    Ok(filled)
}
