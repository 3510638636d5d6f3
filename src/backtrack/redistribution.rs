//! Local water-balance redistribution of negative inflow.
//!
//! Windows of `window` rows start every `stride` rows and are processed in
//! order, in place, so overlapping windows see the result of earlier ones.
//! Within a window the negative mass is taken out of the positive values
//! proportionally, then every non-positive value becomes zero.

use crate::error::Result;
use crate::frame::{BasinFrame, OUTPUT_TIMESTAMP_FORMAT};
use crate::models::columns;
use std::path::Path;
use tracing::debug;

/// Balance one window in place
pub fn balance_window(window: &mut [f64]) {
    if window.iter().all(|v| v.is_nan()) {
        return;
    }

    let positive: f64 = window.iter().filter(|v| **v > 0.0).sum();
    let negative: f64 = window.iter().filter(|v| **v < 0.0).sum::<f64>().abs();

    if positive > 0.0 {
        let factor = negative / positive;
        for value in window.iter_mut().filter(|v| **v > 0.0) {
            *value -= *value * factor;
        }
    }
    for value in window.iter_mut() {
        if *value <= 0.0 {
            *value = 0.0;
        }
    }
}

/// Apply [`balance_window`] over strided windows; returns the number of negative values removed
pub fn redistribute(values: &mut [f64], window: usize, stride: usize) -> usize {
    let negatives = values.iter().filter(|v| **v < 0.0).count();
    if window == 0 || stride == 0 || values.len() < window {
        return 0;
    }
    for start in (0..=values.len() - window).step_by(stride) {
        balance_window(&mut values[start..start + window]);
    }
    negatives - values.iter().filter(|v| **v < 0.0).count()
}

/// Run the stage; returns the number of negative inflow values removed
pub fn run(input: &Path, output: &Path, window: usize, stride: usize) -> Result<usize> {
    let mut frame = BasinFrame::read_csv(input)?;
    frame.require_columns(&[columns::TM, columns::INQ])?;

    let times = frame.timestamps(columns::TM)?;
    let mut inflow = frame.float_column(columns::INQ)?;
    let removed = redistribute(&mut inflow, window, stride);

    frame.set_float_column(columns::INQ, &inflow)?;
    frame.set_string_column(
        columns::TM,
        times
            .iter()
            .map(|t| Some(t.format(OUTPUT_TIMESTAMP_FORMAT).to_string()))
            .collect(),
    )?;
    frame.select_or_empty(&columns::STANDARD)?.write_csv_atomic(output)?;

    debug!("Redistributed {} negative inflow value(s) in {}", removed, input.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_mass_comes_out_of_positives() {
        let mut window = [10.0, -2.0, 10.0, f64::NAN];
        balance_window(&mut window);
        assert_eq!(window[0], 9.0);
        assert_eq!(window[1], 0.0);
        assert_eq!(window[2], 9.0);
        assert!(window[3].is_nan());
        // net mass is conserved
        assert_eq!(window[0] + window[2], 18.0);
    }

    #[test]
    fn all_missing_window_untouched() {
        let mut window = [f64::NAN, f64::NAN];
        balance_window(&mut window);
        assert!(window.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn excess_negative_zeroes_the_window() {
        let mut window = [1.0, -5.0];
        balance_window(&mut window);
        assert_eq!(window, [0.0, 0.0]);
    }

    #[test]
    fn windows_overlap_sequentially() {
        // window 7 stride 4: windows [0, 7) and [4, 11)
        let mut values = vec![5.0; 11];
        values[5] = -4.0;
        let removed = redistribute(&mut values, 7, 4);
        assert_eq!(removed, 1);
        assert!(values.iter().all(|v| *v >= 0.0));
        // first window: 30 positive, 4 negative
        let first = 5.0 * (1.0 - 4.0 / 30.0);
        assert!((values[0] - first).abs() < 1e-12);
        // the second window starts from the already balanced rows 4 and 6
        assert!((values[10] - 5.0).abs() < 1e-12);
        let total: f64 = values.iter().sum();
        assert!((total - (55.0 - 5.0 - 4.0)).abs() < 1e-9);
    }

    #[test]
    fn short_series_is_left_alone() {
        let mut values = vec![-1.0, 2.0];
        assert_eq!(redistribute(&mut values, 7, 4), 0);
        assert_eq!(values, vec![-1.0, 2.0]);
    }
}
