//! Composite seasonal smoother.
//!
//! Two adaptive moving averages run over the whole series, one with bounds
//! tuned to the high-flow season and one to the low-flow season. Each
//! timestamp takes the variant belonging to its calendar month.

use super::adaptive::AdaptiveWindowAggregator;
use super::clamp_non_negative;
use crate::balance::balance;
use crate::config::CleanerConfig;
use crate::error::Result;
use crate::models::FlowSeries;
use chrono::{Datelike, NaiveDateTime};
use tracing::debug;

/// Distinct timestamps in ascending order, each with the row index of its
/// last occurrence in the input
fn last_occurrences(times: &[NaiveDateTime]) -> Vec<(NaiveDateTime, usize)> {
    let mut order: Vec<(NaiveDateTime, usize)> =
        times.iter().copied().enumerate().map(|(i, t)| (t, i)).collect();
    order.sort_by_key(|&(t, i)| (t, i));

    let mut unique: Vec<(NaiveDateTime, usize)> = Vec::with_capacity(order.len());
    for (time, row) in order {
        match unique.last_mut() {
            Some(last) if last.0 == time => last.1 = row,
            _ => unique.push((time, row)),
        }
    }
    unique
}

/// Month-selected adaptive average, volume balanced against `series`
pub fn seasonal_ema(series: &FlowSeries, config: &CleanerConfig) -> Result<Vec<f64>> {
    if series.is_empty() {
        return Ok(Vec::new());
    }

    let unique = last_occurrences(series.times());
    if unique.len() < series.len() {
        debug!(
            "Dropped {} duplicate timestamps before seasonal smoothing",
            series.len() - unique.len()
        );
    }

    let times: Vec<NaiveDateTime> = unique.iter().map(|&(t, _)| t).collect();
    let values: Vec<f64> = unique.iter().map(|&(_, row)| series.values()[row]).collect();

    let high = AdaptiveWindowAggregator::new(config.high_flow).aggregate(&times, &values)?;
    let low = AdaptiveWindowAggregator::new(config.low_flow).aggregate(&times, &values)?;

    let selected: Vec<f64> = times
        .iter()
        .zip(high.into_iter().zip(low))
        .map(|(time, (high, low))| {
            if config.high_flow_months.contains(&time.month()) {
                high
            } else {
                low
            }
        })
        .collect();

    // Every original row reads the value of its timestamp
    let mut smoothed: Vec<f64> = series
        .times()
        .iter()
        .map(|time| {
            let position = times.partition_point(|t| t < time);
            selected[position]
        })
        .collect();

    clamp_non_negative(&mut smoothed);
    balance(series.values(), &smoothed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn duplicates_keep_the_last_row() {
        let times = vec![at(1, 1, 1), at(1, 1, 0), at(1, 1, 1)];
        let unique = last_occurrences(&times);
        assert_eq!(unique, vec![(at(1, 1, 0), 1), (at(1, 1, 1), 2)]);
    }

    #[test]
    fn season_selects_the_variant() {
        // April 30 22:00 to May 1 01:00: two low-season and two high-season hours
        let start = at(4, 30, 22);
        let series = FlowSeries::hourly(start, vec![10.0, 50.0, 50.0, 10.0]);
        let mut config = CleanerConfig::default();
        config.high_flow.min_window = 2;
        config.high_flow.initial_window = 2;
        config.high_flow.max_window = 2;

        let smoothed = seasonal_ema(&series, &config).unwrap();
        assert_eq!(smoothed.len(), 4);
        let total: f64 = smoothed.iter().sum();
        assert!((total - 120.0).abs() < 1e-9);
        // low-season rows average the whole (short) series and so agree
        assert!((smoothed[0] - smoothed[1]).abs() < 1e-12);
        // high-season rows only see their neighbours: 110/3 against 60/2
        assert!((smoothed[2] - smoothed[3] * (110.0 / 90.0)).abs() < 1e-9);
    }

    #[test]
    fn duplicate_rows_share_one_value() {
        let start = at(7, 1, 0);
        let mut times: Vec<NaiveDateTime> =
            (0..6).map(|i| start + Duration::hours(i)).collect();
        times.push(start + Duration::hours(5));
        let series = FlowSeries::new(times, vec![5.0, 6.0, 7.0, 8.0, 9.0, 100.0, 10.0]).unwrap();

        let smoothed = seasonal_ema(&series, &CleanerConfig::default()).unwrap();
        assert_eq!(smoothed.len(), 7);
        assert_eq!(smoothed[5], smoothed[6]);
    }
}
