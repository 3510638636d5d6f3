//! Integration tests for the backtrack reconstruction
//!
//! Each test writes a basin file, runs the four stages through the public
//! API and inspects the final gridded file.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use streamflow_processor::{BacktrackConfig, BacktrackPipeline, BacktrackStage, BasinFrame};
use tempfile::TempDir;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 8, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Steady basin recorded at the given hour offsets
fn write_steady_basin(dir: &Path, stcd: &str, hours: &[i64]) -> PathBuf {
    let mut body = String::from("STCD,TM,RZ,INQ,W,OTQ\n");
    for hour in hours {
        let time = start() + Duration::hours(*hour);
        body.push_str(&format!(
            "{},{},250.0,5.0,800.0,5.0\n",
            stcd,
            time.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    let path = dir.join(format!("{stcd}.csv"));
    std::fs::write(&path, body).unwrap();
    path
}

/// Ten recorded hours, `missing` absent hours, then ten more
fn hours_around_gap(missing: i64) -> Vec<i64> {
    (0..10).chain(10 + missing..20 + missing).collect()
}

fn final_inflow(report_dir: &Path, stcd: &str) -> Vec<f64> {
    BasinFrame::read_csv(&report_dir.join(format!("{stcd}.csv")))
        .unwrap()
        .float_column("INQ")
        .unwrap()
}

#[test]
fn test_week_long_gap_is_filled() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_steady_basin(temp_dir.path(), "41000100", &hours_around_gap(168));
    let pipeline =
        BacktrackPipeline::new(temp_dir.path().join("out"), BacktrackConfig::default()).unwrap();

    let report = pipeline.run_basin(&input).unwrap();

    assert_eq!(report.basin, "41000100");
    assert_eq!(
        report.changed_rows(BacktrackStage::GapLimitedInterpolation),
        Some(168)
    );
    assert_eq!(report.final_file(), Some(report.output_dir.join("41000100.csv").as_path()));

    let inflow = final_inflow(&report.output_dir, "41000100");
    assert_eq!(inflow.len(), 188);
    assert!(inflow.iter().all(|v| (v - 5.0).abs() < 1e-9));
}

#[test]
fn test_gap_longer_than_a_week_stays_missing() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_steady_basin(temp_dir.path(), "41000200", &hours_around_gap(169));
    let pipeline =
        BacktrackPipeline::new(temp_dir.path().join("out"), BacktrackConfig::default()).unwrap();

    let report = pipeline.run_basin(&input).unwrap();

    assert_eq!(
        report.changed_rows(BacktrackStage::GapLimitedInterpolation),
        Some(0)
    );
    let inflow = final_inflow(&report.output_dir, "41000200");
    assert_eq!(inflow.len(), 189);
    assert_eq!(inflow.iter().filter(|v| v.is_nan()).count(), 169);
    assert!(inflow[..10].iter().all(|v| (v - 5.0).abs() < 1e-9));
    assert!(inflow[179..].iter().all(|v| (v - 5.0).abs() < 1e-9));
}

#[test]
fn test_gap_limit_is_configurable() {
    let temp_dir = TempDir::new().unwrap();
    let input = write_steady_basin(temp_dir.path(), "41000300", &hours_around_gap(5));
    let config = BacktrackConfig::default().with_max_gap_hours(4);
    let pipeline = BacktrackPipeline::new(temp_dir.path().join("out"), config).unwrap();

    let report = pipeline.run_basin(&input).unwrap();

    let inflow = final_inflow(&report.output_dir, "41000300");
    assert_eq!(inflow.len(), 25);
    assert!(inflow[10..15].iter().all(|v| v.is_nan()));
}

#[test]
fn test_negative_derived_inflow_is_redistributed() {
    let temp_dir = TempDir::new().unwrap();
    let mut body = String::from("STCD,TM,INQ,W,OTQ\n");
    // storage drops faster than outflow at hour 4, deriving a negative inflow
    for hour in 0..12 {
        let time = start() + Duration::hours(hour);
        let (inflow, storage) = match hour {
            4 => (String::new(), 799.9820),
            h if h > 4 => ("6.0".to_string(), 799.9820),
            _ => ("6.0".to_string(), 800.0),
        };
        body.push_str(&format!(
            "41000400,{},{},{:.4},2.0\n",
            time.format("%Y-%m-%d %H:%M:%S"),
            inflow,
            storage
        ));
    }
    let input = temp_dir.path().join("41000400.csv");
    std::fs::write(&input, body).unwrap();

    let pipeline =
        BacktrackPipeline::new(temp_dir.path().join("out"), BacktrackConfig::default()).unwrap();
    let report = pipeline.run_basin(&input).unwrap();

    // 2 + 1e6 * (-0.018) / 3600 = -3
    let back = BasinFrame::read_csv(
        &report
            .output_dir
            .join(BacktrackStage::BackCalculation.output_file("41000400")),
    )
    .unwrap();
    let derived = back.float_column("INQ").unwrap();
    assert!((derived[4] + 3.0).abs() < 1e-6);

    assert_eq!(
        report.changed_rows(BacktrackStage::WaterBalanceRedistribution),
        Some(1)
    );
    let inflow = final_inflow(&report.output_dir, "41000400");
    assert!(inflow.iter().all(|v| *v >= 0.0));
    assert_eq!(inflow[4], 0.0);
}
