//! Four-stage inflow reconstruction for one basin.
//!
//! Stages run in a fixed order and communicate only through files: each
//! stage reads the file written by the previous one and writes its own,
//! so every intermediate result stays on disk for inspection. A failing
//! stage stops the basin; files already written by earlier stages remain
//! valid because every write is atomic.
//!
//! ```text
//! <basin>.csv
//!   -> AnomalyExcision            storage_cleaned.csv (+ storage_anomalies.csv)
//!   -> BackCalculation            <basin>_back_calculated.csv
//!   -> WaterBalanceRedistribution <basin>_balanced.csv
//!   -> GapLimitedInterpolation    <basin>.csv
//! ```

pub mod anomaly;
pub mod back_calculation;
pub mod gap_fill;
pub mod redistribution;

use crate::config::BacktrackConfig;
use crate::error::{Result, StreamflowError};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ANOMALIES_FILE: &str = "storage_anomalies.csv";
pub const CLEANED_FILE: &str = "storage_cleaned.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BacktrackStage {
    AnomalyExcision,
    BackCalculation,
    WaterBalanceRedistribution,
    GapLimitedInterpolation,
}

impl BacktrackStage {
    /// Stages in execution order
    pub const ALL: [BacktrackStage; 4] = [
        BacktrackStage::AnomalyExcision,
        BacktrackStage::BackCalculation,
        BacktrackStage::WaterBalanceRedistribution,
        BacktrackStage::GapLimitedInterpolation,
    ];

    pub fn next(&self) -> Option<Self> {
        match self {
            BacktrackStage::AnomalyExcision => Some(BacktrackStage::BackCalculation),
            BacktrackStage::BackCalculation => Some(BacktrackStage::WaterBalanceRedistribution),
            BacktrackStage::WaterBalanceRedistribution => {
                Some(BacktrackStage::GapLimitedInterpolation)
            }
            BacktrackStage::GapLimitedInterpolation => None,
        }
    }

    /// File this stage writes for basin `stem`
    pub fn output_file(&self, stem: &str) -> String {
        match self {
            BacktrackStage::AnomalyExcision => CLEANED_FILE.to_string(),
            BacktrackStage::BackCalculation => format!("{stem}_back_calculated.csv"),
            BacktrackStage::WaterBalanceRedistribution => format!("{stem}_balanced.csv"),
            BacktrackStage::GapLimitedInterpolation => format!("{stem}.csv"),
        }
    }
}

impl fmt::Display for BacktrackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BacktrackStage::AnomalyExcision => "anomaly excision",
            BacktrackStage::BackCalculation => "back-calculation",
            BacktrackStage::WaterBalanceRedistribution => "water-balance redistribution",
            BacktrackStage::GapLimitedInterpolation => "gap-limited interpolation",
        };
        f.write_str(name)
    }
}

/// Files written and rows touched by one basin run
#[derive(Debug, Clone)]
pub struct BacktrackReport {
    pub basin: String,
    pub output_dir: PathBuf,
    pub anomalies_file: PathBuf,
    /// Output of each completed stage with the number of rows it changed
    pub stages: Vec<(BacktrackStage, PathBuf, usize)>,
}

impl BacktrackReport {
    /// Output of the last stage
    pub fn final_file(&self) -> Option<&Path> {
        self.stages.last().map(|(_, path, _)| path.as_path())
    }

    pub fn changed_rows(&self, stage: BacktrackStage) -> Option<usize> {
        self.stages
            .iter()
            .find(|(s, _, _)| *s == stage)
            .map(|(_, _, changed)| *changed)
    }
}

/// Runs the four stages for basin files into `<output_root>/<basin>/`
#[derive(Debug, Clone)]
pub struct BacktrackPipeline {
    config: BacktrackConfig,
    output_root: PathBuf,
}

impl BacktrackPipeline {
    pub fn new(output_root: impl Into<PathBuf>, config: BacktrackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            output_root: output_root.into(),
        })
    }

    pub fn config(&self) -> &BacktrackConfig {
        &self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Run every stage for the basin file `input`
    pub fn run_basin(&self, input: &Path) -> Result<BacktrackReport> {
        let basin = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StreamflowError::ProcessingFailed {
                path: input.to_path_buf(),
                reason: "basin file has no name".to_string(),
            })?;
        let output_dir = self.output_root.join(&basin);
        std::fs::create_dir_all(&output_dir)?;

        let mut report = BacktrackReport {
            basin: basin.clone(),
            anomalies_file: output_dir.join(ANOMALIES_FILE),
            output_dir,
            stages: Vec::with_capacity(BacktrackStage::ALL.len()),
        };

        let mut source = input.to_path_buf();
        let mut stage = Some(BacktrackStage::AnomalyExcision);
        while let Some(current) = stage {
            let target = report.output_dir.join(current.output_file(&basin));
            debug!("{}: {} -> {}", basin, current, target.display());

            let changed = self.run_stage(current, &source, &target, &report.anomalies_file)?;
            report.stages.push((current, target.clone(), changed));
            source = target;
            stage = current.next();
        }

        info!(
            "Reconstructed {} ({} storage anomalies, {} derived, {} negatives removed, {} gap hours filled)",
            basin,
            report.changed_rows(BacktrackStage::AnomalyExcision).unwrap_or(0),
            report.changed_rows(BacktrackStage::BackCalculation).unwrap_or(0),
            report
                .changed_rows(BacktrackStage::WaterBalanceRedistribution)
                .unwrap_or(0),
            report
                .changed_rows(BacktrackStage::GapLimitedInterpolation)
                .unwrap_or(0),
        );
        Ok(report)
    }

    fn run_stage(
        &self,
        stage: BacktrackStage,
        input: &Path,
        output: &Path,
        anomalies: &Path,
    ) -> Result<usize> {
        let config = &self.config;
        match stage {
            BacktrackStage::AnomalyExcision => {
                anomaly::run(input, output, anomalies, config.anomaly_threshold)
            }
            BacktrackStage::BackCalculation => {
                back_calculation::run(input, output, config.storage_unit)
            }
            BacktrackStage::WaterBalanceRedistribution => redistribution::run(
                input,
                output,
                config.redistribution_window,
                config.redistribution_stride,
            ),
            BacktrackStage::GapLimitedInterpolation => {
                gap_fill::run(input, output, config.max_gap_hours)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_chain_in_fixed_order() {
        let mut order = vec![BacktrackStage::AnomalyExcision];
        while let Some(next) = order.last().and_then(|s| s.next()) {
            order.push(next);
        }
        assert_eq!(order, BacktrackStage::ALL.to_vec());
    }

    #[test]
    fn stage_files_are_named_after_the_basin() {
        assert_eq!(
            BacktrackStage::BackCalculation.output_file("21401550"),
            "21401550_back_calculated.csv"
        );
        assert_eq!(
            BacktrackStage::GapLimitedInterpolation.output_file("21401550"),
            "21401550.csv"
        );
        assert_eq!(BacktrackStage::AnomalyExcision.output_file("x"), CLEANED_FILE);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = BacktrackConfig {
            redistribution_stride: 0,
            ..Default::default()
        };
        assert!(BacktrackPipeline::new("/tmp/out", config).is_err());
    }
}
