//! Folder-level batch drivers.
//!
//! Orchestrates discovery of basin files and their concurrent processing,
//! either through the four-stage backtrack reconstruction or through the
//! smoothing method pipeline.

pub mod discovery;
pub mod streaming;

#[cfg(test)]
pub mod tests;

use self::{discovery::FileDiscovery, streaming::StreamingProcessor};

use crate::backtrack::BacktrackPipeline;
use crate::config::{BacktrackConfig, CleanerConfig, ProcessorConfig};
use crate::error::{Result, StreamflowError};
use crate::models::ProcessingStats;
use crate::pipeline::{MethodPipeline, clean_file};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Default output folder for a data folder
fn default_output(data_folder: &Path, name: &str) -> PathBuf {
    data_folder.join(name)
}

/// Runs the backtrack reconstruction for every basin in a folder
#[derive(Debug)]
pub struct BacktrackProcessor {
    output_path: PathBuf,
    config: BacktrackConfig,
    processor_config: ProcessorConfig,
    show_progress: bool,
    file_discovery: FileDiscovery,
}

impl BacktrackProcessor {
    /// Create a processor; output defaults to `<data_folder>/output`
    pub fn new(data_folder: PathBuf, output_path: Option<PathBuf>) -> Result<Self> {
        if !data_folder.is_dir() {
            return Err(StreamflowError::DatasetNotFound { path: data_folder });
        }
        let output_path = output_path.unwrap_or_else(|| default_output(&data_folder, "output"));

        Ok(Self {
            output_path,
            config: BacktrackConfig::default(),
            processor_config: ProcessorConfig::default(),
            show_progress: true,
            file_discovery: FileDiscovery::new(data_folder),
        })
    }

    pub fn with_config(mut self, config: BacktrackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_processor_config(mut self, config: ProcessorConfig) -> Self {
        self.processor_config = config;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Reconstruct every basin; per-basin failures are counted, not fatal
    pub async fn process(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        let pipeline = BacktrackPipeline::new(self.output_path.clone(), self.config.clone())?;

        let files = self.file_discovery.discover_csv_files().await?;
        info!(
            "Reconstructing {} basin(s) from {} into {}",
            files.len(),
            self.file_discovery.data_folder().display(),
            self.output_path.display()
        );
        tokio::fs::create_dir_all(&self.output_path).await?;

        let outcome = StreamingProcessor::new(self.processor_config.clone())
            .with_progress(self.show_progress)
            .process_files(&files, move |path| pipeline.run_basin(path))
            .await;

        Ok(ProcessingStats {
            files_processed: outcome.files_processed(),
            files_failed: outcome.files_failed(),
            failures: outcome.failures,
            output_path: self.output_path.clone(),
            processing_time_ms: start_time.elapsed().as_millis(),
        })
    }
}

/// Applies a method chain to every basin in a folder
#[derive(Debug)]
pub struct CleanProcessor {
    output_path: PathBuf,
    methods: Vec<String>,
    config: CleanerConfig,
    processor_config: ProcessorConfig,
    show_progress: bool,
    file_discovery: FileDiscovery,
}

impl CleanProcessor {
    /// Create a processor; output defaults to `<input_folder>/cleaned`
    pub fn new(
        input_folder: PathBuf,
        output_path: Option<PathBuf>,
        methods: Vec<String>,
    ) -> Result<Self> {
        if !input_folder.is_dir() {
            return Err(StreamflowError::DatasetNotFound { path: input_folder });
        }
        let output_path = output_path.unwrap_or_else(|| default_output(&input_folder, "cleaned"));

        Ok(Self {
            output_path,
            methods,
            config: CleanerConfig::default(),
            processor_config: ProcessorConfig::default(),
            show_progress: true,
            file_discovery: FileDiscovery::new(input_folder),
        })
    }

    pub fn with_config(mut self, config: CleanerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_processor_config(mut self, config: ProcessorConfig) -> Self {
        self.processor_config = config;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Clean every basin file into the output folder under its own name
    pub async fn process(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        // Parameter errors are fatal for the whole run, not per file
        MethodPipeline::new(self.config.clone())?;

        let files = self.file_discovery.discover_csv_files().await?;
        info!(
            "Cleaning {} basin(s) with [{}] into {}",
            files.len(),
            self.methods.join(", "),
            self.output_path.display()
        );
        tokio::fs::create_dir_all(&self.output_path).await?;

        let output_dir = self.output_path.clone();
        let methods = self.methods.clone();
        let config = self.config.clone();
        let outcome = StreamingProcessor::new(self.processor_config.clone())
            .with_progress(self.show_progress)
            .process_files(&files, move |path| {
                let file_name = path.file_name().ok_or_else(|| StreamflowError::ProcessingFailed {
                    path: path.to_path_buf(),
                    reason: "basin file has no name".to_string(),
                })?;
                clean_file(path, &output_dir.join(file_name), &methods, &config)
            })
            .await;

        Ok(ProcessingStats {
            files_processed: outcome.files_processed(),
            files_failed: outcome.files_failed(),
            failures: outcome.failures,
            output_path: self.output_path.clone(),
            processing_time_ms: start_time.elapsed().as_millis(),
        })
    }
}
