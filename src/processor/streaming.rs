//! Concurrent per-basin execution
//!
//! Runs a blocking per-file job over many basin files with bounded
//! concurrency. A failing file is logged and recorded; it never stops the
//! other files.

use crate::config::ProcessorConfig;
use crate::error::{Result, StreamflowError};
use crate::models::FileFailure;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, error};

/// Per-file results of one batch run
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<(PathBuf, T)>,
    pub failures: Vec<FileFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn files_processed(&self) -> usize {
        self.succeeded.len()
    }

    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }
}

/// Streaming processor for basin folders
#[derive(Debug)]
pub struct StreamingProcessor {
    config: ProcessorConfig,
    show_progress: bool,
}

impl StreamingProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self {
            config,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("Processing basins");
        pb
    }

    /// Run `job` on every file, at most `max_concurrent_files` at a time
    pub async fn process_files<T, F>(&self, files: &[PathBuf], job: F) -> BatchOutcome<T>
    where
        T: Send + 'static,
        F: Fn(&Path) -> Result<T> + Send + Sync + 'static,
    {
        let pb = self.progress_bar(files.len());
        let concurrent_limit = self.config.max_concurrent_files.min(files.len()).max(1);
        debug!(
            "Processing {} files with concurrency {}",
            files.len(),
            concurrent_limit
        );

        let job = Arc::new(job);
        let outcome = stream::iter(files.iter().cloned())
            .map(|file_path| {
                let job = Arc::clone(&job);
                let pb = pb.clone();
                async move {
                    if let Some(file_name) = file_path.file_name() {
                        pb.set_message(format!("Processing: {}", file_name.to_string_lossy()));
                    }

                    let result = task::spawn_blocking({
                        let file_path = file_path.clone();
                        move || job(&file_path)
                    })
                    .await
                    .map_err(|e| StreamflowError::ProcessingFailed {
                        path: file_path.clone(),
                        reason: format!("worker task failed: {}", e),
                    })
                    .and_then(|result| result);
                    pb.inc(1);

                    match &result {
                        Ok(_) => debug!("Successfully processed: {}", file_path.display()),
                        Err(e) => error!("Failed to process {}: {:#}", file_path.display(), e),
                    }
                    (file_path, result)
                }
            })
            .buffer_unordered(concurrent_limit)
            .fold(
                BatchOutcome {
                    succeeded: Vec::new(),
                    failures: Vec::new(),
                },
                |mut outcome, (file_path, result)| async move {
                    match result {
                        Ok(value) => outcome.succeeded.push((file_path, value)),
                        Err(e) => outcome.failures.push(FileFailure {
                            path: file_path,
                            reason: e.to_string(),
                        }),
                    }
                    outcome
                },
            )
            .await;

        pb.finish_with_message("All basin files processed");
        outcome
    }
}
