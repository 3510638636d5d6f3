//! Command-line interface components.

use crate::config::{BacktrackConfig, CleanerConfig, ProcessorConfig};
use crate::models::{PipelineOutcome, ProcessingStats};
use crate::pipeline::clean_file;
use crate::processor::{BacktrackProcessor, CleanProcessor};

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "streamflow")]
#[command(about = "Denoise reservoir inflow series and reconstruct inflow from storage records")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Smooth the INQ column of one basin file or every basin file in a folder
    Clean(CleanArgs),

    /// Reconstruct inflow for every basin file in a folder
    Backtrack(BacktrackArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CleanArgs {
    /// Basin CSV file or folder of basin CSV files
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file (single input) or folder (folder input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Methods to chain, in order; the result column is named after the first
    #[arg(long, value_delimiter = ',', default_value = "EMA")]
    pub methods: Vec<String>,

    /// Rolling window length in samples
    #[arg(long)]
    pub window_size: Option<usize>,

    /// Step between strided windows
    #[arg(long)]
    pub stride: Option<usize>,

    /// Cutoff frequency for the lowpass and FFT filters
    #[arg(long)]
    pub cutoff_frequency: Option<f64>,

    /// Sample spacing for FFT frequencies
    #[arg(long)]
    pub time_step: Option<f64>,

    /// Number of FFT passes
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Sampling rate for the Butterworth design
    #[arg(long)]
    pub sampling_rate: Option<f64>,

    /// Butterworth filter order
    #[arg(long)]
    pub order: Option<usize>,

    /// Wavelet scale row (0-29)
    #[arg(long)]
    pub cwt_row: Option<usize>,

    /// Maximum basin files processed at the same time
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl CleanArgs {
    /// Defaults overridden by whatever was given on the command line
    pub fn cleaner_config(&self) -> CleanerConfig {
        let mut config = CleanerConfig::default();
        if let Some(window_size) = self.window_size {
            config = config.with_window_size(window_size);
        }
        if let Some(stride) = self.stride {
            config = config.with_stride(stride);
        }
        if let Some(cutoff) = self.cutoff_frequency {
            config = config.with_cutoff_frequency(cutoff);
        }
        if let Some(time_step) = self.time_step {
            config = config.with_time_step(time_step);
        }
        if let Some(iterations) = self.iterations {
            config = config.with_iterations(iterations);
        }
        if let Some(sampling_rate) = self.sampling_rate {
            config = config.with_sampling_rate(sampling_rate);
        }
        if let Some(order) = self.order {
            config = config.with_order(order);
        }
        if let Some(cwt_row) = self.cwt_row {
            config = config.with_cwt_row(cwt_row);
        }
        config
    }
}

#[derive(ClapArgs, Debug)]
pub struct BacktrackArgs {
    /// Folder of basin CSV files
    #[arg(value_name = "DATA_FOLDER")]
    pub data_folder: PathBuf,

    /// Output folder (one subfolder per basin)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Longest run of missing hours that is still interpolated
    #[arg(long, default_value_t = 168)]
    pub max_gap_hours: usize,

    /// Storage step that marks a row as anomalous
    #[arg(long, default_value_t = 200.0)]
    pub anomaly_threshold: f64,

    /// Maximum basin files processed at the same time
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn processor_config(jobs: Option<usize>) -> ProcessorConfig {
    match jobs {
        Some(jobs) => ProcessorConfig::default().with_max_concurrent_files(jobs),
        None => ProcessorConfig::default(),
    }
}

/// Set up structured logging based on CLI arguments
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("streamflow_processor={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Run the selected command
pub async fn run(args: Args) -> Result<()> {
    setup_logging(&args);
    debug!("Command line arguments: {:?}", args);
    let show_progress = !args.quiet;

    match args.command {
        Command::Clean(clean) => run_clean(clean, show_progress).await,
        Command::Backtrack(backtrack) => run_backtrack(backtrack, show_progress).await,
    }
}

async fn run_clean(args: CleanArgs, show_progress: bool) -> Result<()> {
    let config = args.cleaner_config();

    if args.input.is_file() {
        let start_time = Instant::now();
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| cleaned_file_path(&args.input));
        let input = args.input.clone();
        let methods = args.methods.clone();
        let target = output.clone();

        let outcome =
            tokio::task::spawn_blocking(move || clean_file(&input, &target, &methods, &config))
                .await
                .context("cleaning task panicked")?
                .with_context(|| format!("Failed to clean {}", args.input.display()))?;

        print_clean_summary(&outcome, &output, start_time.elapsed().as_millis());
        return Ok(());
    }

    info!("Cleaning folder {}", args.input.display());
    let stats = CleanProcessor::new(args.input.clone(), args.output.clone(), args.methods.clone())?
        .with_config(config)
        .with_processor_config(processor_config(args.jobs))
        .with_progress(show_progress)
        .process()
        .await?;

    print_summary("Cleaning Summary", &stats);
    Ok(())
}

async fn run_backtrack(args: BacktrackArgs, show_progress: bool) -> Result<()> {
    let config = BacktrackConfig::default()
        .with_max_gap_hours(args.max_gap_hours)
        .with_anomaly_threshold(args.anomaly_threshold);

    let stats = BacktrackProcessor::new(args.data_folder.clone(), args.output.clone())?
        .with_config(config)
        .with_processor_config(processor_config(args.jobs))
        .with_progress(show_progress)
        .process()
        .await?;

    print_summary("Backtrack Summary", &stats);
    Ok(())
}

/// `<dir>/<stem>_cleaned.csv` next to the input file
fn cleaned_file_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "basin".to_string());
    input.with_file_name(format!("{}_cleaned.csv", stem))
}

fn print_clean_summary(outcome: &PipelineOutcome, output: &Path, elapsed_ms: u128) {
    println!("\n{}", "Cleaning Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        elapsed_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Column:".bright_cyan(),
        outcome.column.bright_white().bold()
    );
    let applied: Vec<&str> = outcome.applied_methods.iter().map(|m| m.name()).collect();
    println!("  {} {}", "Applied:".bright_cyan(), applied.join(" -> "));
    if !outcome.skipped_methods.is_empty() {
        println!(
            "  {} {}",
            "Skipped:".bright_yellow(),
            outcome.skipped_methods.join(", ").bright_yellow()
        );
    }
    println!(
        "  {} {}",
        "Missing values kept:".bright_cyan(),
        outcome.masked.to_string().bright_white()
    );
    println!("  {} {}", "Output:".bright_cyan(), output.display());
}

fn print_summary(title: &str, stats: &ProcessingStats) {
    println!("\n{}", title.bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files processed:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_failed > 0 {
        println!(
            "  {} {}",
            "Files failed:".bright_red(),
            stats.files_failed.to_string().bright_red().bold()
        );
        for failure in &stats.failures {
            println!("    {} {}", failure.path.display(), failure.reason.red());
        }
    }
    println!(
        "  {} {}",
        "Output:".bright_cyan(),
        stats.output_path.display()
    );
}
