use clap::{Parser, Subcommand};
use colored::Colorize;
use corpusscan::{
    load_terms,
    output::reset_output_dir,
    BatchReport, BatchWorker, Orchestrator, RunSummary, ScanConfig, ScanError, ScanOverrides,
    TermMode, WorkerCommand,
};
use std::{num::NonZeroUsize, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Result<T> = std::result::Result<T, ScanError>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliScanConfig {
    /// Configuration file layered over the default locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Line-delimited list of query terms
    #[arg(short, long)]
    terms: Option<PathBuf>,

    /// Directory receiving one <term>.txt per query term
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Root of the classical corpus
    #[arg(long)]
    classical_root: Option<PathBuf>,

    /// Root of the modern corpus (one sub-directory per era)
    #[arg(long)]
    modern_root: Option<PathBuf>,

    /// Characters of context on each side of a match
    #[arg(short = 'w', long)]
    window: Option<usize>,

    /// Number of threads per shard scan
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Treat every term as a regular expression
    #[arg(short, long)]
    regex: bool,

    /// Append to existing result files instead of clearing them first
    #[arg(long)]
    keep_output: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl CliScanConfig {
    fn overrides(&self) -> ScanOverrides {
        ScanOverrides {
            terms_file: self.terms.clone(),
            output_dir: self.output_dir.clone(),
            classical_root: self.classical_root.clone(),
            modern_root: self.modern_root.clone(),
            context_window: self.window,
            max_workers: self.threads,
            batch_count: None,
            term_mode: self.regex.then_some(TermMode::Regex),
            log_level: self.log_level.clone(),
        }
    }

    fn load(&self) -> Result<ScanConfig> {
        Ok(ScanConfig::load_from(self.config.as_deref())?.merge_with_cli(self.overrides()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the corpus, splitting the term list across worker processes
    Run {
        #[command(flatten)]
        scan: CliScanConfig,

        /// Number of worker processes
        #[arg(short = 'b', long)]
        batches: Option<NonZeroUsize>,
    },

    /// Scan the corpus for the whole term list in this process
    Scan {
        #[command(flatten)]
        scan: CliScanConfig,
    },

    /// Scan one term batch (launched by `run`)
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        batch_file: PathBuf,

        #[arg(long)]
        batch_index: usize,
    },
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();
}

fn main() -> Result<()> {
    run()
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scan, batches } => {
            let mut config = scan.load()?;
            if let Some(batches) = batches {
                config.batch_count = batches;
            }
            init_logging(&config.log_level);

            let terms = prepare(&config, scan.keep_output)?;
            let command = WorkerCommand::new(std::env::current_exe()?).arg("worker");
            let summary = Orchestrator::new(config.clone(), command).run(&terms)?;
            print_run_summary(&summary, &config);
            Ok(())
        }
        Commands::Scan { scan } => {
            let config = scan.load()?;
            init_logging(&config.log_level);

            let terms = prepare(&config, scan.keep_output)?;
            let report = BatchWorker::new(config.clone())?.run(&terms);
            print_batch_report(&report, &config);
            Ok(())
        }
        Commands::Worker {
            config,
            batch_file,
            batch_index,
        } => {
            let config = ScanConfig::load_from(Some(config.as_path()))?;
            init_logging(&config.log_level);
            let span = tracing::info_span!("batch", index = batch_index);
            let _enter = span.enter();

            std::fs::create_dir_all(&config.output_dir)?;
            let terms = load_terms(&batch_file, &config.term_encoding)?;
            info!("Worker started with {} terms", terms.len());
            let report = BatchWorker::new(config)?.run(&terms);
            info!(
                "Worker done: {} snippets, {} of {} units failed, in {}",
                report.total_snippets(),
                report.failed_units(),
                report.total_units(),
                humantime::format_duration(report.elapsed)
            );
            Ok(())
        }
    }
}

/// Loads the term list and readies the output directory
fn prepare(config: &ScanConfig, keep_output: bool) -> Result<Vec<String>> {
    let terms = load_terms(&config.terms_file, &config.term_encoding)?;
    if terms.is_empty() {
        return Err(ScanError::config_error(format!(
            "No usable terms in {}",
            config.terms_file.display()
        )));
    }

    if keep_output {
        std::fs::create_dir_all(&config.output_dir)?;
    } else {
        let removed = reset_output_dir(&config.output_dir)?;
        if removed > 0 {
            info!("Cleared {} previous result files", removed);
        }
    }
    Ok(terms)
}

fn print_run_summary(summary: &RunSummary, config: &ScanConfig) {
    println!(
        "Scanned {} terms with {} workers in {}",
        summary.terms.to_string().green(),
        summary.workers.to_string().green(),
        humantime::format_duration(summary.elapsed)
    );
    println!(
        "Results in {}",
        config.output_dir.display().to_string().blue()
    );
}

fn print_batch_report(report: &BatchReport, config: &ScanConfig) {
    println!(
        "Scanned {} terms across {} shard scans in {}",
        report.terms.to_string().green(),
        report.shards.len(),
        humantime::format_duration(report.elapsed)
    );
    println!(
        "Found {} snippets ({} units, {} failed)",
        report.total_snippets().to_string().green(),
        report.total_units(),
        if report.failed_units() > 0 {
            report.failed_units().to_string().red()
        } else {
            report.failed_units().to_string().normal()
        }
    );
    println!(
        "Results in {}",
        config.output_dir.display().to_string().blue()
    );
}
