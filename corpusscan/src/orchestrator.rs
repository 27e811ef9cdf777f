//! Runs each term batch in its own OS process.
//!
//! Workers share nothing but the filesystem: each one gets its batch of
//! terms and the effective configuration through files in a per-run
//! temporary directory, scans the whole corpus, and reports back only its
//! exit status.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::batch::{partition_terms, save_terms};
use crate::config::ScanConfig;
use crate::errors::{ScanError, ScanResult};

/// Fails on platforms that cannot spawn child processes
pub fn ensure_process_support() -> ScanResult<()> {
    if cfg!(any(unix, windows)) {
        Ok(())
    } else {
        Err(ScanError::unsupported_platform(format!(
            "process-level parallelism is not available on {}",
            std::env::consts::OS
        )))
    }
}

/// How to start a worker process.
///
/// The orchestrator appends `--config <file> --batch-file <file>
/// --batch-index <n>` to `args`.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn build(&self, config: &Path, batch_file: &Path, index: usize) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--config")
            .arg(config)
            .arg("--batch-file")
            .arg(batch_file)
            .arg("--batch-index")
            .arg(index.to_string());
        command
    }
}

/// Outcome of a full run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub terms: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

/// Splits the term list across worker processes and waits for all of them
pub struct Orchestrator {
    config: ScanConfig,
    command: WorkerCommand,
}

impl Orchestrator {
    pub fn new(config: ScanConfig, command: WorkerCommand) -> Self {
        Self { config, command }
    }

    /// Launches one worker per non-empty batch and blocks until every worker
    /// has exited. Any worker that fails to start aborts the run; workers
    /// that exit unsuccessfully are reported after all have finished.
    pub fn run(&self, terms: &[String]) -> ScanResult<RunSummary> {
        ensure_process_support()?;
        let started = Instant::now();

        let batches = partition_terms(terms, self.config.batch_count.get());
        let workdir = tempfile::Builder::new()
            .prefix("corpusscan-batches-")
            .tempdir()?;

        // Batch files are always written as UTF-8
        let worker_config = ScanConfig {
            term_encoding: "utf-8".to_string(),
            ..self.config.clone()
        };
        let config_path = workdir.path().join("config.yaml");
        worker_config.save_to(&config_path)?;

        let mut children: Vec<(usize, Child)> = Vec::with_capacity(batches.len());
        for (index, batch) in batches.iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let batch_file = workdir.path().join(format!("batch_{}.txt", index));
            save_terms(&batch_file, batch)?;

            match self.command.build(&config_path, &batch_file, index).spawn() {
                Ok(child) => {
                    info!(
                        "Launched worker {} (pid {}) with {} terms",
                        index,
                        child.id(),
                        batch.len()
                    );
                    children.push((index, child));
                }
                Err(source) => {
                    error!("Failed to launch worker {}: {}", index, source);
                    abort_all(&mut children);
                    return Err(ScanError::WorkerSpawn { index, source });
                }
            }
        }

        let workers = children.len();
        let mut first_failure = None;
        for (index, mut child) in children {
            let status = match child.wait() {
                Ok(status) => status,
                Err(e) => {
                    error!("Failed to wait for worker {}: {}", index, e);
                    if first_failure.is_none() {
                        first_failure = Some(ScanError::IoError(e));
                    }
                    continue;
                }
            };
            if status.success() {
                info!("Worker {} finished", index);
            } else {
                error!("Worker {} exited with {}", index, status);
                if first_failure.is_none() {
                    first_failure = Some(ScanError::WorkerFailed {
                        index,
                        status: status.to_string(),
                    });
                }
            }
        }
        workdir.close()?;

        if let Some(err) = first_failure {
            return Err(err);
        }
        Ok(RunSummary {
            terms: terms.len(),
            workers,
            elapsed: started.elapsed(),
        })
    }
}

fn abort_all(children: &mut Vec<(usize, Child)>) {
    for (index, child) in children.iter_mut() {
        if let Err(e) = child.kill() {
            error!("Failed to stop worker {}: {}", index, e);
        }
        let _ = child.wait();
    }
    children.clear();
}
