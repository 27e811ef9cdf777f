//! Term lists, their partition into batches, and the worker that scans one batch.
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::cache::{FileSource, FsSource};
use crate::config::{resolve_encoding, ScanConfig};
use crate::corpus::{shards_for, CorpusShard};
use crate::errors::ScanResult;
use crate::metrics::ScanMetrics;
use crate::output::OutputSink;
use crate::results::BatchReport;
use crate::search::ShardScanner;

/// Characters that cannot appear in a result file name
const FORBIDDEN_TERM_CHARS: &[char] = &['/', '\\', '\0', ':', '*', '?', '"', '<', '>', '|'];

/// Checks that a term can double as the base name of its result file
pub fn is_valid_term(term: &str) -> bool {
    !term.is_empty()
        && term != "."
        && term != ".."
        && !term.contains(FORBIDDEN_TERM_CHARS)
        && !term.chars().any(char::is_control)
}

/// Parses a line-delimited term list.
///
/// Lines are trimmed and blank lines skipped. Terms that cannot be used as
/// a file name are dropped with a warning.
pub fn parse_terms(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|term| {
            let valid = is_valid_term(term);
            if !valid {
                warn!("Dropping term {:?}: not usable as a file name", term);
            }
            valid
        })
        .map(str::to_owned)
        .collect()
}

/// Reads and parses a term list file in the given encoding
pub fn load_terms(path: &Path, encoding_label: &str) -> ScanResult<Vec<String>> {
    let encoding = resolve_encoding(encoding_label)?;
    let bytes = std::fs::read(path)?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            "Term list {} is not valid {}; malformed bytes replaced",
            path.display(),
            encoding.name()
        );
    }
    Ok(parse_terms(&text))
}

/// Writes a term list, one term per line, as UTF-8
pub fn save_terms(path: &Path, terms: &[String]) -> ScanResult<()> {
    let mut body = terms.join("\n");
    body.push('\n');
    std::fs::write(path, body)?;
    Ok(())
}

/// Splits `terms` into `count` contiguous batches.
///
/// Every term lands in exactly one batch and batches keep the original
/// order. Sizes differ by at most one, larger batches first. When there are
/// fewer terms than batches the trailing batches are empty.
pub fn partition_terms(terms: &[String], count: usize) -> Vec<Vec<String>> {
    let count = count.max(1);
    let base = terms.len() / count;
    let extra = terms.len() % count;

    let mut batches = Vec::with_capacity(count);
    let mut start = 0;
    for index in 0..count {
        let len = base + usize::from(index < extra);
        batches.push(terms[start..start + len].to_vec());
        start += len;
    }
    batches
}

/// Scans one term batch against the whole corpus.
///
/// The batch is cut into chunks of `term_chunk_size`; each chunk is run
/// against the classical shard and then every modern era in order. Every
/// chunk reads each corpus file once. Shards
/// are scanned one after another, files within a shard concurrently.
pub struct BatchWorker {
    config: ScanConfig,
    scanner: ShardScanner,
    shards: Vec<CorpusShard>,
}

impl BatchWorker {
    pub fn new(config: ScanConfig) -> ScanResult<Self> {
        Self::with_source(config, Arc::new(FsSource::new()))
    }

    pub fn with_source(config: ScanConfig, source: Arc<dyn FileSource>) -> ScanResult<Self> {
        let metrics = ScanMetrics::new();
        let sink = Arc::new(OutputSink::new(
            &config.output_dir,
            resolve_encoding(&config.output_encoding)?,
            metrics.clone(),
        ));
        let scanner = ShardScanner::new(&config, source, sink, metrics)?;
        let shards = shards_for(&config);
        Ok(Self {
            config,
            scanner,
            shards,
        })
    }

    pub fn metrics(&self) -> &ScanMetrics {
        self.scanner.metrics()
    }

    pub fn run(&self, terms: &[String]) -> BatchReport {
        let started = Instant::now();
        let chunk_size = self.config.term_chunk_size.get();
        let chunks = terms.len().div_ceil(chunk_size);
        info!(
            "Scanning {} terms in {} chunks across {} shards",
            terms.len(),
            chunks,
            self.shards.len()
        );

        let mut report = BatchReport {
            terms: terms.len(),
            ..Default::default()
        };
        for (index, chunk) in terms.chunks(chunk_size).enumerate() {
            let chunk_started = Instant::now();
            info!("Chunk {}/{}: {} terms", index + 1, chunks, chunk.len());
            for shard in &self.shards {
                report.add_shard(self.scanner.scan(chunk, shard));
            }
            info!(
                "Chunk {}/{} finished in {}",
                index + 1,
                chunks,
                humantime::format_duration(chunk_started.elapsed())
            );
        }

        report.elapsed = started.elapsed();
        self.metrics().log_stats();
        report
    }
}
