use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::engine::MatchEngine;
use super::matcher::TermMatcher;
use crate::cache::{CacheSettings, FileContentCache, FileSource, TextDecoder};
use crate::config::ScanConfig;
use crate::corpus::{CorpusFile, CorpusShard};
use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::output::OutputSink;
use crate::results::ShardReport;

#[derive(Default)]
struct UnitCounters {
    units: AtomicUsize,
    failed: AtomicUsize,
    snippets: AtomicUsize,
}

/// Scans a batch of terms against one shard at a time.
///
/// Files are handed to a bounded thread pool in fixed-size groups. Every
/// (file, term) pair of a group is one unit of work, and all units of a
/// scan read through one [`FileContentCache`], so each file is read once no
/// matter how many terms the batch holds.
pub struct ShardScanner {
    config: ScanConfig,
    pool: ThreadPool,
    source: Arc<dyn FileSource>,
    decoder: TextDecoder,
    engine: MatchEngine,
    sink: Arc<OutputSink>,
    metrics: ScanMetrics,
}

impl ShardScanner {
    pub fn new(
        config: &ScanConfig,
        source: Arc<dyn FileSource>,
        sink: Arc<OutputSink>,
        metrics: ScanMetrics,
    ) -> ScanResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.max_workers.get())
            .thread_name(|i| format!("scan-{}", i))
            .build()
            .map_err(|e| ScanError::WorkerPool(e.to_string()))?;
        let decoder = TextDecoder::for_label(&config.corpus_encoding, config.encoding_mode)?;

        Ok(Self {
            config: config.clone(),
            pool,
            source,
            decoder,
            engine: MatchEngine::new(config.context_window),
            sink,
            metrics,
        })
    }

    /// Compiles the batch's terms, dropping the ones that do not compile
    fn compile_terms(&self, terms: &[String]) -> (Vec<TermMatcher>, Vec<String>) {
        let mut matchers = Vec::with_capacity(terms.len());
        let mut rejected = Vec::new();
        for term in terms {
            match TermMatcher::new(term, self.config.term_mode) {
                Ok(matcher) => matchers.push(matcher),
                Err(e) => {
                    error!("Skipping term {:?}: {}", term, e);
                    rejected.push(term.clone());
                }
            }
        }
        (matchers, rejected)
    }

    /// Runs every (file, term) unit of `terms` against `shard` and waits for
    /// all of them. The shard's content cache is emptied on return.
    pub fn scan(&self, terms: &[String], shard: &CorpusShard) -> ShardReport {
        let started = Instant::now();
        let files = shard.discover(&self.config.file_extensions, &self.config.ignore_patterns);
        let (matchers, rejected) = self.compile_terms(terms);

        let mut report = ShardReport {
            shard: shard.label.clone(),
            files: files.len(),
            ..Default::default()
        };
        report.failed_units = rejected.len() * files.len();
        report.units = report.failed_units;

        if files.is_empty() || matchers.is_empty() {
            return report;
        }

        let cache = FileContentCache::new(
            Arc::clone(&self.source),
            self.decoder,
            CacheSettings::from_config(&self.config),
            self.metrics.clone(),
        );
        let _close = cache.close_on_drop();
        let counters = UnitCounters::default();
        let group_size = self.config.file_group_size.get();
        let groups = files.len().div_ceil(group_size);

        for (index, group) in files.chunks(group_size).enumerate() {
            self.pool.scope(|s| {
                for file in group {
                    for matcher in &matchers {
                        let cache = &cache;
                        let counters = &counters;
                        s.spawn(move |_| self.run_unit(matcher, file, cache, counters));
                    }
                }
            });
            debug!(
                "Shard {}: file group {}/{} done",
                shard.label,
                index + 1,
                groups
            );
        }

        report.units += counters.units.load(Ordering::Relaxed);
        report.failed_units += counters.failed.load(Ordering::Relaxed);
        report.snippets = counters.snippets.load(Ordering::Relaxed);
        info!(
            "Shard {}: {} files x {} terms, {} snippets in {}",
            shard.label,
            report.files,
            matchers.len(),
            report.snippets,
            humantime::format_duration(started.elapsed())
        );
        report
    }

    fn run_unit(
        &self,
        matcher: &TermMatcher,
        file: &CorpusFile,
        cache: &FileContentCache,
        counters: &UnitCounters,
    ) {
        counters.units.fetch_add(1, Ordering::Relaxed);
        let snippets = self.engine.scan(matcher, file, cache);
        let failed = match self.sink.append_all(&snippets) {
            Ok(()) => {
                counters.snippets.fetch_add(snippets.len(), Ordering::Relaxed);
                false
            }
            Err(e) => {
                error!(
                    "Failed to record matches of {:?} in {}: {}",
                    matcher.term(),
                    file.provenance.display(),
                    e
                );
                counters.failed.fetch_add(1, Ordering::Relaxed);
                true
            }
        };
        self.metrics.record_unit(failed);
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }
}
