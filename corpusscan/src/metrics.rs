use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Counters shared by the cache, the match engine and the output sink of one worker
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    // File source
    physical_reads: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    read_failures: Arc<AtomicU64>,

    // Content cache
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,
    ttl_evictions: Arc<AtomicU64>,
    capacity_evictions: Arc<AtomicU64>,

    // Work units
    units_run: Arc<AtomicU64>,
    units_failed: Arc<AtomicU64>,
    snippets_written: Arc<AtomicU64>,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            physical_reads: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            read_failures: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            ttl_evictions: Arc::new(AtomicU64::new(0)),
            capacity_evictions: Arc::new(AtomicU64::new(0)),
            units_run: Arc::new(AtomicU64::new(0)),
            units_failed: Arc::new(AtomicU64::new(0)),
            snippets_written: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a read that reached the file source
    pub fn record_read(&self, bytes: u64) {
        self.physical_reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a cache lookup
    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ttl_evictions(&self, count: u64) {
        self.ttl_evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_capacity_eviction(&self) {
        self.capacity_evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the outcome of one (file, term) unit
    pub fn record_unit(&self, failed: bool) {
        self.units_run.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.units_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_snippets(&self, count: u64) {
        self.snippets_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn physical_reads(&self) -> u64 {
        self.physical_reads.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn get_stats(&self) -> ScanStats {
        ScanStats {
            physical_reads: self.physical_reads.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            ttl_evictions: self.ttl_evictions.load(Ordering::Relaxed),
            capacity_evictions: self.capacity_evictions.load(Ordering::Relaxed),
            units_run: self.units_run.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            snippets_written: self.snippets_written.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Scan stats:\n\
             Physical reads: {} ({} bytes, {} failed)\n\
             Cache hits/misses: {}/{}\n\
             Evictions (ttl/capacity): {}/{}\n\
             Units run/failed: {}/{}\n\
             Snippets written: {}",
            stats.physical_reads,
            stats.bytes_read,
            stats.read_failures,
            stats.cache_hits,
            stats.cache_misses,
            stats.ttl_evictions,
            stats.capacity_evictions,
            stats.units_run,
            stats.units_failed,
            stats.snippets_written
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`ScanMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub physical_reads: u64,
    pub bytes_read: u64,
    pub read_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub ttl_evictions: u64,
    pub capacity_evictions: u64,
    pub units_run: u64,
    pub units_failed: u64,
    pub snippets_written: u64,
}
