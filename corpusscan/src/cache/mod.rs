//! Bounded file-content cache shared by every (file, term) unit of one shard scan.
//!
//! A shard scan touches each corpus file once per query term. Keeping the
//! decoded lines resident turns those K reads into one. Entries leave the
//! cache when they have been idle for the configured TTL, when room is needed
//! for a new file (least recently accessed first), or when the owning scan
//! calls [`FileContentCache::close_all`].
mod decode;
mod source;

pub use decode::TextDecoder;
pub use source::{FileBytes, FileSource, FsSource};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::ScanConfig;
use crate::errors::ScanResult;
use crate::metrics::ScanMetrics;

/// Decoded lines of one corpus file, shared between the cache and its readers
pub type Lines = Arc<[String]>;

/// Capacity and idle limit of a [`FileContentCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub capacity: NonZeroUsize,
    pub ttl: Duration,
}

impl CacheSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            capacity: config.cache_capacity,
            ttl: config.cache_ttl(),
        }
    }
}

#[derive(Debug)]
struct CachedFile {
    lines: Lines,
    last_access: Instant,
    /// Insertion order, used to break ties between equal access times
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheTable {
    entries: HashMap<PathBuf, CachedFile>,
    next_seq: u64,
}

impl CacheTable {
    /// Drops every entry idle for at least `ttl`, returning how many went
    fn sweep_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) < ttl);
        before - self.entries.len()
    }

    /// Drops the least recently accessed entry
    fn evict_oldest(&mut self) -> Option<PathBuf> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.last_access, entry.seq))
            .map(|(path, _)| path.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

/// Time- and capacity-bounded map from a corpus path to its decoded lines
pub struct FileContentCache {
    source: Arc<dyn FileSource>,
    decoder: TextDecoder,
    settings: CacheSettings,
    metrics: ScanMetrics,
    table: Mutex<CacheTable>,
}

impl FileContentCache {
    pub fn new(
        source: Arc<dyn FileSource>,
        decoder: TextDecoder,
        settings: CacheSettings,
        metrics: ScanMetrics,
    ) -> Self {
        Self {
            source,
            decoder,
            settings,
            metrics,
            table: Mutex::new(CacheTable::default()),
        }
    }

    /// Returns the lines of `path`, reading the file only if it is not resident.
    ///
    /// Expired entries are swept first, then a hit refreshes the entry's
    /// access time. A miss at capacity evicts the least recently accessed entry
    /// before the file is read. Read and decode failures are returned to the
    /// caller and leave nothing behind in the cache.
    pub fn get(&self, path: &Path) -> ScanResult<Lines> {
        self.get_at(path, Instant::now())
    }

    pub(crate) fn get_at(&self, path: &Path, now: Instant) -> ScanResult<Lines> {
        let mut table = self.table.lock();

        let expired = table.sweep_expired(now, self.settings.ttl);
        if expired > 0 {
            debug!("Evicted {} idle files from content cache", expired);
            self.metrics.record_ttl_evictions(expired as u64);
        }

        if let Some(entry) = table.entries.get_mut(path) {
            entry.last_access = now;
            self.metrics.record_cache_lookup(true);
            return Ok(Arc::clone(&entry.lines));
        }
        self.metrics.record_cache_lookup(false);

        if table.entries.len() >= self.settings.capacity.get() {
            if let Some(evicted) = table.evict_oldest() {
                trace!("Evicted {} to make room", evicted.display());
                self.metrics.record_capacity_eviction();
            }
        }

        let lines = match self.load(path) {
            Ok(lines) => lines,
            Err(e) => {
                self.metrics.record_read_failure();
                return Err(e);
            }
        };

        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(
            path.to_path_buf(),
            CachedFile {
                lines: Arc::clone(&lines),
                last_access: now,
                seq,
            },
        );
        Ok(lines)
    }

    fn load(&self, path: &Path) -> ScanResult<Lines> {
        let bytes = self.source.read(path)?;
        self.metrics.record_read(bytes.len() as u64);
        let lines = self.decoder.decode_lines(&bytes, path)?;
        Ok(Lines::from(lines))
    }

    /// Releases every resident entry, returning how many were held
    pub fn close_all(&self) -> usize {
        let mut table = self.table.lock();
        let released = table.entries.len();
        table.entries.clear();
        released
    }

    /// Returns a guard that calls [`close_all`](Self::close_all) when dropped
    pub fn close_on_drop(&self) -> CloseGuard<'_> {
        CloseGuard { cache: self }
    }

    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.table.lock().entries.contains_key(path)
    }
}

/// Empties a [`FileContentCache`] when it goes out of scope, panics included
pub struct CloseGuard<'a> {
    cache: &'a FileContentCache,
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        let released = self.cache.close_all();
        debug!("Closed content cache ({} files released)", released);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::EncodingMode;
    use crate::errors::ScanError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source that counts physical reads per path
    #[derive(Default)]
    pub(crate) struct CountingSource {
        files: HashMap<PathBuf, Vec<u8>>,
        reads: Mutex<HashMap<PathBuf, usize>>,
        total: AtomicUsize,
    }

    impl CountingSource {
        pub(crate) fn with_files(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, c)| (PathBuf::from(p), c.as_bytes().to_vec()))
                    .collect(),
                ..Default::default()
            }
        }

        pub(crate) fn reads_of(&self, path: &str) -> usize {
            self.reads.lock().get(Path::new(path)).copied().unwrap_or(0)
        }

        pub(crate) fn total_reads(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    impl FileSource for CountingSource {
        fn read(&self, path: &Path) -> ScanResult<FileBytes> {
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.reads.lock().entry(path.to_path_buf()).or_default() += 1;
            self.files
                .get(path)
                .cloned()
                .map(FileBytes::from)
                .ok_or_else(|| ScanError::file_not_found(path))
        }
    }

    fn cache_with(
        source: Arc<CountingSource>,
        capacity: usize,
        ttl: Duration,
    ) -> FileContentCache {
        FileContentCache::new(
            source,
            TextDecoder::for_label("utf-8", EncodingMode::Lossy).unwrap(),
            CacheSettings {
                capacity: NonZeroUsize::new(capacity).unwrap(),
                ttl,
            },
            ScanMetrics::new(),
        )
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_repeated_get_reads_once() {
        let source = Arc::new(CountingSource::with_files(&[("a.txt", "one\ntwo\n")]));
        let cache = cache_with(source.clone(), 4, HOUR);

        let first = cache.get(Path::new("a.txt")).unwrap();
        let second = cache.get(Path::new("a.txt")).unwrap();

        assert_eq!(&*first, &["one".to_string(), "two".to_string()]);
        assert_eq!(first, second);
        assert_eq!(source.reads_of("a.txt"), 1);
        assert_eq!(cache.metrics.cache_hits(), 1);
        assert_eq!(cache.metrics.cache_misses(), 1);
    }

    #[test]
    fn test_capacity_evicts_exactly_the_least_recent() {
        let source = Arc::new(CountingSource::with_files(&[
            ("a.txt", "a"),
            ("b.txt", "b"),
            ("c.txt", "c"),
            ("d.txt", "d"),
        ]));
        let cache = cache_with(source.clone(), 3, HOUR);
        let t0 = Instant::now();

        cache.get_at(Path::new("a.txt"), t0).unwrap();
        cache.get_at(Path::new("b.txt"), t0 + Duration::from_secs(1)).unwrap();
        cache.get_at(Path::new("c.txt"), t0 + Duration::from_secs(2)).unwrap();
        // Touch a so that b becomes the least recently accessed
        cache.get_at(Path::new("a.txt"), t0 + Duration::from_secs(3)).unwrap();
        cache.get_at(Path::new("d.txt"), t0 + Duration::from_secs(4)).unwrap();

        assert_eq!(cache.len(), 3);
        assert!(cache.contains(Path::new("a.txt")));
        assert!(!cache.contains(Path::new("b.txt")));
        assert!(cache.contains(Path::new("c.txt")));
        assert!(cache.contains(Path::new("d.txt")));
        assert_eq!(cache.metrics.get_stats().capacity_evictions, 1);
    }

    #[test]
    fn test_capacity_tie_breaks_on_insertion_order() {
        let source = Arc::new(CountingSource::with_files(&[
            ("a.txt", "a"),
            ("b.txt", "b"),
            ("c.txt", "c"),
        ]));
        let cache = cache_with(source, 2, HOUR);
        let t0 = Instant::now();

        cache.get_at(Path::new("a.txt"), t0).unwrap();
        cache.get_at(Path::new("b.txt"), t0).unwrap();
        cache.get_at(Path::new("c.txt"), t0).unwrap();

        assert!(!cache.contains(Path::new("a.txt")));
        assert!(cache.contains(Path::new("b.txt")));
        assert!(cache.contains(Path::new("c.txt")));
    }

    #[test]
    fn test_ttl_expiry_on_any_get() {
        let source = Arc::new(CountingSource::with_files(&[("a.txt", "a"), ("b.txt", "b")]));
        let ttl = Duration::from_secs(300);
        let cache = cache_with(source.clone(), 10, ttl);
        let t0 = Instant::now();

        cache.get_at(Path::new("a.txt"), t0).unwrap();
        // Still within the idle limit
        cache.get_at(Path::new("b.txt"), t0 + ttl - Duration::from_secs(1)).unwrap();
        assert!(cache.contains(Path::new("a.txt")));

        // A lookup for another path at T + ttl sweeps a
        cache.get_at(Path::new("b.txt"), t0 + ttl).unwrap();
        assert!(!cache.contains(Path::new("a.txt")));
        assert!(cache.contains(Path::new("b.txt")));

        cache.get_at(Path::new("a.txt"), t0 + ttl).unwrap();
        assert_eq!(source.reads_of("a.txt"), 2);
        assert_eq!(cache.metrics.get_stats().ttl_evictions, 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let source = Arc::new(CountingSource::with_files(&[]));
        let cache = cache_with(source.clone(), 4, HOUR);

        assert!(cache.get(Path::new("missing.txt")).is_err());
        assert!(cache.get(Path::new("missing.txt")).is_err());
        assert_eq!(source.reads_of("missing.txt"), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.metrics.get_stats().read_failures, 2);
    }

    #[test]
    fn test_close_all_and_guard() {
        let source = Arc::new(CountingSource::with_files(&[("a.txt", "a"), ("b.txt", "b")]));
        let cache = cache_with(source, 4, HOUR);
        cache.get(Path::new("a.txt")).unwrap();
        cache.get(Path::new("b.txt")).unwrap();
        assert_eq!(cache.close_all(), 2);
        assert!(cache.is_empty());

        cache.get(Path::new("a.txt")).unwrap();
        {
            let _guard = cache.close_on_drop();
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_gets_share_one_read() {
        let source = Arc::new(CountingSource::with_files(&[("shared.txt", "x\ny\n")]));
        let cache = cache_with(source.clone(), 4, HOUR);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let lines = cache.get(Path::new("shared.txt")).unwrap();
                    assert_eq!(lines.len(), 2);
                });
            }
        });

        assert_eq!(source.total_reads(), 1);
    }
}
