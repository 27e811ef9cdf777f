//! Per-term result files.
//!
//! Every append opens the term's file, writes, and closes it again. Appends
//! to the same term from concurrent units are serialized through a per-term
//! lock, so lines never interleave within a process. Term batches are
//! disjoint, which means no two worker processes ever write the same file.
use dashmap::DashMap;
use encoding_rs::Encoding;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{ScanError, ScanResult};
use crate::metrics::ScanMetrics;
use crate::results::MatchSnippet;

/// Extension of every result file
pub const OUTPUT_EXTENSION: &str = "txt";

/// Appends provenance-tagged snippets to `<output_dir>/<term>.txt`
pub struct OutputSink {
    output_dir: PathBuf,
    encoding: &'static Encoding,
    locks: DashMap<Arc<str>, Arc<Mutex<()>>>,
    metrics: ScanMetrics,
}

impl OutputSink {
    pub fn new(output_dir: impl Into<PathBuf>, encoding: &'static Encoding, metrics: ScanMetrics) -> Self {
        Self {
            output_dir: output_dir.into(),
            encoding,
            locks: DashMap::new(),
            metrics,
        }
    }

    /// Path of the result file for `term`
    pub fn path_for(&self, term: &str) -> PathBuf {
        self.output_dir.join(format!("{}.{}", term, OUTPUT_EXTENSION))
    }

    fn lock_for(&self, term: &Arc<str>) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(Arc::clone(term)).or_default().value())
    }

    /// Appends one snippet
    pub fn append(&self, snippet: &MatchSnippet) -> ScanResult<()> {
        self.append_all(std::slice::from_ref(snippet))
    }

    /// Appends the snippets of one unit in order, with a single open of the
    /// term's file. All snippets must belong to the same term.
    pub fn append_all(&self, snippets: &[MatchSnippet]) -> ScanResult<()> {
        let Some(first) = snippets.first() else {
            return Ok(());
        };
        debug_assert!(snippets.iter().all(|s| s.term == first.term));

        let mut body = String::new();
        for snippet in snippets {
            body.push_str(&snippet.to_output_line());
        }
        let path = self.path_for(&first.term);
        let (bytes, _, unmappable) = self.encoding.encode(&body);
        if unmappable {
            return Err(ScanError::unencodable_output(&path, self.encoding.name()));
        }

        let lock = self.lock_for(&first.term);
        let _guard = lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScanError::output_write(&path, e))?;
        file.write_all(&bytes)
            .map_err(|e| ScanError::output_write(&path, e))?;

        self.metrics.record_snippets(snippets.len() as u64);
        info!(
            "Found {} x \"{}\" in {}",
            snippets.len(),
            first.term,
            first.provenance.display()
        );
        Ok(())
    }
}

/// Removes result files left by a previous run and makes sure the
/// directory exists. Returns how many files were removed.
pub fn reset_output_dir(dir: &Path) -> ScanResult<usize> {
    std::fs::create_dir_all(dir)?;
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_result = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION));
        if is_result {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    debug!("Removed {} previous result files from {}", removed, dir.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn snippet(term: &str, provenance: &str, text: &str) -> MatchSnippet {
        MatchSnippet {
            term: Arc::from(term),
            provenance: PathBuf::from(provenance),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_appends_create_and_accumulate() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), encoding_rs::UTF_8, ScanMetrics::new());

        sink.append(&snippet("春天", "a.txt", "昨日【春天】来了")).unwrap();
        sink.append(&snippet("春天", "b.txt", "【春天】")).unwrap();

        let content = std::fs::read_to_string(dir.path().join("春天.txt")).unwrap();
        assert_eq!(
            content,
            "【来源: a.txt】昨日【春天】来了\n【来源: b.txt】【春天】\n"
        );
    }

    #[test]
    fn test_no_file_without_snippets() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), encoding_rs::UTF_8, ScanMetrics::new());
        sink.append_all(&[]).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_output_encoding() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), encoding_rs::GB18030, ScanMetrics::new());
        sink.append(&snippet("春天", "a.txt", "【春天】")).unwrap();

        let bytes = std::fs::read(dir.path().join("春天.txt")).unwrap();
        let (text, _, had_errors) = encoding_rs::GB18030.decode(&bytes);
        assert!(!had_errors);
        assert_eq!(text, "【来源: a.txt】【春天】\n");
    }

    #[test]
    fn test_unmappable_characters_fail_the_append() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), encoding_rs::BIG5, ScanMetrics::new());

        let err = sink.append(&snippet("t", "a.txt", "【😀】")).unwrap_err();
        assert!(matches!(err, ScanError::UnencodableOutput { .. }));
        assert!(!dir.path().join("t.txt").exists());
    }

    #[test]
    fn test_concurrent_appends_keep_whole_lines() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::new(dir.path(), encoding_rs::UTF_8, ScanMetrics::new());
        let long = "字".repeat(2000);

        std::thread::scope(|s| {
            for i in 0..8 {
                let sink = &sink;
                let long = &long;
                s.spawn(move || {
                    let snippets: Vec<_> = (0..20)
                        .map(|j| snippet("t", &format!("f{}_{}.txt", i, j), long))
                        .collect();
                    sink.append_all(&snippets).unwrap();
                });
            }
        });

        let content = std::fs::read_to_string(dir.path().join("t.txt")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 160);
        assert!(lines.iter().all(|l| l.starts_with("【来源: f") && l.ends_with(long.as_str())));
    }

    #[test]
    fn test_unwritable_output_dir() {
        let dir = tempdir().unwrap();
        let sink = OutputSink::new(dir.path().join("missing"), encoding_rs::UTF_8, ScanMetrics::new());
        let err = sink.append(&snippet("t", "a.txt", "【t】")).unwrap_err();
        assert!(matches!(err, ScanError::OutputWrite { .. }));
    }

    #[test]
    fn test_reset_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("old.txt"), "x").unwrap();
        std::fs::write(out.join("keep.json"), "{}").unwrap();

        assert_eq!(reset_output_dir(&out).unwrap(), 1);
        assert!(!out.join("old.txt").exists());
        assert!(out.join("keep.json").exists());

        let fresh = dir.path().join("fresh");
        assert_eq!(reset_output_dir(&fresh).unwrap(), 0);
        assert!(fresh.is_dir());
    }
}
