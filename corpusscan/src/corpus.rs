//! Corpus layout: which directories are scanned, and which files they contain.
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::filters::should_include_file;

/// One independently scanned directory of corpus files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusShard {
    /// Human-readable name used in logs and reports
    pub label: String,
    /// Directory walked for files
    pub root: PathBuf,
    /// Directory provenance paths are made relative to
    pub corpus_root: PathBuf,
}

impl CorpusShard {
    /// A shard whose provenance is relative to its own root
    pub fn new(label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            label: label.into(),
            corpus_root: root.clone(),
            root,
        }
    }

    /// A sub-directory shard whose provenance keeps the sub-directory name
    pub fn nested(label: impl Into<String>, corpus_root: impl Into<PathBuf>, sub_path: &str) -> Self {
        let corpus_root = corpus_root.into();
        Self {
            label: label.into(),
            root: corpus_root.join(sub_path),
            corpus_root,
        }
    }

    /// Lists the corpus files under this shard, sorted by path.
    ///
    /// A missing root yields no files.
    pub fn discover(&self, extensions: &[String], ignore_patterns: &[String]) -> Vec<CorpusFile> {
        if !self.root.is_dir() {
            warn!(
                "Shard {} root {} is not a directory, skipping",
                self.label,
                self.root.display()
            );
            return Vec::new();
        }

        let mut walker = WalkBuilder::new(&self.root);
        walker.standard_filters(false).follow_links(false);

        let mut files: Vec<CorpusFile> = walker
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.label, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(|entry| {
                let path = entry.into_path();
                let relative = path.strip_prefix(&self.root).ok()?.to_path_buf();
                if !should_include_file(&path, &relative, extensions, ignore_patterns) {
                    return None;
                }
                CorpusFile::new(path, &self.corpus_root)
            })
            .collect();

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Shard {}: {} files", self.label, files.len());
        files
    }
}

/// A corpus document and its path relative to the corpus root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub provenance: PathBuf,
}

impl CorpusFile {
    /// Returns `None` when `path` does not live under `corpus_root`
    pub fn new(path: PathBuf, corpus_root: &Path) -> Option<Self> {
        let provenance = path.strip_prefix(corpus_root).ok()?.to_path_buf();
        Some(Self { path, provenance })
    }
}

/// The shards of a configured corpus in scan order: the classical root
/// first, then each modern era in its configured order
pub fn shards_for(config: &ScanConfig) -> Vec<CorpusShard> {
    std::iter::once(CorpusShard::new("classical", &config.classical_root))
        .chain(
            config
                .modern_eras
                .iter()
                .map(|era| CorpusShard::nested(era.as_str(), &config.modern_root, era)),
        )
        .collect()
}
