use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{ScanError, ScanResult};

/// How bytes that do not decode in the corpus encoding are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Treat the file as unavailable
    FailFast,
    /// Drop the offending bytes and keep going
    #[default]
    Lossy,
}

/// How a query term is turned into a search pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermMode {
    /// Terms match literally; metacharacters have no special meaning
    #[default]
    Literal,
    /// Terms are regular expressions
    Regex,
}

/// Configuration for a corpus scan.
///
/// # Configuration Locations
///
/// Values are merged from, in order of increasing precedence:
/// 1. Global `$CONFIG_DIR/corpusscan/config.yaml`
/// 2. Local `.corpusscan.yaml` in the current directory
/// 3. A file passed with `--config`
///
/// Every field has a default, so an empty file (or no file) is valid.
///
/// ```yaml
/// classical_root: "corpus/gudai"
/// modern_root: "corpus/xiandai"
/// modern_eras: ["1990s", "2000s"]
/// output_dir: "query_result"
/// corpus_encoding: "gb18030"
/// context_window: 50
/// batch_count: 8
/// term_mode: literal
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Root of the classical-era corpus, scanned as a single shard
    pub classical_root: PathBuf,

    /// Root of the modern-era corpus; each era below it is its own shard
    pub modern_root: PathBuf,

    /// Era sub-directories of `modern_root`, scanned in this order
    pub modern_eras: Vec<String>,

    /// Directory receiving one `<term>.txt` per query term
    pub output_dir: PathBuf,

    /// Line-delimited query term list
    pub terms_file: PathBuf,

    /// Encoding label of the corpus documents
    pub corpus_encoding: String,

    /// Encoding label of the term list
    pub term_encoding: String,

    /// Encoding label of the result files
    pub output_encoding: String,

    pub encoding_mode: EncodingMode,

    /// Corpus file extensions to include
    pub file_extensions: Vec<String>,

    /// Glob patterns of corpus paths to skip
    pub ignore_patterns: Vec<String>,

    /// Characters of context kept on each side of a match
    pub context_window: usize,

    /// Files handed to the worker pool per round
    pub file_group_size: NonZeroUsize,

    /// Maximum number of files resident in a shard's content cache
    pub cache_capacity: NonZeroUsize,

    /// Idle seconds before a cached file may be evicted
    pub cache_ttl_secs: u64,

    /// Worker threads per shard scan
    pub max_workers: NonZeroUsize,

    /// Number of worker processes the term list is split across
    pub batch_count: NonZeroUsize,

    /// Terms scanned together against one shard inside a worker.
    ///
    /// Each chunk is a separate pass over every shard with a fresh content
    /// cache, so a file is read once per chunk, not once per batch. Set this
    /// at least as large as a batch to read each file only once.
    pub term_chunk_size: NonZeroUsize,

    pub term_mode: TermMode,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

const DEFAULT_ERAS: &[&str] = &[
    "1900s", "1910s", "1920s", "1930s", "1940s", "1950s", "1960s", "1970s", "1980s", "1990s",
    "2000s", "2010s", "2020s", "CWAC",
];

fn nonzero(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            classical_root: PathBuf::from("corpus/gudai"),
            modern_root: PathBuf::from("corpus/xiandai"),
            modern_eras: DEFAULT_ERAS.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from("query_result"),
            terms_file: PathBuf::from("terms.txt"),
            corpus_encoding: "gb18030".to_string(),
            term_encoding: "utf-8".to_string(),
            output_encoding: "utf-8".to_string(),
            encoding_mode: EncodingMode::default(),
            file_extensions: vec!["txt".to_string()],
            ignore_patterns: Vec::new(),
            context_window: 50,
            file_group_size: nonzero(100),
            cache_capacity: nonzero(1000),
            cache_ttl_secs: 300,
            max_workers: nonzero(num_cpus::get()),
            batch_count: nonzero(8),
            term_chunk_size: nonzero(100),
            term_mode: TermMode::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Command-line values that take precedence over the configuration files
#[derive(Debug, Clone, Default)]
pub struct ScanOverrides {
    pub terms_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub classical_root: Option<PathBuf>,
    pub modern_root: Option<PathBuf>,
    pub context_window: Option<usize>,
    pub max_workers: Option<NonZeroUsize>,
    pub batch_count: Option<NonZeroUsize>,
    pub term_mode: Option<TermMode>,
    pub log_level: Option<String>,
}

impl ScanConfig {
    /// Loads configuration, layering an optional explicit file on top
    pub fn load_from(config_path: Option<&Path>) -> ScanResult<Self> {
        let mut builder = ConfigBuilder::builder();

        let defaults = [
            dirs::config_dir().map(|p| p.join("corpusscan/config.yaml")),
            Some(PathBuf::from(".corpusscan.yaml")),
        ];
        for path in defaults.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the effective configuration as YAML, for handing to a worker
    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Merges command-line overrides into the file values
    pub fn merge_with_cli(mut self, cli: ScanOverrides) -> Self {
        if let Some(terms_file) = cli.terms_file {
            self.terms_file = terms_file;
        }
        if let Some(output_dir) = cli.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(root) = cli.classical_root {
            self.classical_root = root;
        }
        if let Some(root) = cli.modern_root {
            self.modern_root = root;
        }
        if let Some(window) = cli.context_window {
            self.context_window = window;
        }
        if let Some(workers) = cli.max_workers {
            self.max_workers = workers;
        }
        if let Some(batches) = cli.batch_count {
            self.batch_count = batches;
        }
        if let Some(mode) = cli.term_mode {
            self.term_mode = mode;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    /// Checks values that serde cannot
    pub fn validate(&self) -> ScanResult<()> {
        for label in [
            &self.corpus_encoding,
            &self.term_encoding,
            &self.output_encoding,
        ] {
            resolve_encoding(label)?;
        }
        if self.file_extensions.is_empty() {
            return Err(ScanError::config_error(
                "file_extensions must name at least one suffix",
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Looks up an encoding by its WHATWG label (e.g. "gb18030", "utf-8")
pub fn resolve_encoding(label: &str) -> ScanResult<&'static encoding_rs::Encoding> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ScanError::UnknownEncoding(label.to_string()))
}
