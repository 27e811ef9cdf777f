use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for scan operations
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors that can occur while scanning a corpus
///
/// The variants fall into two groups. Per-file and per-term failures
/// (`FileNotFound`, `PermissionDenied`, `EncodingError`, `InvalidPattern`,
/// `OutputWrite`, `UnencodableOutput`) are contained by the unit that hit them. Everything else
/// touches shared infrastructure and aborts the run.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Cannot decode {path} as {encoding}")]
    EncodingError { path: PathBuf, encoding: String },
    #[error("Unknown encoding label: {0}")]
    UnknownEncoding(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid term: {0}")]
    InvalidTerm(String),
    #[error("Failed to write {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Cannot write {path} as {encoding}: unmappable characters")]
    UnencodableOutput { path: PathBuf, encoding: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),
    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] serde_yaml::Error),
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
    #[error("Failed to launch worker {index}: {source}")]
    WorkerSpawn {
        index: usize,
        source: std::io::Error,
    },
    #[error("Worker {index} exited unsuccessfully: {status}")]
    WorkerFailed { index: usize, status: String },
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ScanError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, encoding: impl Into<String>) -> Self {
        Self::EncodingError {
            path: path.into(),
            encoding: encoding.into(),
        }
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn invalid_term(term: impl Into<String>) -> Self {
        Self::InvalidTerm(term.into())
    }

    pub fn output_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source,
        }
    }

    pub fn unencodable_output(path: impl Into<PathBuf>, encoding: impl Into<String>) -> Self {
        Self::UnencodableOutput {
            path: path.into(),
            encoding: encoding.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn unsupported_platform(msg: impl Into<String>) -> Self {
        Self::UnsupportedPlatform(msg.into())
    }

    /// Maps an I/O error on a corpus file to the matching "unavailable" variant
    pub fn from_read_error(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// True for failures that only make one corpus file unreadable
    pub fn is_file_unavailable(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_)
                | Self::PermissionDenied(_)
                | Self::EncodingError { .. }
                | Self::IoError(_)
        )
    }
}
