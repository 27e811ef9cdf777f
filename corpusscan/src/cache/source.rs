use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::ops::Deref;
use std::path::Path;
use tracing::{trace, warn};

use crate::errors::{ScanError, ScanResult};

const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Raw bytes of a corpus file, either owned or memory mapped
pub enum FileBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Owned(bytes) => bytes,
            FileBytes::Mapped(mmap) => mmap,
        }
    }
}

impl From<Vec<u8>> for FileBytes {
    fn from(bytes: Vec<u8>) -> Self {
        FileBytes::Owned(bytes)
    }
}

/// Where the content cache gets file bytes from on a miss
pub trait FileSource: Send + Sync {
    fn read(&self, path: &Path) -> ScanResult<FileBytes>;
}

/// Reads corpus files from the local filesystem.
///
/// Small files are read in one call, mid-sized files through a buffered
/// reader and large files are memory mapped.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl FsSource {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> ScanResult<File> {
        File::open(path).map_err(|e| ScanError::from_read_error(path, e))
    }

    fn read_small(path: &Path) -> ScanResult<FileBytes> {
        std::fs::read(path)
            .map(FileBytes::Owned)
            .map_err(|e| ScanError::from_read_error(path, e))
    }

    fn read_buffered(path: &Path) -> ScanResult<FileBytes> {
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, Self::open(path)?);
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ScanError::from_read_error(path, e))?;
        Ok(FileBytes::Owned(bytes))
    }

    fn read_mapped(path: &Path) -> ScanResult<FileBytes> {
        let file = Self::open(path)?;
        // Corpus files are treated as read-only for the duration of a run
        let mmap = unsafe { Mmap::map(&file) }.map_err(ScanError::IoError)?;
        Ok(FileBytes::Mapped(mmap))
    }
}

impl FileSource for FsSource {
    fn read(&self, path: &Path) -> ScanResult<FileBytes> {
        match path.metadata() {
            Ok(metadata) => {
                let size = metadata.len();
                trace!("Reading {} ({} bytes)", path.display(), size);
                if size < SMALL_FILE_THRESHOLD {
                    Self::read_small(path)
                } else if size >= LARGE_FILE_THRESHOLD {
                    Self::read_mapped(path)
                } else {
                    Self::read_buffered(path)
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ScanError::file_not_found(path))
            }
            Err(e) => {
                warn!("Failed to get metadata for {}: {}", path.display(), e);
                Self::read_buffered(path)
            }
        }
    }
}
