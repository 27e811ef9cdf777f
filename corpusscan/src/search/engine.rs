use tracing::{error, warn};

use super::matcher::TermMatcher;
use super::window::extract;
use crate::cache::FileContentCache;
use crate::corpus::CorpusFile;
use crate::results::MatchSnippet;

/// Finds one term in one corpus file, reading through the shared cache
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine {
    window: usize,
}

impl MatchEngine {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Returns a snippet per occurrence of the term, in document order.
    ///
    /// Each line is searched on its own, so snippets never span lines. An
    /// unreadable file is logged and produces no snippets.
    pub fn scan(
        &self,
        matcher: &TermMatcher,
        file: &CorpusFile,
        cache: &FileContentCache,
    ) -> Vec<MatchSnippet> {
        let lines = match cache.get(&file.path) {
            Ok(lines) => lines,
            Err(e) if e.is_file_unavailable() => {
                warn!("Skipping {}: {}", file.provenance.display(), e);
                return Vec::new();
            }
            Err(e) => {
                error!("Failed to load {}: {}", file.provenance.display(), e);
                return Vec::new();
            }
        };

        let mut snippets = Vec::new();
        for line in lines.iter() {
            for (start, end) in matcher.find_matches(line) {
                snippets.push(MatchSnippet {
                    term: matcher.term().clone(),
                    provenance: file.provenance.clone(),
                    text: extract(line, start, end, self.window, 0, line.len()),
                });
            }
        }
        snippets
    }
}
