use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::config::TermMode;
use crate::errors::{ScanError, ScanResult};

/// Compiled regexes, shared across every shard scan in the process
static REGEX_CACHE: Lazy<DashMap<String, Arc<Regex>>> = Lazy::new(DashMap::new);

/// Strategy for finding one term
#[derive(Debug, Clone)]
pub enum MatchStrategy {
    Literal(String),
    Regex(Arc<Regex>),
}

/// Finds the occurrences of a single query term in a line of text
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: Arc<str>,
    strategy: MatchStrategy,
}

impl TermMatcher {
    /// Compiles `term` according to `mode`.
    ///
    /// In literal mode the term is matched byte-for-byte, so characters such
    /// as `.` or `(` have no special meaning. In regex mode an invalid pattern
    /// is reported as [`ScanError::InvalidPattern`].
    pub fn new(term: &str, mode: TermMode) -> ScanResult<Self> {
        if term.is_empty() {
            return Err(ScanError::invalid_term("empty term"));
        }
        let strategy = match mode {
            TermMode::Literal => MatchStrategy::Literal(term.to_string()),
            TermMode::Regex => MatchStrategy::Regex(Self::compile(term)?),
        };
        Ok(Self {
            term: Arc::from(term),
            strategy,
        })
    }

    fn compile(pattern: &str) -> ScanResult<Arc<Regex>> {
        if let Some(entry) = REGEX_CACHE.get(pattern) {
            return Ok(Arc::clone(entry.value()));
        }
        let regex = Regex::new(pattern)
            .map(Arc::new)
            .map_err(|e| ScanError::invalid_pattern(format!("{}: {}", pattern, e)))?;
        REGEX_CACHE.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    pub fn term(&self) -> &Arc<str> {
        &self.term
    }

    /// Byte spans of every non-overlapping occurrence, left to right.
    /// Zero-width regex matches are skipped.
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.strategy {
            MatchStrategy::Literal(needle) => text
                .match_indices(needle.as_str())
                .map(|(start, matched)| (start, start + matched.len()))
                .collect(),
            MatchStrategy::Regex(regex) => regex
                .find_iter(text)
                .filter(|m| m.start() < m.end())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_matching() {
        let matcher = TermMatcher::new("春天", TermMode::Literal).unwrap();
        let text = "春天来了，又是一个春天";
        let matches = matcher.find_matches(text);
        assert_eq!(matches.len(), 2);
        for (s, e) in matches {
            assert_eq!(&text[s..e], "春天");
        }
    }

    #[test]
    fn test_literal_ignores_metacharacters() {
        let matcher = TermMatcher::new("a.c", TermMode::Literal).unwrap();
        assert!(matcher.find_matches("abc").is_empty());
        assert_eq!(matcher.find_matches("xa.cx"), vec![(1, 4)]);
    }

    #[test]
    fn test_non_overlapping() {
        let matcher = TermMatcher::new("aa", TermMode::Literal).unwrap();
        assert_eq!(matcher.find_matches("aaaa"), vec![(0, 2), (2, 4)]);
    }

    #[test]
    fn test_regex_matching() {
        let matcher = TermMatcher::new(r"春.", TermMode::Regex).unwrap();
        let text = "春天和春风";
        let found: Vec<&str> = matcher
            .find_matches(text)
            .into_iter()
            .map(|(s, e)| &text[s..e])
            .collect();
        assert_eq!(found, vec!["春天", "春风"]);
    }

    #[test]
    fn test_zero_width_regex_matches_skipped() {
        let matcher = TermMatcher::new("x*", TermMode::Regex).unwrap();
        assert_eq!(matcher.find_matches("abxxc"), vec![(2, 4)]);
    }

    #[test]
    fn test_invalid_regex() {
        let err = TermMatcher::new("(unclosed", TermMode::Regex).unwrap_err();
        assert!(matches!(err, ScanError::InvalidPattern(_)));
        // The same text is fine as a literal
        assert!(TermMatcher::new("(unclosed", TermMode::Literal).is_ok());
    }

    #[test]
    fn test_empty_term_rejected() {
        assert!(TermMatcher::new("", TermMode::Literal).is_err());
    }
}
