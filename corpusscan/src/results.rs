use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of the provenance tag written before every snippet
pub const SOURCE_TAG: &str = "【来源: ";

/// One context window around one match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSnippet {
    /// The query term that matched
    pub term: Arc<str>,
    /// Path of the matched file relative to its corpus root
    pub provenance: PathBuf,
    /// Context window with the match bracketed
    pub text: String,
}

impl MatchSnippet {
    /// Formats the snippet as one result-file line, terminated by exactly one `\n`
    pub fn to_output_line(&self) -> String {
        let text = self.text.trim_end_matches(&['\r', '\n'][..]);
        format!("{}{}】{}\n", SOURCE_TAG, self.provenance.display(), text)
    }
}

/// Outcome of scanning one term batch against one shard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardReport {
    pub shard: String,
    pub files: usize,
    pub units: usize,
    pub failed_units: usize,
    pub snippets: usize,
}

/// Outcome of one batch worker
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub terms: usize,
    pub shards: Vec<ShardReport>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn add_shard(&mut self, report: ShardReport) {
        self.shards.push(report);
    }

    pub fn total_snippets(&self) -> usize {
        self.shards.iter().map(|s| s.snippets).sum()
    }

    pub fn total_units(&self) -> usize {
        self.shards.iter().map(|s| s.units).sum()
    }

    pub fn failed_units(&self) -> usize {
        self.shards.iter().map(|s| s.failed_units).sum()
    }
}
