//! The scanning engine: term matching, context windows and the per-shard
//! fan-out of (file, term) units over a bounded thread pool.
pub mod engine;
pub mod matcher;
pub mod scanner;
pub mod window;

pub use engine::MatchEngine;
pub use matcher::{MatchStrategy, TermMatcher};
pub use scanner::ShardScanner;
pub use window::{extract, extract_in_line, line_bounds};
