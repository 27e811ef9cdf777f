pub mod batch;
pub mod cache;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod results;
pub mod search;

pub use batch::{load_terms, parse_terms, partition_terms, BatchWorker};
pub use config::{EncodingMode, ScanConfig, ScanOverrides, TermMode};
pub use errors::{ScanError, ScanResult};
pub use orchestrator::{ensure_process_support, Orchestrator, RunSummary, WorkerCommand};
pub use results::{BatchReport, MatchSnippet, ShardReport};
