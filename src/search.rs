// ABOUTME: Folder search pipeline: batching, ranking, explanations, and job tracking
// ABOUTME: Everything here runs on tokio; model calls go through the blocking pool

pub mod batch;
pub mod describe;
pub mod job;
pub mod progress;
pub mod rank;
pub mod tokens;

pub use batch::{BatchProcessor, Candidate, DEFAULT_WORKERS};
pub use describe::ContentDescriber;
pub use job::{scan_folder, SearchConfig, SearchOrchestrator};
pub use progress::{JobUpdate, ProgressStore};
pub use rank::{rank, sort_results};
pub use tokens::{tokenize, TokenRelevanceAnalyzer};
