// ABOUTME: Public library API for pixseek image similarity search
// ABOUTME: Re-exports core modules for external use

pub mod cli;
pub mod embeddings;
pub mod error;
pub mod model;
pub mod search;
pub mod storage;
pub mod util;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use embeddings::{EmbeddingCache, EmbeddingModel, QueryEncoder};
pub use error::{Error, Result};
pub use model::{JobSnapshot, JobStatus, LastSearch, ScoredResult, SearchKind, SearchRequest};
pub use search::{SearchConfig, SearchOrchestrator};
