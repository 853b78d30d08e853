// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Separates request rejections from model, job, and filesystem failures

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Query embedding failed: {0}")]
    Query(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Job not found (expired or unknown): {0}")]
    JobNotFound(String),

    /// A background job ended in `Failed`; `code` is the exit code of the error that stopped it.
    #[error("Search failed: {message}")]
    JobFailed { code: i32, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) => 2,
            Error::FolderNotFound(_) => 3,
            Error::Query(_) => 4,
            Error::Embedding(_) => 5,
            Error::JobNotFound(_) => 6,
            Error::JobFailed { code, .. } => *code,
            Error::Network(_) => 7,
            Error::Parse(_) => 8,
            Error::Filesystem(_) => 9,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
