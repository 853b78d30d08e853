// ABOUTME: Serde data models for search requests, results, and job snapshots
// ABOUTME: Request validation turns the loose wire shape into a typed Query

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Unit-length embedding vector. Shared, never mutated after creation.
pub type Embedding = Arc<[f32]>;

pub const DEFAULT_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Image,
    Text,
}

impl FromStr for SearchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(SearchKind::Image),
            "text" => Ok(SearchKind::Text),
            other => Err(Error::Validation(format!(
                "unknown search kind '{}', expected 'image' or 'text'",
                other
            ))),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub folder: PathBuf,
    #[serde(default)]
    pub min_score: f32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    pub kind: SearchKind,
    #[serde(default)]
    pub query_image: Option<PathBuf>,
    #[serde(default)]
    pub query_text: Option<String>,
}

impl SearchRequest {
    pub fn image(folder: impl Into<PathBuf>, query_image: impl Into<PathBuf>) -> Self {
        SearchRequest {
            folder: folder.into(),
            min_score: 0.0,
            batch_size: DEFAULT_BATCH_SIZE,
            kind: SearchKind::Image,
            query_image: Some(query_image.into()),
            query_text: None,
        }
    }

    pub fn text(folder: impl Into<PathBuf>, query_text: impl Into<String>) -> Self {
        SearchRequest {
            folder: folder.into(),
            min_score: 0.0,
            batch_size: DEFAULT_BATCH_SIZE,
            kind: SearchKind::Text,
            query_image: None,
            query_text: Some(query_text.into()),
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Checks parameters and the kind/field pairing without touching the filesystem.
    pub fn validate(&self) -> Result<Query> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(Error::Validation(format!(
                "min_score must be within [0, 1], got {}",
                self.min_score
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Validation("batch_size must be at least 1".into()));
        }

        match (self.kind, &self.query_image, &self.query_text) {
            (_, Some(_), Some(_)) => Err(Error::Validation(
                "provide either query_image or query_text, not both".into(),
            )),
            (SearchKind::Image, Some(path), None) => Ok(Query::Image(path.clone())),
            (SearchKind::Image, None, _) => Err(Error::Validation(
                "query_image is required for an image search".into(),
            )),
            (SearchKind::Text, None, Some(text)) if !text.trim().is_empty() => {
                Ok(Query::Text(text.trim().to_string()))
            }
            (SearchKind::Text, _, _) => Err(Error::Validation(
                "query_text is required for a text search".into(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Image(PathBuf),
    Text(String),
}

impl Query {
    pub fn kind(&self) -> SearchKind {
        match self {
            Query::Image(_) => SearchKind::Image,
            Query::Text(_) => SearchKind::Text,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Query::Image(path) => path.display().to_string(),
            Query::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenScore {
    pub token: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub path: PathBuf,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<TokenScore>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub aspect_ratio: Option<f32>,
}

impl ScoredResult {
    pub fn new(path: PathBuf, score: f32) -> Self {
        ScoredResult {
            path,
            score,
            description: None,
            tokens: Vec::new(),
            width: None,
            height: None,
            aspect_ratio: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self.aspect_ratio = (height > 0).then(|| width as f32 / height as f32);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Initializing,
    ScanningFolder,
    ProcessingBatches,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Initializing => "Initializing",
            JobStatus::ScanningFolder => "Scanning folder",
            JobStatus::ProcessingBatches => "Processing batches",
            JobStatus::Complete => "Complete",
            JobStatus::Failed => "Failed",
        }
    }
}

/// Point-in-time view of a job as handed to pollers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub processed: usize,
    pub total: usize,
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ScoredResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl JobSnapshot {
    /// Results of a finished job, or the failure that ended it with its original exit code.
    pub fn into_results(self) -> Result<Vec<ScoredResult>> {
        match self.status {
            JobStatus::Complete => Ok(self.results.unwrap_or_default()),
            _ => Err(Error::JobFailed {
                code: self.error_code.unwrap_or(1),
                message: self.error.unwrap_or_else(|| self.message.clone()),
            }),
        }
    }
}

/// Settings record restored at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastSearch {
    pub kind: SearchKind,
    pub query: String,
    pub folder: PathBuf,
    #[serde(default)]
    pub results: Vec<ScoredResult>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_kind_parse() {
        assert_eq!("image".parse::<SearchKind>().unwrap(), SearchKind::Image);
        assert_eq!(" Text ".parse::<SearchKind>().unwrap(), SearchKind::Text);
        assert!(matches!(
            "video".parse::<SearchKind>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_failed_snapshot_keeps_error_code() {
        let json = r#"{"job_id": "j", "status": "failed", "progress": 40, "message": "Failed",
            "processed": 3, "total": 9, "complete": false,
            "error": "Folder not found: /photos", "error_code": 3,
            "created_at": "2026-01-01T00:00:00Z"}"#;
        let snap: JobSnapshot = serde_json::from_str(json).unwrap();
        let err = snap.into_results().unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("Folder not found"));
    }

    #[test]
    fn test_search_request_deserialize_defaults() {
        let json = r#"{"folder": "/photos", "kind": "text", "query_text": "red car"}"#;
        let req: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.min_score, 0.0);
        assert_eq!(req.batch_size, 32);
        assert_eq!(req.validate().unwrap(), Query::Text("red car".into()));
    }

    #[test]
    fn test_search_request_rejects_unknown_kind() {
        let json = r#"{"folder": "/photos", "kind": "audio", "query_text": "x"}"#;
        assert!(serde_json::from_str::<SearchRequest>(json).is_err());
    }
}
