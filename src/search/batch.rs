// ABOUTME: Concurrent per-batch embedding resolution with a fixed worker budget
// ABOUTME: Keeps discovery order and silently drops files that fail to embed

use crate::{embeddings::EmbeddingCache, model::Embedding, Error, Result};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: PathBuf,
    pub embedding: Embedding,
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Clone)]
pub struct BatchProcessor {
    cache: Arc<EmbeddingCache>,
    workers: usize,
}

impl BatchProcessor {
    pub fn new(cache: Arc<EmbeddingCache>, workers: usize) -> Self {
        BatchProcessor {
            cache,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Resolves every path and returns once all of them have settled.
    ///
    /// At most `workers` decodes/encodes are in flight. Output order follows
    /// input order. The only error is a worker that panicked.
    pub async fn process(&self, paths: Vec<PathBuf>) -> Result<Vec<Candidate>> {
        let outcomes: Vec<Result<Option<Candidate>>> = stream::iter(paths)
            .map(|path| {
                let cache = self.cache.clone();
                async move {
                    tokio::task::spawn_blocking(move || {
                        let embedding = cache.get_or_compute(&path)?;
                        let dimensions = image::image_dimensions(&path).ok();
                        Some(Candidate {
                            path,
                            embedding,
                            dimensions,
                        })
                    })
                    .await
                    .map_err(|e| Error::Embedding(format!("encode worker failed: {}", e)))
                }
            })
            .buffered(self.workers)
            .collect()
            .await;

        outcomes
            .into_iter()
            .filter_map(|outcome| outcome.transpose())
            .collect()
    }
}
