// ABOUTME: Embedding cache keyed by file path and modification time
// ABOUTME: Keeps only the newest version per path so edited files never leak stale vectors

use super::{unit_embedding, EmbeddingModel};
use crate::{model::Embedding, Error, Result};
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

struct CacheEntry {
    modified: SystemTime,
    vector: Embedding,
}

pub struct EmbeddingCache {
    model: Arc<dyn EmbeddingModel>,
    entries: DashMap<PathBuf, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        EmbeddingCache {
            model,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &Arc<dyn EmbeddingModel> {
        &self.model
    }

    /// Per-file entry point: any failure means "no embedding available".
    pub fn get_or_compute(&self, path: &Path) -> Option<Embedding> {
        match self.try_get_or_compute(path) {
            Ok(vector) => Some(vector),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no embedding for file");
                None
            }
        }
    }

    pub fn try_get_or_compute(&self, path: &Path) -> Result<Embedding> {
        let key = fs::canonicalize(path)?;
        let modified = fs::metadata(&key)?.modified()?;

        if let Some(entry) = self.entries.get(&key) {
            if entry.modified == modified {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.vector.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let image = image::open(&key).map_err(|e| {
            Error::Embedding(format!("Failed to decode {}: {}", key.display(), e))
        })?;
        let vector = unit_embedding(self.model.encode_image(&image)?, self.model.dim())?;

        // A slower encode of an older version must not overwrite a newer one.
        self.entries
            .entry(key)
            .and_modify(|entry| {
                if entry.modified <= modified {
                    entry.modified = modified;
                    entry.vector = vector.clone();
                }
            })
            .or_insert_with(|| CacheEntry {
                modified,
                vector: vector.clone(),
            });

        Ok(vector)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::{at_cosine, write_png, LookupModel};
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn model() -> Arc<LookupModel> {
        Arc::new(
            LookupModel::default()
                .with_image(10, vec![3.0, 4.0])
                .with_image(20, at_cosine(-0.5)),
        )
    }

    #[test]
    fn test_hit_returns_identical_vector_without_recompute() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.png");
        write_png(&path, 10);

        let model = model();
        let cache = EmbeddingCache::new(model.clone());

        let first = cache.get_or_compute(&path).unwrap();
        let second = cache.get_or_compute(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(model.image_calls(), 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 1));
        assert!((first[0] - 0.6).abs() < 1e-6, "stored vectors are unit length");
    }

    #[test]
    fn test_modified_file_recomputes_and_replaces_entry() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.png");
        write_png(&path, 10);
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

        let model = model();
        let cache = EmbeddingCache::new(model.clone());
        let before = cache.get_or_compute(&path).unwrap();

        write_png(&path, 20);
        set_file_mtime(&path, FileTime::from_unix_time(1_700_000_100, 0)).unwrap();
        let after = cache.get_or_compute(&path).unwrap();

        assert_eq!(model.image_calls(), 2);
        assert_ne!(before, after);
        assert!((after[0] + 0.5).abs() < 1e-6);
        assert_eq!(cache.len(), 1, "old version is evicted");
    }

    #[test]
    fn test_failures_are_absorbed() {
        let temp = TempDir::new().unwrap();
        let corrupt = temp.path().join("broken.png");
        fs::write(&corrupt, b"definitely not a png").unwrap();
        let unknown = temp.path().join("unknown.png");
        write_png(&unknown, 99);

        let cache = EmbeddingCache::new(model());
        assert!(cache.get_or_compute(&corrupt).is_none());
        assert!(cache.get_or_compute(&unknown).is_none());
        assert!(cache.get_or_compute(&temp.path().join("missing.png")).is_none());
        assert!(cache.is_empty());
    }
}
