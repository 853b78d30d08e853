// ABOUTME: Turns image-path or text queries into unit-length embeddings
// ABOUTME: Image queries go through the cache, text queries always hit the model

use super::{unit_embedding, EmbeddingCache, EmbeddingModel};
use crate::{
    model::{Embedding, Query},
    Error, Result,
};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryEncoder {
    cache: Arc<EmbeddingCache>,
}

impl QueryEncoder {
    pub fn new(cache: Arc<EmbeddingCache>) -> Self {
        QueryEncoder { cache }
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    fn model(&self) -> &Arc<dyn EmbeddingModel> {
        self.cache.model()
    }

    pub fn encode_image(&self, path: &Path) -> Result<Embedding> {
        self.cache.try_get_or_compute(path).map_err(|e| {
            Error::Query(format!("cannot embed query image {}: {}", path.display(), e))
        })
    }

    pub fn encode_text(&self, text: &str) -> Result<Embedding> {
        let model = self.model();
        model
            .encode_text(text)
            .and_then(|raw| unit_embedding(raw, model.dim()))
            .map_err(|e| Error::Query(format!("cannot embed text '{}': {}", text, e)))
    }

    pub fn encode(&self, query: &Query) -> Result<Embedding> {
        match query {
            Query::Image(path) => self.encode_image(path),
            Query::Text(text) => self.encode_text(text),
        }
    }

    /// Runs [`encode`](Self::encode) on the blocking pool.
    pub async fn encode_blocking(&self, query: Query) -> Result<Embedding> {
        let encoder = self.clone();
        tokio::task::spawn_blocking(move || encoder.encode(&query))
            .await
            .map_err(|e| Error::Query(format!("query encoder task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::{write_png, LookupModel};
    use tempfile::TempDir;

    fn setup() -> (Arc<LookupModel>, QueryEncoder) {
        let model = Arc::new(
            LookupModel::default()
                .with_image(5, vec![0.0, 2.0])
                .with_text("sunset", vec![6.0, 8.0]),
        );
        let encoder = QueryEncoder::new(Arc::new(EmbeddingCache::new(model.clone())));
        (model, encoder)
    }

    #[test]
    fn test_image_queries_are_cached() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("query.png");
        write_png(&path, 5);

        let (model, encoder) = setup();
        let a = encoder.encode(&Query::Image(path.clone())).unwrap();
        let b = encoder.encode_image(&path).unwrap();

        assert_eq!(a, b);
        assert_eq!(&a[..], &[0.0, 1.0]);
        assert_eq!(model.image_calls(), 1);
    }

    #[test]
    fn test_text_queries_bypass_cache() {
        let (model, encoder) = setup();
        let a = encoder.encode_text("sunset").unwrap();
        encoder.encode_text("sunset").unwrap();

        assert!((a[0] - 0.6).abs() < 1e-6);
        assert_eq!(model.text_calls(), 2);
        assert!(encoder.cache().is_empty());
    }

    #[test]
    fn test_failures_become_query_errors() {
        let (_, encoder) = setup();
        assert!(matches!(
            encoder.encode_text("unknown words"),
            Err(Error::Query(_))
        ));
        assert!(matches!(
            encoder.encode_image(Path::new("/no/such/query.png")),
            Err(Error::Query(_))
        ));
    }

    #[tokio::test]
    async fn test_encode_blocking() {
        let (_, encoder) = setup();
        let v = encoder
            .encode_blocking(Query::Text("sunset".into()))
            .await
            .unwrap();
        assert_eq!(v.len(), 2);
    }
}
