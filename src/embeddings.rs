// ABOUTME: Embedding capability boundary, cache, and query encoding
// ABOUTME: The CLIP ONNX engine and its downloader are feature-gated behind `clip`

pub mod cache;
pub mod encoder;

#[cfg(feature = "clip")]
pub mod engine;

#[cfg(feature = "clip")]
pub mod downloader;

pub use cache::EmbeddingCache;
pub use encoder::QueryEncoder;

#[cfg(feature = "clip")]
pub use downloader::{ensure_model, ModelPaths};

#[cfg(feature = "clip")]
pub use engine::ClipEngine;

use crate::{model::Embedding, util::normalize_vector, Error, Result};
use image::DynamicImage;

/// A joint image/text embedding model.
///
/// Both methods must be deterministic for a fixed input and place their
/// outputs in the same `dim()`-dimensional space, so that an image vector
/// and a text vector can be compared directly. Outputs need not be
/// normalized; callers run them through [`unit_embedding`].
pub trait EmbeddingModel: Send + Sync {
    fn dim(&self) -> usize;

    fn encode_image(&self, image: &DynamicImage) -> Result<Vec<f32>>;

    fn encode_text(&self, text: &str) -> Result<Vec<f32>>;
}

/// Validates a raw model output and rescales it to unit length.
pub fn unit_embedding(raw: Vec<f32>, dim: usize) -> Result<Embedding> {
    if raw.len() != dim {
        return Err(Error::Embedding(format!(
            "Vector dimension mismatch: expected {}, got {}",
            dim,
            raw.len()
        )));
    }
    if raw.iter().any(|x| !x.is_finite()) || raw.iter().all(|x| *x == 0.0) {
        return Err(Error::Embedding(
            "Model returned a zero or non-finite vector".into(),
        ));
    }
    Ok(normalize_vector(raw).into())
}
