// ABOUTME: Zero-shot content descriptions for image-query results
// ABOUTME: Softmax over a fixed visual category list, top matches rendered as percentages

use crate::{
    embeddings::QueryEncoder,
    model::Embedding,
    util::{dot, format_labeled_percent},
    Result,
};
use std::cmp::Ordering;

pub const CATEGORIES: [&str; 40] = [
    "a photograph", "digital art", "a painting", "a sketch",
    "landscape photo", "portrait photo", "abstract art", "still life",
    "black and white", "colorful", "high contrast", "soft lighting",
    "nature scene", "urban scene", "indoor scene", "outdoor scene",
    "close-up shot", "wide angle shot", "aerial view", "macro photography",
    "night scene", "daylight scene", "sunset scene", "sunrise scene",
    "architecture", "people", "animals", "plants",
    "water", "mountains", "sky", "buildings",
    "vintage style", "modern style", "minimalist", "detailed",
    "texture", "pattern", "symmetrical", "asymmetrical",
];

const TOP_K: usize = 5;
const LOGIT_SCALE: f32 = 100.0;

pub struct ContentDescriber {
    labels: Vec<String>,
    vectors: Vec<Embedding>,
}

impl ContentDescriber {
    /// Embeds every category label once.
    pub fn new(encoder: &QueryEncoder) -> Result<Self> {
        let vectors = CATEGORIES
            .iter()
            .map(|label| encoder.encode_text(label))
            .collect::<Result<Vec<_>>>()?;
        Ok(ContentDescriber {
            labels: CATEGORIES.iter().map(|s| s.to_string()).collect(),
            vectors,
        })
    }

    pub fn from_vectors(categories: Vec<(String, Embedding)>) -> Self {
        let (labels, vectors) = categories.into_iter().unzip();
        ContentDescriber { labels, vectors }
    }

    /// Category probabilities for `embedding`, highest first, truncated to the top five.
    pub fn top_categories(&self, embedding: &[f32]) -> Vec<(&str, f32)> {
        let logits: Vec<f32> = self
            .vectors
            .iter()
            .map(|v| LOGIT_SCALE * dot(embedding, v))
            .collect();
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();

        let mut ranked: Vec<(&str, f32)> = self
            .labels
            .iter()
            .zip(exps)
            .map(|(label, e)| (label.as_str(), e / total))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        ranked.truncate(TOP_K);
        ranked
    }

    pub fn describe(&self, embedding: &[f32]) -> Option<String> {
        if self.vectors.is_empty() {
            return None;
        }
        Some(
            self.top_categories(embedding)
                .into_iter()
                .map(|(label, p)| format_labeled_percent(label, p))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}
