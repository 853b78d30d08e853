// ABOUTME: Per-word relevance for text queries
// ABOUTME: Splits the query into content tokens and folds their scores into a composite

use crate::{
    embeddings::QueryEncoder,
    model::{Embedding, ScoredResult, TokenScore},
    util::{cosine_to_score, dot, format_labeled_percent},
    Result,
};
use std::cmp::Ordering;
use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "of", "in", "on", "at", "to", "for", "with",
    "by", "from", "as", "into", "onto", "over", "under", "near", "is", "are", "was", "were",
    "be", "been", "being", "it", "its", "this", "that", "these", "those", "some", "any",
    "very", "so", "than", "then", "there", "here", "what", "which", "who", "show", "find",
    "me", "my", "i", "photo", "picture", "image",
];

/// Lowercased words with punctuation removed, stop words dropped.
/// Order and duplicates are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// Arithmetic mean of the whole-query score and the mean token score.
pub fn composite_score(whole: f32, token_scores: &[TokenScore]) -> f32 {
    if token_scores.is_empty() {
        return whole;
    }
    let mean = token_scores.iter().map(|t| t.score).sum::<f32>() / token_scores.len() as f32;
    (whole + mean) / 2.0
}

pub fn render_token_scores(token_scores: &[TokenScore]) -> String {
    token_scores
        .iter()
        .map(|t| format_labeled_percent(&t.token, t.score))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct TokenRelevanceAnalyzer {
    tokens: Vec<(String, Embedding)>,
}

impl TokenRelevanceAnalyzer {
    /// Tokenizes `text` and embeds each distinct token once.
    pub fn new(encoder: &QueryEncoder, text: &str) -> Result<Self> {
        let mut encoded: HashMap<String, Embedding> = HashMap::new();
        let mut tokens = Vec::new();
        for token in tokenize(text) {
            let vector = match encoded.get(&token) {
                Some(vector) => vector.clone(),
                None => {
                    let vector = encoder.encode_text(&token)?;
                    encoded.insert(token.clone(), vector.clone());
                    vector
                }
            };
            tokens.push((token, vector));
        }
        Ok(TokenRelevanceAnalyzer { tokens })
    }

    pub fn from_vectors(tokens: Vec<(String, Embedding)>) -> Self {
        TokenRelevanceAnalyzer { tokens }
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.tokens.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Score of each token against `embedding`, highest first.
    pub fn score_tokens(&self, embedding: &[f32]) -> Vec<TokenScore> {
        let mut scores: Vec<TokenScore> = self
            .tokens
            .iter()
            .map(|(token, vector)| TokenScore {
                token: token.clone(),
                score: cosine_to_score(dot(embedding, vector)),
            })
            .collect();
        scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scores
    }

    /// Replaces the whole-query score with the composite and attaches the breakdown.
    pub fn explain(&self, mut result: ScoredResult, embedding: &[f32]) -> ScoredResult {
        if self.tokens.is_empty() {
            return result;
        }
        let token_scores = self.score_tokens(embedding);
        result.score = composite_score(result.score, &token_scores);
        result.description = Some(render_token_scores(&token_scores));
        result.tokens = token_scores;
        result
    }
}
