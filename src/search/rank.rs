// ABOUTME: Cosine similarity ranking with [0, 1] score remapping
// ABOUTME: Threshold filtering and stable descending sort

use super::Candidate;
use crate::{
    model::ScoredResult,
    util::{cosine_to_score, dot},
};
use std::cmp::Ordering;

/// Scores candidates against `query` and keeps those at or above `min_score`.
///
/// Returns `(index into candidates, score)` in descending score order; ties
/// keep their input order.
pub fn rank_indices(query: &[f32], candidates: &[Candidate], min_score: f32) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| (i, cosine_to_score(dot(query, &candidate.embedding))))
        .filter(|(_, score)| *score >= min_score)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored
}

pub fn rank(query: &[f32], candidates: &[Candidate], min_score: f32) -> Vec<ScoredResult> {
    rank_indices(query, candidates, min_score)
        .into_iter()
        .map(|(i, score)| to_result(&candidates[i], score))
        .collect()
}

pub(crate) fn to_result(candidate: &Candidate, score: f32) -> ScoredResult {
    let result = ScoredResult::new(candidate.path.clone(), score);
    match candidate.dimensions {
        Some((width, height)) => result.with_dimensions(width, height),
        None => result,
    }
}

/// Stable descending sort by score.
pub fn sort_results(results: &mut [ScoredResult]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
