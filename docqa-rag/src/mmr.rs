//! Maximal Marginal Relevance (MMR) re-ranking.
//!
//! MMR balances relevance to the query against redundancy among the results
//! already chosen:
//!
//! `score = λ × relevance(candidate) - (1 - λ) × max(similarity(candidate, selected))`
//!
//! λ = 1.0 is plain relevance ranking, λ = 0.0 maximizes diversity.

use crate::document::SearchResult;
use crate::vectorstore::cosine_similarity;

/// Select up to `k` candidates by maximal marginal relevance.
///
/// `candidates` are nearest-neighbour results in descending relevance, each
/// carrying its query similarity in `score`. The candidate with the highest
/// MMR score is taken on every round; ties go to the earlier candidate.
/// Returned results keep their original relevance scores and are ordered by
/// selection.
pub fn rerank(candidates: Vec<SearchResult>, k: usize, lambda: f32) -> Vec<SearchResult> {
    let k = k.min(candidates.len());
    let mut remaining: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut selected: Vec<SearchResult> = Vec::with_capacity(k);

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;

        for (idx, candidate) in remaining.iter().enumerate() {
            let Some(candidate) = candidate else { continue };

            let redundancy = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.chunk.embedding, &s.chunk.embedding))
                .fold(None, |acc: Option<f32>, sim| Some(acc.map_or(sim, |a| a.max(sim))))
                .unwrap_or(0.0);
            let score = lambda * candidate.score - (1.0 - lambda) * redundancy;

            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        match best.and_then(|(idx, _)| remaining[idx].take()) {
            Some(choice) => selected.push(choice),
            None => break,
        }
    }

    selected
}
