//! Weighted linear fusion of dense and sparse result lists.
//!
//! Both signals are min-max normalized to [0, 1] per query before mixing;
//! dense distances are inverted during normalization so 1.0 is always the
//! best candidate on either signal. A candidate present in only one list
//! carries 0 for the missing signal rather than being excluded. A
//! single-candidate or all-equal list normalizes to 1.0 for every member,
//! so there is never a division by zero.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use docqa_core::config::FusionConfig;
use docqa_core::error::{Error, Result};
use docqa_core::types::CandidateResult;

/// Merge dense hits (`(chunk_index, squared L2 distance)`, ascending) and
/// sparse hits (`(chunk_index, BM25 score)`) into one ranked candidate
/// list, descending by fused score with ascending chunk-index tie-break.
pub fn fuse(
    dense: &[(usize, f32)],
    sparse: &[(usize, f32)],
    weights: &FusionConfig,
) -> Result<Vec<CandidateResult>> {
    for (name, w) in [
        ("semantic_weight", weights.semantic_weight),
        ("keyword_weight", weights.keyword_weight),
    ] {
        if !w.is_finite() || w < 0.0 {
            return Err(Error::InvalidInput(format!("{name} must be non-negative, got {w}")));
        }
    }

    let norm_dense = normalize_distances(dense);
    let norm_sparse = normalize_scores(sparse);

    let chunk_indexes: BTreeSet<usize> =
        norm_dense.keys().chain(norm_sparse.keys()).copied().collect();

    let mut candidates: Vec<CandidateResult> = chunk_indexes
        .into_iter()
        .map(|chunk_index| {
            let dense_score = norm_dense.get(&chunk_index).copied().unwrap_or(0.0);
            let sparse_score = norm_sparse.get(&chunk_index).copied().unwrap_or(0.0);
            CandidateResult {
                chunk_index,
                dense_score,
                sparse_score,
                fused_score: weights.semantic_weight * dense_score
                    + weights.keyword_weight * sparse_score,
                rerank_score: None,
            }
        })
        .collect();

    candidates.sort_by_key(|c| (Reverse(OrderedFloat(c.fused_score)), c.chunk_index));
    Ok(candidates)
}

/// Min-max over distances, inverted: the closest candidate maps to 1.0.
fn normalize_distances(results: &[(usize, f32)]) -> HashMap<usize, f32> {
    let mut normalized = HashMap::with_capacity(results.len());
    if let Some((min, max)) = min_max(results) {
        let range = max - min;
        for &(chunk_index, d) in results {
            let score = if range < f32::EPSILON { 1.0 } else { (max - d) / range };
            normalized.insert(chunk_index, score);
        }
    }
    normalized
}

/// Min-max over scores where higher is already better.
fn normalize_scores(results: &[(usize, f32)]) -> HashMap<usize, f32> {
    let mut normalized = HashMap::with_capacity(results.len());
    if let Some((min, max)) = min_max(results) {
        let range = max - min;
        for &(chunk_index, s) in results {
            let score = if range < f32::EPSILON { 1.0 } else { (s - min) / range };
            normalized.insert(chunk_index, score);
        }
    }
    normalized
}

/// Single-pass min/max computation.
fn min_max(results: &[(usize, f32)]) -> Option<(f32, f32)> {
    if results.is_empty() {
        return None;
    }
    let mut min = f32::MAX;
    let mut max = f32::MIN;
    for &(_, s) in results {
        if s < min {
            min = s;
        }
        if s > max {
            max = s;
        }
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(semantic: f32, keyword: f32) -> FusionConfig {
        FusionConfig { semantic_weight: semantic, keyword_weight: keyword }
    }

    fn order(candidates: &[CandidateResult]) -> Vec<usize> {
        candidates.iter().map(|c| c.chunk_index).collect()
    }

    #[test]
    fn pure_semantic_weight_reproduces_dense_order() {
        let dense = vec![(3, 0.1), (0, 0.4), (7, 0.9)];
        let sparse = vec![(7, 9.0), (3, 1.0), (0, 0.5)];
        let fused = fuse(&dense, &sparse, &weights(1.0, 0.0)).expect("fuse");
        assert_eq!(order(&fused), vec![3, 0, 7]);
    }

    #[test]
    fn pure_keyword_weight_reproduces_sparse_order() {
        let dense = vec![(3, 0.1), (0, 0.4), (7, 0.9)];
        let sparse = vec![(7, 9.0), (3, 1.0), (0, 0.5)];
        let fused = fuse(&dense, &sparse, &weights(0.0, 1.0)).expect("fuse");
        assert_eq!(order(&fused), vec![7, 3, 0]);
    }

    #[test]
    fn all_equal_dense_scores_normalize_to_a_constant() {
        let dense = vec![(0, 0.5), (1, 0.5), (2, 0.5)];
        let sparse = vec![(1, 2.0), (2, 4.0)];
        let fused = fuse(&dense, &sparse, &weights(0.7, 0.3)).expect("fuse");
        for c in &fused {
            assert!((c.dense_score - 1.0).abs() < f32::EPSILON, "constant dense signal");
        }
        // Chunk 2 wins on sparse; chunks 0 and 1 tie at zero sparse
        // contribution and fall back to index order.
        assert_eq!(order(&fused), vec![2, 0, 1]);
    }

    #[test]
    fn single_candidate_normalizes_to_one() {
        let fused = fuse(&[(4, 0.25)], &[(4, 3.0)], &weights(0.7, 0.3)).expect("fuse");
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].dense_score, 1.0);
        assert_eq!(fused[0].sparse_score, 1.0);
        assert!((fused[0].fused_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_signal_contributes_zero_not_exclusion() {
        let dense = vec![(0, 0.1), (1, 0.2)];
        let sparse = vec![(2, 5.0), (0, 1.0)];
        let fused = fuse(&dense, &sparse, &weights(0.7, 0.3)).expect("fuse");
        let chunk_indexes: Vec<usize> = order(&fused);
        assert!(chunk_indexes.contains(&1), "dense-only candidate kept");
        assert!(chunk_indexes.contains(&2), "sparse-only candidate kept");
        let sparse_only = fused.iter().find(|c| c.chunk_index == 2).expect("chunk 2");
        assert_eq!(sparse_only.dense_score, 0.0);
    }

    #[test]
    fn equal_fused_scores_break_by_ascending_chunk_index() {
        let dense = vec![(5, 0.3), (1, 0.3), (9, 0.3)];
        let fused = fuse(&dense, &[], &weights(1.0, 0.0)).expect("fuse");
        assert_eq!(order(&fused), vec![1, 5, 9]);
    }

    #[test]
    fn negative_weights_are_rejected() {
        assert!(matches!(
            fuse(&[(0, 0.1)], &[], &weights(-1.0, 0.3)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn weights_need_not_sum_to_one() {
        let fused = fuse(&[(0, 0.1), (1, 0.9)], &[(0, 2.0)], &weights(2.0, 3.0)).expect("fuse");
        assert_eq!(fused[0].chunk_index, 0);
        assert!((fused[0].fused_score - 5.0).abs() < 1e-6);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(fuse(&[], &[], &weights(0.7, 0.3)).expect("fuse").is_empty());
    }
}
