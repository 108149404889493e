//! Cross-encoder refinement of the fused candidate head.
//!
//! The reranker capability scores every (question, chunk text) pair in one
//! batched call. When the capability is unavailable the fused order is
//! kept, truncated to the final size, and the fallback is flagged on the
//! result so callers can tell refined output from degraded output.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use docqa_core::traits::Reranker;
use docqa_core::types::CandidateResult;
use tracing::warn;

/// Rescore `head` (fused order, texts parallel to it) and keep the best
/// `final_top_k`. Returns the candidates and whether fused order was kept
/// as a fallback.
pub async fn rerank_candidates(
    reranker: &dyn Reranker,
    question: &str,
    mut head: Vec<CandidateResult>,
    texts: &[String],
    final_top_k: usize,
) -> (Vec<CandidateResult>, bool) {
    match reranker.score_pairs(question, texts).await {
        Ok(scores) if scores.len() == head.len() => {
            for (candidate, score) in head.iter_mut().zip(&scores) {
                candidate.rerank_score = Some(*score);
            }
            head.sort_by_key(|c| {
                (Reverse(OrderedFloat(c.rerank_score.unwrap_or(f32::MIN))), c.chunk_index)
            });
            head.truncate(final_top_k);
            (head, false)
        }
        Ok(scores) => {
            warn!(
                expected = head.len(),
                got = scores.len(),
                "reranker returned a short score list, keeping fused order"
            );
            head.truncate(final_top_k);
            (head, true)
        }
        Err(e) => {
            warn!(error = %e, "reranker unavailable, keeping fused order");
            head.truncate(final_top_k);
            (head, true)
        }
    }
}
