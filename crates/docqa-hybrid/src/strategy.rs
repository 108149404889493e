//! Per-document choice between whole-document context and retrieval.

use docqa_core::types::{RetrievalPlan, Strategy};

/// Small documents skip chunking and indexing entirely; everything else
/// takes the hybrid retrieval path. Decided once per document and cached
/// with its fingerprint.
pub fn select_strategy(estimated_tokens: usize, threshold: usize) -> RetrievalPlan {
    if estimated_tokens < threshold {
        RetrievalPlan {
            strategy: Strategy::FullText,
            reason: format!("estimated {estimated_tokens} tokens < threshold {threshold}"),
        }
    } else {
        RetrievalPlan {
            strategy: Strategy::HybridRag,
            reason: format!("estimated {estimated_tokens} tokens >= threshold {threshold}"),
        }
    }
}
