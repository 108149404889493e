//! On-disk cache record: one JSON file per document fingerprint.

use serde::{Deserialize, Serialize};

use docqa_core::types::{Chunk, RetrievalPlan, Strategy};

/// Everything cached for one document: its chunks, their embeddings (same
/// count, same order) and the strategy decision. `FullText` documents
/// carry a plan-only record with empty chunk and embedding lists, so
/// repeated requests skip re-deciding without ever paying for embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint: String,
    /// Identifier of the embedder that produced the vectors; a model swap
    /// must not silently reuse another model's embeddings.
    pub embedder_id: String,
    pub plan: RetrievalPlan,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
    /// Unix epoch milliseconds at computation time; TTL anchor.
    pub created_at: i64,
    /// Serialized payload size; accounting only, filled on read/write.
    #[serde(skip)]
    pub size_bytes: u64,
}

impl CacheRecord {
    /// The chunk/embedding count invariant every usable record satisfies.
    pub fn is_consistent(&self) -> bool {
        self.chunks.len() == self.embeddings.len()
            && (self.plan.strategy == Strategy::HybridRag || self.chunks.is_empty())
    }

    pub fn is_expired(&self, ttl_hours: u64, now_ms: i64) -> bool {
        let ttl_ms = ttl_hours as i64 * 3600 * 1000;
        now_ms.saturating_sub(self.created_at) >= ttl_ms
    }
}
