//! Domain types shared by the sparse/dense indexes, cache and engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Meta = HashMap<String, String>;

/// A contiguous span of the cleaned document text, independently indexed.
///
/// - `index`: position within the parent document (0-based, dense)
/// - `start_offset`/`end_offset`: byte offsets into the cleaned text
/// - `source_metadata`: free-form provenance (source id, page, …)
///
/// Chunks are immutable once produced and owned by their document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub source_metadata: Meta,
}

/// How a document's questions will be answered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Strategy {
    /// The whole document fits downstream context; skip retrieval.
    FullText,
    /// Chunk, index and retrieve per question.
    HybridRag,
}

/// Per-document decision, computed once and cached with the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalPlan {
    pub strategy: Strategy,
    pub reason: String,
}

/// One fused retrieval candidate for a single question.
///
/// `dense_score` and `sparse_score` are the min-max normalized signals in
/// [0, 1]; a candidate missing from one result list carries 0 for that
/// signal. `rerank_score` is set only when the cross-encoder ran.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateResult {
    pub chunk_index: usize,
    pub dense_score: f32,
    pub sparse_score: f32,
    pub fused_score: f32,
    pub rerank_score: Option<f32>,
}

/// Final ranked context for one question.
#[derive(Debug, Clone, Serialize)]
pub struct RankedContext {
    /// Candidates in final rank order, best first.
    pub candidates: Vec<CandidateResult>,
    /// Chunk texts in the same order, ready to join into a prompt.
    pub spans: Vec<String>,
    /// True when the reranker was unavailable and fused order was kept.
    pub rerank_fallback: bool,
}

/// Per-question outcome of a batch retrieval.
///
/// The output list of a batch always matches the question list in length
/// and order; a failed question occupies its slot without affecting the
/// rest of the batch.
#[derive(Debug, Clone, Serialize)]
pub enum RetrievalResult {
    /// The document was small enough to hand downstream whole.
    FullText,
    /// Ranked context chunks for this question.
    Context(RankedContext),
    /// Retrieval failed for this question only.
    Failed { error: String },
}
