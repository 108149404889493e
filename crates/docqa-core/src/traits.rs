//! Capability seams for the external model and document collaborators.
//!
//! The retrieval core never loads models or parses document formats
//! itself; concrete adapters are chosen at startup and passed in behind
//! these traits. Deterministic offline adapters live in [`crate::offline`].

use crate::error::Result;
use async_trait::async_trait;

/// Batched text embedding capability.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backing model (recorded in cache entries
    /// so a model swap invalidates reuse).
    fn id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;
    /// Embed a batch of texts; one vector of `dim()` floats per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cross-encoding relevance capability: scores (question, candidate) pairs.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One relevance score per candidate, higher is more relevant.
    async fn score_pairs(&self, question: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

/// Document acquisition and parsing, producing cleaned text.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load_and_clean(&self, source: &str) -> Result<String>;
}

/// Downstream answer synthesis over retrieved context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}
