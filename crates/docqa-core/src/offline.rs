//! Deterministic offline capability adapters.
//!
//! These stand in for the real embedding/reranking models in tests and in
//! the CLI, so the whole pipeline runs without model weights or network
//! access. Real adapters belong to the service layer.

use async_trait::async_trait;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::Path;
use twox_hash::XxHash64;

use crate::chunker::query_terms;
use crate::error::{Error, Result};
use crate::traits::{DocumentLoader, Embedder, Reranker};

/// Hash-bucket embedder: each token bumps one dimension, vector is then
/// L2-normalized. Deterministic, so cached embeddings stay comparable
/// across runs.
pub struct HashEmbedder {
    id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { id: format!("offline-hash:d{dim}"), dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Term-overlap reranker: the fraction of distinct question terms present
/// in the candidate. A crude stand-in for a cross-encoder with the same
/// call shape.
#[derive(Default)]
pub struct OverlapReranker;

#[async_trait]
impl Reranker for OverlapReranker {
    async fn score_pairs(&self, question: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let q_terms: HashSet<String> = query_terms(question).into_iter().collect();
        let scores = candidates
            .iter()
            .map(|c| {
                let c_terms: HashSet<String> = query_terms(c).into_iter().collect();
                let hit = q_terms.iter().filter(|t| c_terms.contains(*t)).count();
                hit as f32 / q_terms.len().max(1) as f32
            })
            .collect();
        Ok(scores)
    }
}

/// Local plain-text loader: reads a file path and normalizes line endings.
#[derive(Default)]
pub struct FileLoader;

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load_and_clean(&self, source: &str) -> Result<String> {
        let path = Path::new(source);
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Acquisition(format!("{source}: {e}")))?;
        Ok(raw.replace("\r\n", "\n").trim().to_string())
    }
}
