//! Exact flat index over chunk embeddings, squared-Euclidean distance.
//!
//! Built once per document fingerprint from the cached embeddings and
//! shared read-only across concurrent questions. An exhaustive scan keeps
//! the true top-k guarantee at per-document corpus sizes; only the top `k`
//! candidates are kept in a bounded heap during the scan.

use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

use docqa_core::error::{Error, Result};

pub struct DenseIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    /// Index `embeddings` in chunk order. All vectors must have `dim`
    /// components; order defines the chunk indexes returned by `search`.
    pub fn build(embeddings: Vec<Vec<f32>>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidInput("embedding dimension must be positive".to_string()));
        }
        for (i, v) in embeddings.iter().enumerate() {
            if v.len() != dim {
                return Err(Error::InvalidInput(format!(
                    "embedding {} has {} components, expected {}",
                    i,
                    v.len(),
                    dim
                )));
            }
        }
        Ok(Self { dim, vectors: embeddings })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Exactly `min(k, len)` nearest chunks by squared L2 distance,
    /// ascending; equal distances break by ascending chunk index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(Error::InvalidInput(format!(
                "query vector has {} components, expected {}",
                query.len(),
                self.dim
            )));
        }
        let mut heap: BinaryHeap<(OrderedFloat<f32>, usize)> = BinaryHeap::with_capacity(k + 1);
        for (chunk_index, v) in self.vectors.iter().enumerate() {
            let d = squared_l2(query, v);
            heap.push((OrderedFloat(d), chunk_index));
            if heap.len() > k {
                heap.pop();
            }
        }
        let mut hits: Vec<(usize, f32)> =
            heap.into_iter().map(|(d, chunk_index)| (chunk_index, d.0)).collect();
        hits.sort_by_key(|&(chunk_index, d)| (OrderedFloat(d), chunk_index));
        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
