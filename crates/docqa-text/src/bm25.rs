//! BM25 Okapi scoring over a document's chunks treated as a mini-corpus.
//!
//! The index is rebuilt whenever the chunk set changes and is never
//! persisted. Terms come from the chunker's normalization so keyword
//! matching sees exactly the tokens chunking saw. Scoring uses
//! IDF `ln((N - df + 0.5)/(df + 0.5) + 1)` and term-frequency saturation
//! `tf*(k1+1)/(tf + k1*(1 - b + b*dl/avgdl))` with `k1`/`b` from
//! configuration.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::HashMap;

use docqa_core::chunker::query_terms;
use docqa_core::config::Bm25Config;
use docqa_core::types::Chunk;

struct Posting {
    chunk: u32,
    term_frequency: u32,
}

pub struct SparseIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
    avgdl: f32,
    params: Bm25Config,
}

impl SparseIndex {
    /// Build term statistics for `chunks`; chunk indexes in results refer
    /// to positions in this slice.
    pub fn build(chunks: &[Chunk], params: Bm25Config) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(chunks.len());

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let terms = query_terms(&chunk.text);
            doc_lengths.push(terms.len() as u32);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for term in terms {
                *tf.entry(term).or_insert(0) += 1;
            }
            for (term, term_frequency) in tf {
                postings
                    .entry(term)
                    .or_default()
                    .push(Posting { chunk: chunk_index as u32, term_frequency });
            }
        }

        let total: u64 = doc_lengths.iter().map(|&l| u64::from(l)).sum();
        let avgdl = if doc_lengths.is_empty() {
            1.0
        } else {
            (total as f32 / doc_lengths.len() as f32).max(1.0)
        };

        Self { postings, doc_lengths, avgdl, params }
    }

    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// BM25 score per chunk for the given query terms. Terms absent from
    /// the corpus contribute nothing; chunks matching no term are absent
    /// from the map.
    pub fn score(&self, terms: &[String]) -> HashMap<usize, f32> {
        let mut scores: HashMap<usize, f32> = HashMap::new();
        if self.doc_lengths.is_empty() {
            return scores;
        }
        let n = self.doc_lengths.len() as f32;
        let Bm25Config { k1, b } = self.params;

        for term in terms {
            let Some(postings) = self.postings.get(term) else { continue };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in postings {
                let dl = self.doc_lengths[posting.chunk as usize] as f32;
                let tf = posting.term_frequency as f32;
                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / self.avgdl));
                *scores.entry(posting.chunk as usize).or_insert(0.0) += idf * tf_norm;
            }
        }
        scores
    }

    /// Top `k` chunks for a raw query string, best first; ties broken by
    /// ascending chunk index.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        let terms = query_terms(query);
        let mut ranked: Vec<(usize, f32)> = self.score(&terms).into_iter().collect();
        ranked.sort_by_key(|&(chunk, score)| (Reverse(OrderedFloat(score)), chunk));
        ranked.truncate(k);
        ranked
    }
}
