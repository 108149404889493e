//! Token-bounded overlapping chunking of cleaned document text.
//!
//! Tokens are whitespace-delimited words located by byte offset, so the
//! same text and parameters always yield the same chunk boundaries. The
//! term normalization used by the sparse index lives here too, keeping
//! keyword tokenization consistent with chunking.

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Meta};

/// Byte spans of the whitespace-delimited tokens of `text`.
pub fn token_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Split `text` into chunks of `chunk_size` tokens where consecutive
/// chunks share exactly `overlap` tokens; the last chunk may be shorter.
///
/// Pure and deterministic. Fails with `InvalidInput` when
/// `overlap >= chunk_size` or the text contains no tokens.
pub fn chunk_text(text: &str, cfg: &ChunkingConfig) -> Result<Vec<Chunk>> {
    if cfg.chunk_size == 0 || cfg.overlap >= cfg.chunk_size {
        return Err(Error::InvalidInput(format!(
            "overlap {} must be smaller than chunk_size {}",
            cfg.overlap, cfg.chunk_size
        )));
    }
    let spans = token_spans(text);
    if spans.is_empty() {
        return Err(Error::InvalidInput("document has no tokens".to_string()));
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + cfg.chunk_size).min(spans.len());
        let (first, _) = spans[start];
        let (_, last) = spans[end - 1];
        chunks.push(Chunk {
            index: chunks.len(),
            text: text[first..last].to_string(),
            start_offset: first,
            end_offset: last,
            source_metadata: Meta::new(),
        });
        if end == spans.len() {
            break;
        }
        start = end - cfg.overlap;
    }
    Ok(chunks)
}

/// Estimate the subword token count of `text` for the strategy selector.
///
/// Words inflate to roughly 1/0.75 subword tokens for typical English
/// prose; good enough for a threshold decision, not for billing.
pub fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

/// Case-folded alphanumeric terms of `text`, shared between chunking and
/// the sparse index so keyword matching sees the same tokens.
pub fn query_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}
