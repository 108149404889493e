use docqa_core::chunker::query_terms;
use docqa_core::config::Bm25Config;
use docqa_core::types::{Chunk, Meta};
use docqa_text::SparseIndex;

fn chunk(index: usize, text: &str) -> Chunk {
    Chunk {
        index,
        text: text.to_string(),
        start_offset: 0,
        end_offset: text.len(),
        source_metadata: Meta::new(),
    }
}

fn build(texts: &[&str]) -> SparseIndex {
    let chunks: Vec<Chunk> = texts.iter().enumerate().map(|(i, t)| chunk(i, t)).collect();
    SparseIndex::build(&chunks, Bm25Config::default())
}

#[test]
fn matching_chunk_outranks_non_matching() {
    let index = build(&[
        "the cat sat on the mat",
        "dogs chase the postman",
        "cats and cat toys for a cat",
    ]);
    let ranked = index.top_k("cat", 3);
    assert!(!ranked.is_empty());
    assert_eq!(ranked[0].0, 2, "chunk with most cat occurrences wins");
    assert!(ranked.iter().all(|&(i, _)| i != 1), "no score without the term");
}

#[test]
fn unknown_terms_score_zero_not_error() {
    let index = build(&["alpha bravo", "charlie delta"]);
    let scores = index.score(&query_terms("zeppelin quasar"));
    assert!(scores.is_empty());
    assert!(index.top_k("zeppelin", 5).is_empty());
}

#[test]
fn repeated_terms_saturate() {
    // Diminishing returns: the gap from 1→2 occurrences must exceed 4→5.
    let index = build(&[
        "term filler filler filler filler",
        "term term filler filler filler",
        "term term term term filler",
        "term term term term term",
    ]);
    let scores = index.score(&query_terms("term"));
    let s = |i: usize| scores[&i];
    assert!(s(1) > s(0));
    assert!(s(3) > s(2));
    assert!((s(1) - s(0)) > (s(3) - s(2)), "tf gain must shrink");
}

#[test]
fn long_chunks_are_penalized() {
    // Same single occurrence; the much longer chunk scores lower.
    let long_tail = "filler ".repeat(60);
    let long = format!("needle {long_tail}");
    let index = build(&["needle with few words", &long, "plain filler words here"]);
    let scores = index.score(&query_terms("needle"));
    assert!(scores[&0] > scores[&1], "length normalization must penalize chunk 1");
}

#[test]
fn case_folding_matches_chunker_normalization() {
    let index = build(&["The Needle, in a haystack!"]);
    let scores = index.score(&query_terms("NEEDLE"));
    assert_eq!(scores.len(), 1);
    assert!(scores[&0] > 0.0);
}

#[test]
fn ties_break_by_ascending_chunk_index() {
    let index = build(&["same words here", "same words here", "same words here"]);
    let ranked = index.top_k("same words", 3);
    let order: Vec<usize> = ranked.iter().map(|&(i, _)| i).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[test]
fn empty_corpus_scores_nothing() {
    let index = SparseIndex::build(&[], Bm25Config::default());
    assert!(index.is_empty());
    assert_eq!(index.len(), 0);
    assert!(index.score(&query_terms("anything")).is_empty());
}
