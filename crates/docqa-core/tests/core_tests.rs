use docqa_core::chunker::{chunk_text, estimate_tokens, query_terms, token_spans};
use docqa_core::config::{ChunkingConfig, Config};
use docqa_core::error::Error;
use docqa_core::offline::{FileLoader, HashEmbedder, OverlapReranker};
use docqa_core::traits::{DocumentLoader, Embedder, Reranker};
use docqa_core::{fingerprint, types::Strategy};

fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn consecutive_chunks_overlap_exactly() {
    let text = words(10_000);
    let cfg = ChunkingConfig { chunk_size: 512, overlap: 150 };
    let chunks = chunk_text(&text, &cfg).expect("chunk");
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let prev: Vec<&str> = pair[0].text.split_whitespace().collect();
        let next: Vec<&str> = pair[1].text.split_whitespace().collect();
        assert_eq!(&prev[prev.len() - 150..], &next[..150], "exactly 150 shared tokens");
    }
    for chunk in &chunks[..chunks.len() - 1] {
        assert_eq!(chunk.text.split_whitespace().count(), 512);
    }
    assert!(chunks.last().map_or(false, |c| c.text.split_whitespace().count() <= 512));
}

#[test]
fn dropping_overlaps_reconstructs_the_token_sequence() {
    let text = words(2_000);
    let cfg = ChunkingConfig { chunk_size: 300, overlap: 60 };
    let chunks = chunk_text(&text, &cfg).expect("chunk");

    let mut rebuilt: Vec<String> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let toks = chunk.text.split_whitespace().map(str::to_string);
        if i == 0 {
            rebuilt.extend(toks);
        } else {
            rebuilt.extend(toks.skip(cfg.overlap));
        }
    }
    let original: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    assert_eq!(rebuilt, original);
}

#[test]
fn chunking_is_deterministic_and_offsets_slice_the_text() {
    let text = "alpha bravo charlie delta echo foxtrot golf hotel".repeat(40);
    let cfg = ChunkingConfig { chunk_size: 50, overlap: 10 };
    let a = chunk_text(&text, &cfg).expect("chunk");
    let b = chunk_text(&text, &cfg).expect("chunk");
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.start_offset, y.start_offset);
        assert_eq!(x.end_offset, y.end_offset);
        assert_eq!(&text[x.start_offset..x.end_offset], x.text);
    }
}

#[test]
fn overlap_not_below_chunk_size_is_rejected() {
    let cfg = ChunkingConfig { chunk_size: 100, overlap: 100 };
    match chunk_text("some text", &cfg) {
        Err(Error::InvalidInput(_)) => {}
        other => panic!("expected InvalidInput, got {other:?}"),
    }
}

#[test]
fn empty_document_is_rejected() {
    let cfg = ChunkingConfig::default();
    assert!(matches!(chunk_text("   \n\t ", &cfg), Err(Error::InvalidInput(_))));
}

#[test]
fn token_spans_locate_every_word() {
    let text = "  one  two\nthree ";
    let spans = token_spans(text);
    let tokens: Vec<&str> = spans.iter().map(|&(s, e)| &text[s..e]).collect();
    assert_eq!(tokens, vec!["one", "two", "three"]);
}

#[test]
fn token_estimate_inflates_word_count() {
    assert_eq!(estimate_tokens(&words(7_500)), 10_000);
    assert_eq!(estimate_tokens(""), 0);
}

#[test]
fn query_terms_fold_case_and_punctuation() {
    assert_eq!(query_terms("The Quick-Brown FOX, (jumps)!"), vec![
        "the", "quick", "brown", "fox", "jumps"
    ]);
}

#[test]
fn fingerprint_is_stable_and_content_derived() {
    let a = fingerprint::of("the same text");
    let b = fingerprint::of("the same text");
    let c = fingerprint::of("different text");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn default_config_validates_and_bad_weights_do_not() {
    let config = Config::default();
    config.validate().expect("defaults are valid");
    assert_eq!(config.chunking.chunk_size, 512);
    assert_eq!(config.retrieval.small_doc_token_threshold, 5000);

    let mut bad = Config::default();
    bad.fusion.keyword_weight = -0.1;
    assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));

    let mut bad = Config::default();
    bad.chunking.overlap = bad.chunking.chunk_size;
    assert!(matches!(bad.validate(), Err(Error::InvalidInput(_))));
}

#[tokio::test]
async fn hash_embedder_is_deterministic_and_normalized() {
    let embedder = HashEmbedder::new(64);
    let texts = vec!["a small document".to_string(), "another chunk".to_string()];
    let a = embedder.embed_batch(&texts).await.expect("embed");
    let b = embedder.embed_batch(&texts).await.expect("embed");
    assert_eq!(a, b);
    assert_eq!(a.len(), 2);
    for v in &a {
        assert_eq!(v.len(), embedder.dim());
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "unit norm, got {norm}");
    }
}

#[tokio::test]
async fn overlap_reranker_prefers_matching_candidates() {
    let reranker = OverlapReranker;
    let candidates = vec![
        "ownership rules in rust".to_string(),
        "a cooking recipe".to_string(),
    ];
    let scores = reranker.score_pairs("rust ownership", &candidates).await.expect("score");
    assert_eq!(scores.len(), 2);
    assert!(scores[0] > scores[1]);
}

#[tokio::test]
async fn file_loader_reads_and_missing_file_is_acquisition_error() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("doc.txt");
    std::fs::write(&path, "line one\r\nline two\n").expect("write");

    let loader = FileLoader;
    let text = loader.load_and_clean(&path.to_string_lossy()).await.expect("load");
    assert_eq!(text, "line one\nline two");

    let missing = tmp.path().join("absent.txt");
    match loader.load_and_clean(&missing.to_string_lossy()).await {
        Err(Error::Acquisition(_)) => {}
        other => panic!("expected Acquisition, got {other:?}"),
    }
}

#[test]
fn strategy_is_serializable_for_cache_records() {
    let json = serde_json::to_string(&Strategy::HybridRag).expect("serialize");
    let back: Strategy = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, Strategy::HybridRag);
}
