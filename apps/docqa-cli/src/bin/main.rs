//! Offline retrieval demo: run the hybrid pipeline over a local text file
//! with the deterministic capability adapters, no model weights needed.

use std::sync::Arc;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use docqa_core::config::Config;
use docqa_core::offline::{FileLoader, HashEmbedder, OverlapReranker};
use docqa_core::types::{RetrievalResult, Strategy};
use docqa_hybrid::RetrievalEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: docqa <file> <question> [question ...]");
    };
    let questions: Vec<String> = args.collect();
    if questions.is_empty() {
        bail!("usage: docqa <file> <question> [question ...]");
    }

    let config = Config::load()?;
    info!(file = %path, questions = questions.len(), "starting retrieval");
    let engine = RetrievalEngine::new(
        Arc::new(FileLoader),
        Arc::new(HashEmbedder::new(1024)),
        Arc::new(OverlapReranker),
        config,
    )?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Preparing {path}"));
    let plan = engine.prepare(&path).await?;
    let strategy = match plan.strategy {
        Strategy::FullText => "full-text",
        Strategy::HybridRag => "hybrid-rag",
    };
    spinner.finish_with_message(format!("Plan: {strategy} ({})", plan.reason));

    let results = engine.retrieve(&path, &questions).await?;

    let bar = ProgressBar::new(questions.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} questions {msg}")?
            .progress_chars("#>-"),
    );
    for (question, result) in questions.iter().zip(&results) {
        bar.inc(1);
        println!("\nQ: {question}");
        match result {
            RetrievalResult::FullText => {
                println!("  document is below the retrieval threshold; use the full text");
            }
            RetrievalResult::Context(context) => {
                if context.rerank_fallback {
                    println!("  (reranker unavailable, fused order)");
                }
                for (candidate, span) in context.candidates.iter().zip(&context.spans) {
                    let preview: String = span.chars().take(96).collect();
                    println!(
                        "  #{:<3} fused={:.3} rerank={} | {preview}",
                        candidate.chunk_index,
                        candidate.fused_score,
                        candidate
                            .rerank_score
                            .map_or_else(|| "-".to_string(), |s| format!("{s:.3}")),
                    );
                }
            }
            RetrievalResult::Failed { error } => {
                println!("  failed: {error}");
            }
        }
    }
    bar.finish_with_message("done");
    Ok(())
}
