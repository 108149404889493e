//! Typed configuration, loaded once and passed around as an immutable
//! snapshot.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*`
//! env vars into serde sections with defaults. A query batch holds one
//! `Config` value for its whole lifetime, so weights and thresholds can
//! never change mid-batch.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Token-bounded chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 512, overlap: 150 }
    }
}

/// Linear fusion weights; need not sum to 1, must be non-negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { semantic_weight: 0.7, keyword_weight: 0.3 }
    }
}

/// BM25 Okapi parameters for the sparse index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Term-frequency saturation constant.
    pub k1: f32,
    /// Length-normalization constant.
    pub b: f32,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Retrieval depth and the full-text bypass threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Fused candidates handed to the reranker.
    pub candidate_pool: usize,
    /// Final context chunks per question.
    pub final_top_k: usize,
    /// Documents estimated below this many tokens skip retrieval.
    pub small_doc_token_threshold: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { candidate_pool: 20, final_top_k: 10, small_doc_token_threshold: 5000 }
    }
}

/// Embedding cache location and eviction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: String,
    pub ttl_hours: u64,
    pub max_size_gb: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { dir: "document_cache".to_string(), ttl_hours: 24, max_size_gb: 10 }
    }
}

impl CacheConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_gb * 1024 * 1024 * 1024
    }

    pub fn expanded_dir(&self) -> PathBuf {
        expand_path(&self.dir)
    }
}

/// Concurrency bounds enforced at the orchestrator boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Per-question tasks in flight per batch.
    pub max_concurrent_questions: usize,
    /// Concurrent calls into the embedding/rerank/generation capability.
    pub model_call_limit: usize,
    /// Chunk texts per embedding capability call.
    pub embed_batch_size: usize,
    /// Batch deadline; pending questions past it report a failure marker.
    pub batch_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_questions: 20,
            model_call_limit: 20,
            embed_batch_size: 32,
            batch_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub fusion: FusionConfig,
    pub bm25: Bm25Config,
    pub retrieval: RetrievalConfig,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration for the current `RUST_ENV`, falling back to
    /// defaults for anything the files and environment leave unset.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no component could honor.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 || self.chunking.overlap >= self.chunking.chunk_size {
            return Err(Error::InvalidInput(format!(
                "chunking overlap {} must be smaller than chunk_size {}",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        for (name, w) in [
            ("semantic_weight", self.fusion.semantic_weight),
            ("keyword_weight", self.fusion.keyword_weight),
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidInput(format!("{name} must be non-negative, got {w}")));
            }
        }
        if self.retrieval.final_top_k == 0 || self.retrieval.candidate_pool == 0 {
            return Err(Error::InvalidInput(
                "candidate_pool and final_top_k must be positive".to_string(),
            ));
        }
        if self.limits.max_concurrent_questions == 0
            || self.limits.model_call_limit == 0
            || self.limits.embed_batch_size == 0
        {
            return Err(Error::InvalidInput("concurrency limits must be positive".to_string()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
