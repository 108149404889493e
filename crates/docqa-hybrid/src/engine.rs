//! The retrieval engine: document preparation, per-question hybrid
//! retrieval, and the batch query orchestrator.
//!
//! One engine holds one immutable configuration snapshot, so a batch can
//! never observe a weight or threshold change mid-flight. Per-document
//! state (chunks, dense and sparse indexes) is built at most once per
//! fingerprint behind an async gate and then shared read-only across
//! concurrent questions. Capability calls go through rate-limited wrappers
//! so the embedding/rerank/generation cap is enforced here, at the
//! orchestrator boundary, not inside individual components.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use docqa_cache::EmbeddingCache;
use docqa_core::chunker;
use docqa_core::config::Config;
use docqa_core::error::{Error, Result};
use docqa_core::fingerprint;
use docqa_core::traits::{AnswerGenerator, DocumentLoader, Embedder, Reranker};
use docqa_core::types::{Chunk, RankedContext, RetrievalPlan, RetrievalResult, Strategy};
use docqa_text::SparseIndex;
use docqa_vector::DenseIndex;

use crate::{fusion, rerank, strategy};

/// Per-document retrieval state, read-only once built.
pub struct DocIndexes {
    pub chunks: Vec<Chunk>,
    pub dense: DenseIndex,
    pub sparse: SparseIndex,
}

pub enum PreparedBody {
    /// Small document: the whole text goes downstream, no indexes exist.
    FullText,
    Hybrid(Arc<DocIndexes>),
}

/// A document after ingestion: fingerprint, cached plan and (for the
/// hybrid path) its indexes.
pub struct PreparedDocument {
    pub fingerprint: String,
    pub text: String,
    pub plan: RetrievalPlan,
    pub body: PreparedBody,
}

/// Embedder wrapper that charges every capability call against the
/// engine's model-call semaphore.
struct RateLimitedEmbedder {
    inner: Arc<dyn Embedder>,
    permits: Arc<Semaphore>,
}

#[async_trait]
impl Embedder for RateLimitedEmbedder {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::ModelUnavailable("model permit pool closed".to_string()))?;
        self.inner.embed_batch(texts).await
    }
}

struct RateLimitedReranker {
    inner: Arc<dyn Reranker>,
    permits: Arc<Semaphore>,
}

#[async_trait]
impl Reranker for RateLimitedReranker {
    async fn score_pairs(&self, question: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::ModelUnavailable("model permit pool closed".to_string()))?;
        self.inner.score_pairs(question, candidates).await
    }
}

pub struct RetrievalEngine {
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    cache: EmbeddingCache,
    config: Config,
    model_permits: Arc<Semaphore>,
    question_permits: Arc<Semaphore>,
    prepared: StdMutex<HashMap<String, Arc<PreparedDocument>>>,
    gates: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RetrievalEngine {
    /// Build an engine around concrete capability adapters and one
    /// validated configuration snapshot.
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        config: Config,
    ) -> Result<Self> {
        config.validate()?;
        let cache = EmbeddingCache::from_config(&config.cache)?;
        let model_permits = Arc::new(Semaphore::new(config.limits.model_call_limit));
        let question_permits = Arc::new(Semaphore::new(config.limits.max_concurrent_questions));
        let embedder: Arc<dyn Embedder> = Arc::new(RateLimitedEmbedder {
            inner: embedder,
            permits: Arc::clone(&model_permits),
        });
        let reranker: Arc<dyn Reranker> = Arc::new(RateLimitedReranker {
            inner: reranker,
            permits: Arc::clone(&model_permits),
        });
        Ok(Self {
            loader,
            embedder,
            reranker,
            cache,
            config,
            model_permits,
            question_permits,
            prepared: StdMutex::new(HashMap::new()),
            gates: StdMutex::new(HashMap::new()),
        })
    }

    /// Ingestion entry point: acquire, fingerprint and plan the document.
    pub async fn prepare(&self, source: &str) -> Result<RetrievalPlan> {
        Ok(self.prepare_document(source).await?.plan.clone())
    }

    /// Retrieve context for every question, in question order. A failing
    /// question occupies its slot as a `Failed` marker; document-level
    /// failures (acquisition, embedding during index build) abort the
    /// whole batch instead.
    pub async fn retrieve(
        &self,
        source: &str,
        questions: &[String],
    ) -> Result<Vec<RetrievalResult>> {
        let document = self.prepare_document(source).await?;
        Ok(self.retrieve_prepared(&document, questions).await)
    }

    /// Retrieve against an already prepared document.
    pub async fn retrieve_prepared(
        &self,
        document: &PreparedDocument,
        questions: &[String],
    ) -> Vec<RetrievalResult> {
        let indexes = match &document.body {
            PreparedBody::FullText => {
                return questions.iter().map(|_| RetrievalResult::FullText).collect();
            }
            PreparedBody::Hybrid(indexes) => Arc::clone(indexes),
        };

        let timeout = Duration::from_secs(self.config.limits.batch_timeout_secs);
        let deadline = Instant::now() + timeout;
        let tasks = questions.iter().map(|question| {
            let indexes = Arc::clone(&indexes);
            async move {
                let work = async {
                    let _slot = self.question_permits.acquire().await.map_err(|_| {
                        Error::ModelUnavailable("question pool closed".to_string())
                    })?;
                    self.question_context(question, &indexes).await
                };
                match timeout_at(deadline, work).await {
                    Ok(Ok(context)) => RetrievalResult::Context(context),
                    Ok(Err(e)) => {
                        warn!(question = %question, error = %e, "question failed, batch continues");
                        RetrievalResult::Failed { error: e.to_string() }
                    }
                    Err(_) => RetrievalResult::Failed {
                        error: format!("batch timeout after {}s", timeout.as_secs()),
                    },
                }
            }
        });
        join_all(tasks).await
    }

    /// Retrieve context and drive the downstream answer generator, one
    /// answer per question in question order. Generation failures are
    /// captured per question as answer text, matching retrieval's
    /// isolation policy.
    pub async fn answer_batch(
        &self,
        source: &str,
        questions: &[String],
        generator: &dyn AnswerGenerator,
    ) -> Result<Vec<String>> {
        let document = self.prepare_document(source).await?;
        let results = self.retrieve_prepared(&document, questions).await;

        let document = &document;
        let tasks = questions.iter().zip(&results).map(|(question, result)| async move {
            let context = match result {
                RetrievalResult::FullText => document.text.clone(),
                RetrievalResult::Context(context) if !context.spans.is_empty() => {
                    context.spans.join("\n\n")
                }
                RetrievalResult::Context(_) | RetrievalResult::Failed { .. } => {
                    return "I couldn't find relevant information in the document to answer \
                            this question."
                        .to_string();
                }
            };
            let generated = async {
                let _permit = self.model_permits.acquire().await.map_err(|_| {
                    Error::ModelUnavailable("model permit pool closed".to_string())
                })?;
                generator.generate(question, &context).await
            }
            .await;
            match generated {
                Ok(answer) => answer,
                Err(e) => format!("Error: {e}"),
            }
        });
        Ok(join_all(tasks).await)
    }

    /// Load, fingerprint and plan `source`, building (or loading cached)
    /// chunk embeddings and indexes for the hybrid path. Single-flight per
    /// fingerprint: concurrent first access computes once.
    pub async fn prepare_document(&self, source: &str) -> Result<Arc<PreparedDocument>> {
        let text = self.loader.load_and_clean(source).await?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(format!("document {source} is empty")));
        }
        let doc_fingerprint = fingerprint::of(&text);

        if let Some(document) = self.prepared_lookup(&doc_fingerprint) {
            return Ok(document);
        }
        let gate = self.gate(&doc_fingerprint);
        let _guard = gate.lock().await;
        if let Some(document) = self.prepared_lookup(&doc_fingerprint) {
            return Ok(document);
        }

        let cached = self.cache.lookup(&doc_fingerprint).await.filter(|record| {
            record.plan.strategy == Strategy::FullText
                || record.embedder_id == self.embedder.id()
        });
        let record = match cached {
            Some(record) => {
                debug!(fingerprint = %doc_fingerprint, "reusing cached document record");
                record
            }
            None => {
                let estimated = chunker::estimate_tokens(&text);
                let plan = strategy::select_strategy(
                    estimated,
                    self.config.retrieval.small_doc_token_threshold,
                );
                info!(
                    fingerprint = %doc_fingerprint,
                    strategy = ?plan.strategy,
                    reason = %plan.reason,
                    "document planned"
                );
                match plan.strategy {
                    Strategy::FullText => {
                        self.cache
                            .store_plan(&doc_fingerprint, self.embedder.id(), plan)
                            .await?
                    }
                    Strategy::HybridRag => {
                        let mut chunks = chunker::chunk_text(&text, &self.config.chunking)?;
                        for chunk in &mut chunks {
                            chunk
                                .source_metadata
                                .insert("source".to_string(), source.to_string());
                        }
                        self.cache
                            .get_or_compute(
                                &doc_fingerprint,
                                plan,
                                chunks,
                                self.embedder.as_ref(),
                                self.config.limits.embed_batch_size,
                            )
                            .await?
                    }
                }
            }
        };

        let body = match record.plan.strategy {
            Strategy::FullText => PreparedBody::FullText,
            Strategy::HybridRag => {
                let dense = DenseIndex::build(record.embeddings.clone(), self.embedder.dim())?;
                let sparse = SparseIndex::build(&record.chunks, self.config.bm25);
                PreparedBody::Hybrid(Arc::new(DocIndexes {
                    chunks: record.chunks.clone(),
                    dense,
                    sparse,
                }))
            }
        };
        let document = Arc::new(PreparedDocument {
            fingerprint: doc_fingerprint.clone(),
            text,
            plan: record.plan.clone(),
            body,
        });
        self.prepared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(doc_fingerprint, Arc::clone(&document));
        Ok(document)
    }

    /// One question through the hybrid pipeline: embed, query both
    /// indexes, fuse, rerank.
    async fn question_context(
        &self,
        question: &str,
        indexes: &DocIndexes,
    ) -> Result<RankedContext> {
        let pool = self.config.retrieval.candidate_pool;

        let embedded = self.embedder.embed_batch(&[question.to_string()]).await?;
        let query_vector = embedded.into_iter().next().ok_or_else(|| {
            Error::ModelUnavailable("embedder returned no vector for the question".to_string())
        })?;

        let dense_hits = indexes.dense.search(&query_vector, pool)?;
        let sparse_hits = indexes.sparse.top_k(question, pool);

        let mut fused = fusion::fuse(&dense_hits, &sparse_hits, &self.config.fusion)?;
        fused.truncate(pool);
        let texts: Vec<String> =
            fused.iter().map(|c| indexes.chunks[c.chunk_index].text.clone()).collect();

        let (candidates, rerank_fallback) = rerank::rerank_candidates(
            self.reranker.as_ref(),
            question,
            fused,
            &texts,
            self.config.retrieval.final_top_k,
        )
        .await;

        let spans =
            candidates.iter().map(|c| indexes.chunks[c.chunk_index].text.clone()).collect();
        Ok(RankedContext { candidates, spans, rerank_fallback })
    }

    fn prepared_lookup(&self, doc_fingerprint: &str) -> Option<Arc<PreparedDocument>> {
        self.prepared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(doc_fingerprint)
            .cloned()
    }

    fn gate(&self, doc_fingerprint: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(doc_fingerprint.to_string()).or_default().clone()
    }
}
