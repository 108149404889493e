//! Fingerprint-keyed embedding store with single-flight computation and
//! write-time eviction.
//!
//! Concurrency contract: at most one computation in flight per
//! fingerprint. A per-fingerprint async gate serializes callers; whoever
//! enters second finds the freshly written record and returns it without
//! touching the embedder. Integrity failures on read (unparseable file,
//! chunk/embedding count mismatch) degrade to a cache miss and
//! recomputation, never to a propagated error.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use docqa_core::config::CacheConfig;
use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, RetrievalPlan};

use crate::record::CacheRecord;

pub struct EmbeddingCache {
    dir: PathBuf,
    ttl_hours: u64,
    max_total_bytes: u64,
    gates: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EmbeddingCache {
    pub fn new(dir: PathBuf, ttl_hours: u64, max_total_bytes: u64) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, ttl_hours, max_total_bytes, gates: StdMutex::new(HashMap::new()) })
    }

    pub fn from_config(cfg: &CacheConfig) -> Result<Self> {
        Self::new(cfg.expanded_dir(), cfg.ttl_hours, cfg.max_size_bytes())
    }

    /// Return the valid record for `fingerprint`, if any. Expired or
    /// corrupt records are dropped here and report as a miss.
    pub async fn lookup(&self, fingerprint: &str) -> Option<Arc<CacheRecord>> {
        let gate = self.gate(fingerprint);
        let _guard = gate.lock().await;
        self.read_valid(fingerprint, None)
    }

    /// Get the cached embeddings for `fingerprint`, or compute them once.
    ///
    /// The embedder is called in batches of `batch_size` chunks; callers
    /// racing on the same fingerprint share the single computation. The
    /// caller's `plan` is persisted with a fresh record; an existing
    /// record keeps its cached decision.
    pub async fn get_or_compute(
        &self,
        fingerprint: &str,
        plan: RetrievalPlan,
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Arc<CacheRecord>> {
        let gate = self.gate(fingerprint);
        let _guard = gate.lock().await;

        if let Some(record) = self.read_valid(fingerprint, Some(chunks.len())) {
            if record.embedder_id == embedder.id() {
                debug!(fingerprint, chunks = record.chunks.len(), "embedding cache hit");
                return Ok(record);
            }
            debug!(fingerprint, "embedder changed, recomputing");
        }
        debug!(fingerprint, chunks = chunks.len(), "embedding cache miss, computing");

        let mut embeddings = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            embeddings.extend(vectors);
        }
        if embeddings.len() != chunks.len() {
            return Err(Error::ModelUnavailable(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        for (i, v) in embeddings.iter().enumerate() {
            if v.len() != embedder.dim() {
                return Err(Error::ModelUnavailable(format!(
                    "embedding {} has {} components, expected {}",
                    i,
                    v.len(),
                    embedder.dim()
                )));
            }
        }

        let record = CacheRecord {
            fingerprint: fingerprint.to_string(),
            embedder_id: embedder.id().to_string(),
            plan,
            chunks,
            embeddings,
            created_at: Utc::now().timestamp_millis(),
            size_bytes: 0,
        };
        self.write(record)
    }

    /// Persist a plan-only record for a document that bypasses retrieval.
    pub async fn store_plan(
        &self,
        fingerprint: &str,
        embedder_id: &str,
        plan: RetrievalPlan,
    ) -> Result<Arc<CacheRecord>> {
        let gate = self.gate(fingerprint);
        let _guard = gate.lock().await;

        if let Some(record) = self.read_valid(fingerprint, None) {
            return Ok(record);
        }
        let record = CacheRecord {
            fingerprint: fingerprint.to_string(),
            embedder_id: embedder_id.to_string(),
            plan,
            chunks: Vec::new(),
            embeddings: Vec::new(),
            created_at: Utc::now().timestamp_millis(),
            size_bytes: 0,
        };
        self.write(record)
    }

    fn gate(&self, fingerprint: &str) -> Arc<AsyncMutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(fingerprint.to_string()).or_default().clone()
    }

    fn record_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }

    fn read_valid(
        &self,
        fingerprint: &str,
        expected_chunks: Option<usize>,
    ) -> Option<Arc<CacheRecord>> {
        let path = self.record_path(fingerprint);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(fingerprint, error = %e, "unreadable cache record, treating as miss");
                return None;
            }
        };
        let mut record: CacheRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                let err = Error::CacheIntegrity(format!("{fingerprint}: {e}"));
                warn!(error = %err, "dropping unparseable cache record");
                self.remove_record(&path);
                return None;
            }
        };
        record.size_bytes = bytes.len() as u64;

        if !record.is_consistent() {
            let err = Error::CacheIntegrity(format!(
                "{fingerprint}: {} chunks vs {} embeddings",
                record.chunks.len(),
                record.embeddings.len()
            ));
            warn!(error = %err, "dropping inconsistent cache record");
            self.remove_record(&path);
            return None;
        }
        if let Some(expected) = expected_chunks {
            if !record.chunks.is_empty() && record.chunks.len() != expected {
                let err = Error::CacheIntegrity(format!(
                    "{fingerprint}: record has {} chunks, document has {}",
                    record.chunks.len(),
                    expected
                ));
                warn!(error = %err, "dropping stale cache record");
                self.remove_record(&path);
                return None;
            }
        }
        if record.is_expired(self.ttl_hours, Utc::now().timestamp_millis()) {
            debug!(fingerprint, "cache record expired");
            self.remove_record(&path);
            return None;
        }
        Some(Arc::new(record))
    }

    fn remove_record(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove cache record");
        }
    }

    fn write(&self, mut record: CacheRecord) -> Result<Arc<CacheRecord>> {
        let body = serde_json::to_vec(&record)?;
        self.evict_for(body.len() as u64)?;
        fs::write(self.record_path(&record.fingerprint), &body)?;
        record.size_bytes = body.len() as u64;
        debug!(
            fingerprint = %record.fingerprint,
            bytes = record.size_bytes,
            "cache record written"
        );
        Ok(Arc::new(record))
    }

    /// Write-time eviction: expired records go first, then oldest records
    /// (by write time) until `incoming` bytes fit under the size bound.
    fn evict_for(&self, incoming: u64) -> Result<()> {
        let ttl = Duration::from_secs(self.ttl_hours * 3600);
        let now = SystemTime::now();

        let mut entries: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
        for entry in walkdir::WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("json"))
        {
            let Ok(meta) = entry.metadata() else { continue };
            let Ok(modified) = meta.modified() else { continue };
            entries.push((entry.into_path(), meta.len(), modified));
        }

        let mut total: u64 = 0;
        let mut live = Vec::with_capacity(entries.len());
        for (path, len, modified) in entries {
            let age = now.duration_since(modified).unwrap_or_default();
            if age >= ttl {
                debug!(path = %path.display(), "evicting expired cache record");
                self.remove_record(&path);
            } else {
                total += len;
                live.push((path, len, modified));
            }
        }

        live.sort_by_key(|&(_, _, modified)| modified);
        let mut oldest_first = live.into_iter();
        while total.saturating_add(incoming) > self.max_total_bytes {
            let Some((path, len, _)) = oldest_first.next() else { break };
            debug!(path = %path.display(), bytes = len, "evicting cache record for space");
            self.remove_record(&path);
            total -= len;
        }
        Ok(())
    }
}
