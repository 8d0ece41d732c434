//! In-memory implementations of the external capability contracts.
//!
//! These back the CLI's local mode (investigating a log file on disk
//! without external services) and double as deterministic test fixtures.
//! The embedder hashes tokens into a fixed-width vector, so similar texts
//! land near each other without any model download.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{EmbeddingProvider, LogEntry, LogSource, VectorHit, VectorStore};
use crate::error::{RetrievalError, RetrievalResult};

/// Log source over a fixed set of entries, keyed by correlation id.
#[derive(Debug, Default)]
pub struct StaticLogSource {
    by_correlation: HashMap<String, Vec<LogEntry>>,
    stream: Vec<LogEntry>,
}

impl StaticLogSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the uncorrelated recent-log stream.
    pub fn push(&mut self, entry: LogEntry) {
        self.stream.push(entry);
    }

    /// Add an entry under a correlation id (also visible in the stream).
    pub fn push_correlated(&mut self, correlation_id: &str, entry: LogEntry) {
        self.by_correlation
            .entry(correlation_id.to_string())
            .or_default()
            .push(entry.clone());
        self.stream.push(entry);
    }
}

#[async_trait]
impl LogSource for StaticLogSource {
    async fn by_correlation_id(&self, correlation_id: &str) -> RetrievalResult<Vec<LogEntry>> {
        Ok(self
            .by_correlation
            .get(correlation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RetrievalResult<Vec<LogEntry>> {
        Ok(self
            .stream
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect())
    }

    async fn recent(&self, n: usize) -> RetrievalResult<Vec<LogEntry>> {
        let skip = self.stream.len().saturating_sub(n);
        Ok(self.stream.iter().skip(skip).cloned().collect())
    }
}

struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: HashMap<String, String>,
}

/// Brute-force cosine-similarity vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<StoredPoint>>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> RetrievalResult<Vec<VectorHit>> {
        let collections = self.collections.read().map_err(|_| {
            RetrievalError::VectorStore {
                message: "store lock poisoned".to_string(),
            }
        })?;

        let Some(points) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = points
            .iter()
            .map(|p| VectorHit {
                id: p.id.clone(),
                score: cosine(vector, &p.vector).clamp(0.0, 1.0),
                payload: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        payload: HashMap<String, String>,
    ) -> RetrievalResult<()> {
        let mut collections = self.collections.write().map_err(|_| {
            RetrievalError::VectorStore {
                message: "store lock poisoned".to_string(),
            }
        })?;

        let points = collections.entry(collection.to_string()).or_default();
        points.retain(|p| p.id != id);
        points.push(StoredPoint {
            id: id.to_string(),
            vector: vector.to_vec(),
            payload,
        });
        Ok(())
    }
}

/// Deterministic token-hash embedder.
///
/// Each lowercase token is hashed into one of `dim` buckets; the bucket
/// counts form the vector, L2-normalized. Texts sharing vocabulary get
/// high cosine similarity, which is enough for local mode and tests.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of the given width.
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];
        let mut any = false;
        for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            any = true;
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % self.dim;
            vector[bucket] += 1.0;
        }
        if !any {
            // Empty vector is the documented soft-failure signal.
            return Ok(Vec::new());
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
