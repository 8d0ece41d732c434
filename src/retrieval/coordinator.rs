//! Strategy selection and evidence assembly.
//!
//! The coordinator scores query complexity to choose between one-pass
//! hybrid retrieval and the multi-hop loop. A correlation id always forces
//! single-hop so session-scoped log evidence is read directly. The
//! session-log cache is request-scoped and passed in explicitly by the
//! caller; the coordinator itself keeps no mutable state, so concurrent
//! investigations with different correlation ids cannot race on it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::multihop::{MultiHopConfig, MultiHopRetriever};
use super::rerank::Reranker;
use super::ScoredDocument;
use crate::config::RetrievalConfig;
use crate::error::RetrievalResult;
use crate::sources::{EmbeddingProvider, LogEntry, LogSource, VectorStore};

/// Retrieval strategy chosen for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// One retrieval pass over logs plus the knowledge index.
    SingleHop,
    /// Iterative query-expanding retrieval.
    MultiHop,
}

/// Request-scoped cache of session-log documents, keyed by correlation id.
///
/// One investigation owns one cache; it is never shared across requests.
#[derive(Debug, Default)]
pub struct LogCache {
    cached: Option<(String, Vec<ScoredDocument>)>,
}

impl LogCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, correlation_id: &str) -> Option<Vec<ScoredDocument>> {
        self.cached
            .as_ref()
            .filter(|(id, _)| id == correlation_id)
            .map(|(_, docs)| docs.clone())
    }

    fn store(&mut self, correlation_id: &str, docs: Vec<ScoredDocument>) {
        self.cached = Some((correlation_id.to_string(), docs));
    }
}

/// Chooses a retrieval strategy and assembles reranked evidence.
pub struct RagCoordinator {
    logs: Arc<dyn LogSource>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    reranker: Reranker,
    multihop: MultiHopRetriever,
    config: RetrievalConfig,
}

impl RagCoordinator {
    /// Create a coordinator over the given capabilities.
    pub fn new(
        logs: Arc<dyn LogSource>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        reranker: Reranker,
        config: RetrievalConfig,
    ) -> Self {
        let multihop = MultiHopRetriever::new(
            embedder.clone(),
            vectors.clone(),
            reranker.clone(),
            config.collection.clone(),
            MultiHopConfig::default(),
        );
        Self {
            logs,
            vectors,
            embedder,
            reranker,
            multihop,
            config,
        }
    }

    /// Pick the strategy for `query`.
    ///
    /// A present correlation id forces single-hop regardless of
    /// complexity; otherwise multi-hop is used when the complexity score
    /// clears the configured threshold and multi-hop is enabled.
    pub fn select_strategy(
        &self,
        query: &str,
        correlation_id: Option<&str>,
    ) -> RetrievalStrategy {
        if correlation_id.is_some_and(|id| !id.is_empty()) {
            return RetrievalStrategy::SingleHop;
        }
        let complexity = complexity_score(query);
        if self.config.multi_hop_enabled && complexity >= self.config.complexity_threshold {
            RetrievalStrategy::MultiHop
        } else {
            RetrievalStrategy::SingleHop
        }
    }

    /// Gather evidence for `query`, truncated to `max_docs`.
    pub async fn retrieve(
        &self,
        query: &str,
        correlation_id: Option<&str>,
        max_docs: usize,
        cache: &mut LogCache,
    ) -> RetrievalResult<Vec<ScoredDocument>> {
        let strategy = self.select_strategy(query, correlation_id);
        debug!(
            ?strategy,
            complexity = complexity_score(query),
            has_correlation_id = correlation_id.is_some(),
            "retrieval strategy selected"
        );

        match strategy {
            RetrievalStrategy::SingleHop => {
                self.single_hop(query, correlation_id, max_docs, cache).await
            }
            RetrievalStrategy::MultiHop => {
                let outcome = self.multihop.retrieve(query).await?;
                let mut docs = outcome.documents;
                docs.truncate(max_docs);
                Ok(docs)
            }
        }
    }

    async fn single_hop(
        &self,
        query: &str,
        correlation_id: Option<&str>,
        max_docs: usize,
        cache: &mut LogCache,
    ) -> RetrievalResult<Vec<ScoredDocument>> {
        let mut candidates = match correlation_id.filter(|id| !id.is_empty()) {
            Some(cid) => match cache.lookup(cid) {
                Some(docs) => {
                    debug!(correlation_id = %cid, "session logs served from cache");
                    docs
                }
                None => {
                    let entries = self.logs.by_correlation_id(cid).await?;
                    let docs: Vec<ScoredDocument> = entries
                        .iter()
                        .map(|e| log_document(e, 0.95, "log_file"))
                        .collect();
                    cache.store(cid, docs.clone());
                    docs
                }
            },
            None => {
                let entries = self.logs.recent(self.config.recent_log_window).await?;
                entries
                    .iter()
                    .filter(|e| e.level.is_noteworthy())
                    .map(|e| log_document(e, 0.7, "recent_logs"))
                    .collect()
            }
        };

        // Knowledge search is supplementary: its failure never fails the pass.
        match self.knowledge_search(query).await {
            Ok(docs) => candidates.extend(docs),
            Err(e) => {
                warn!(error = %e, "knowledge search failed, continuing with log evidence");
            }
        }

        let reranked = self.reranker.rerank(query, candidates, max_docs);
        info!(
            documents = reranked.len(),
            correlation_id = correlation_id.unwrap_or(""),
            "single-hop retrieval finished"
        );
        Ok(reranked)
    }

    async fn knowledge_search(&self, query: &str) -> RetrievalResult<Vec<ScoredDocument>> {
        let vector = self.embedder.embed(query).await?;
        if vector.is_empty() {
            debug!("embedding unavailable, skipping knowledge search");
            return Ok(Vec::new());
        }

        let hits = self
            .vectors
            .search(
                &self.config.collection,
                &vector,
                self.config.vector_search_limit,
            )
            .await?;

        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let content = hit.payload.get("content")?.clone();
                let mut doc = ScoredDocument::new(content, hit.score);
                doc.metadata.insert("id".to_string(), hit.id);
                for (key, value) in hit.payload {
                    if key != "content" {
                        doc.metadata.entry(key).or_insert(value);
                    }
                }
                doc.metadata
                    .insert("source".to_string(), "vector_db".to_string());
                Some(doc)
            })
            .collect())
    }
}

fn log_document(entry: &LogEntry, score: f64, source: &str) -> ScoredDocument {
    ScoredDocument::new(entry.message.clone(), score)
        .with_tag("source", source)
        .with_tag("timestamp", entry.timestamp.to_rfc3339())
        .with_tag("level", entry.level.as_str())
}

/// Complexity of a query in [0.0, 1.0].
///
/// Word count, interrogative/explanatory cues, and multi-clause
/// conjunctions each add weight; the sum is clamped.
pub fn complexity_score(query: &str) -> f64 {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut score: f64 = 0.0;
    if words.len() > 10 {
        score += 0.3;
    } else if words.len() > 5 {
        score += 0.15;
    }

    let has_cue = words
        .iter()
        .any(|w| matches!(*w, "why" | "how" | "explain") || w.starts_with("cause") || w.starts_with("reason"))
        || lower.contains("what if");
    if has_cue {
        score += 0.4;
    }

    let has_conjunction = words
        .iter()
        .any(|w| matches!(*w, "and" | "or" | "but" | "after" | "before"));
    if has_conjunction {
        score += 0.3;
    }

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{HashingEmbedder, InMemoryVectorStore, LogLevel, StaticLogSource};
    use chrono::Utc;

    fn entry(message: &str, level: LogLevel) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
        }
    }

    fn coordinator_with(
        logs: StaticLogSource,
        config: RetrievalConfig,
    ) -> RagCoordinator {
        RagCoordinator::new(
            Arc::new(logs),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(HashingEmbedder::default()),
            Reranker::lexical(),
            config,
        )
    }

    #[test]
    fn test_complexity_score_bounds() {
        for query in [
            "",
            "show logs",
            "why",
            "Why did the service fail and what caused the timeout after the deploy?",
            &"word ".repeat(50),
        ] {
            let score = complexity_score(query);
            assert!((0.0..=1.0).contains(&score), "{query:?} -> {score}");
        }
    }

    #[test]
    fn test_complexity_orders_simple_below_complex() {
        let complex =
            complexity_score("Why did the service fail and what caused the timeout after the deploy?");
        let simple = complexity_score("show logs");
        assert!(complex > simple);
        assert!((complex - 1.0).abs() < f64::EPSILON);
        assert!((simple - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_complexity_word_count_tiers() {
        // 6 words, no cues or conjunctions.
        let medium = complexity_score("service latency spiked during nightly maintenance");
        assert!((medium - 0.15).abs() < 1e-9);
        // 11 words, no cues or conjunctions.
        let long = complexity_score(
            "service latency spiked during nightly maintenance across three regions last week",
        );
        assert!((long - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_id_forces_single_hop() {
        let coordinator = coordinator_with(StaticLogSource::new(), RetrievalConfig::default());
        let complex_query = "Why did the service fail and what caused the timeout after the deploy?";
        assert_eq!(
            coordinator.select_strategy(complex_query, Some("req-42")),
            RetrievalStrategy::SingleHop
        );
        assert_eq!(
            coordinator.select_strategy(complex_query, None),
            RetrievalStrategy::MultiHop
        );
    }

    #[test]
    fn test_empty_correlation_id_does_not_force_single_hop() {
        let coordinator = coordinator_with(StaticLogSource::new(), RetrievalConfig::default());
        let complex_query = "Why did the service fail and what caused the timeout after the deploy?";
        assert_eq!(
            coordinator.select_strategy(complex_query, Some("")),
            RetrievalStrategy::MultiHop
        );
    }

    #[test]
    fn test_multi_hop_disabled_always_single_hop() {
        let config = RetrievalConfig {
            multi_hop_enabled: false,
            ..RetrievalConfig::default()
        };
        let coordinator = coordinator_with(StaticLogSource::new(), config);
        assert_eq!(
            coordinator.select_strategy("Why did everything break and how?", None),
            RetrievalStrategy::SingleHop
        );
    }

    #[tokio::test]
    async fn test_single_hop_converts_session_logs() {
        let mut logs = StaticLogSource::new();
        logs.push_correlated("req-1", entry("db timeout on write", LogLevel::Error));
        logs.push_correlated("req-1", entry("retry exhausted for db write", LogLevel::Error));
        let coordinator = coordinator_with(logs, RetrievalConfig::default());

        let mut cache = LogCache::new();
        let docs = coordinator
            .retrieve("db timeout", Some("req-1"), 10, &mut cache)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert_eq!(doc.source(), Some("log_file"));
        }
    }

    #[tokio::test]
    async fn test_single_hop_filters_recent_logs_by_level() {
        let mut logs = StaticLogSource::new();
        logs.push(entry("all good", LogLevel::Info));
        logs.push(entry("disk usage at 91 percent", LogLevel::Warning));
        logs.push(entry("write failed", LogLevel::Error));
        logs.push(entry("debug noise", LogLevel::Debug));
        let coordinator = coordinator_with(logs, RetrievalConfig::default());

        let mut cache = LogCache::new();
        let docs = coordinator
            .retrieve("disk write", None, 10, &mut cache)
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert_eq!(doc.source(), Some("recent_logs"));
        }
    }

    #[tokio::test]
    async fn test_log_cache_serves_repeat_lookups() {
        let mut logs = StaticLogSource::new();
        logs.push_correlated("req-9", entry("boom", LogLevel::Fatal));
        let coordinator = coordinator_with(logs, RetrievalConfig::default());

        let mut cache = LogCache::new();
        let first = coordinator
            .retrieve("boom", Some("req-9"), 10, &mut cache)
            .await
            .unwrap();
        let second = coordinator
            .retrieve("boom", Some("req-9"), 10, &mut cache)
            .await
            .unwrap();

        assert_eq!(first.len(), second.len());
        assert!(cache.lookup("req-9").is_some());
        assert!(cache.lookup("req-other").is_none());
    }

    #[tokio::test]
    async fn test_retrieve_truncates_to_max_docs() {
        let mut logs = StaticLogSource::new();
        for i in 0..10 {
            logs.push_correlated("req-1", entry(&format!("failure {i}"), LogLevel::Error));
        }
        let coordinator = coordinator_with(logs, RetrievalConfig::default());

        let mut cache = LogCache::new();
        let docs = coordinator
            .retrieve("failure", Some("req-1"), 3, &mut cache)
            .await
            .unwrap();
        assert_eq!(docs.len(), 3);
    }
}
