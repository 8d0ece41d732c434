//! Iterative multi-hop retrieval with query expansion and early stopping.
//!
//! Each hop embeds the current query, searches the vector store, drops
//! candidates already returned by earlier hops, reranks what is left, and
//! keeps the top-K. The hop loop stops early when a hop finds nothing new
//! or when the best reranked score clears the confidence threshold;
//! otherwise the next hop's query is the current query extended with
//! high-frequency terms from the best document so far.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::rerank::Reranker;
use super::ScoredDocument;
use crate::error::RetrievalResult;
use crate::sources::{EmbeddingProvider, VectorStore};

/// Words never used for query expansion.
const STOPWORDS: &[&str] = &[
    "the", "this", "that", "with", "from", "have", "been", "were", "they", "their", "would",
    "could", "should", "about", "which", "there", "these", "those", "then", "than", "when",
    "where", "what", "will", "your", "into", "over", "under", "after", "before", "because",
    "while", "does", "here",
];

/// Tuning knobs for the hop loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiHopConfig {
    /// Maximum number of hops.
    pub max_hops: usize,
    /// Vector-search candidate limit per hop.
    pub candidates_per_hop: usize,
    /// Reranked candidates kept per hop.
    pub top_k_per_hop: usize,
    /// Top reranked score at which the loop stops early.
    pub confidence_threshold: f64,
}

impl Default for MultiHopConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            candidates_per_hop: 20,
            top_k_per_hop: 5,
            confidence_threshold: 0.7,
        }
    }
}

/// Record of one executed hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopTrace {
    /// 1-based hop number.
    pub hop: usize,
    /// The query text used for this hop.
    pub query: String,
    /// New (not previously seen) candidates found.
    pub candidate_count: usize,
    /// Candidates kept after reranking.
    pub kept_count: usize,
}

/// Accumulated documents plus the per-hop trace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiHopOutcome {
    /// All documents kept across hops, in hop order.
    pub documents: Vec<ScoredDocument>,
    /// One entry per executed hop.
    pub hops: Vec<HopTrace>,
}

/// Iterative retriever over an embedding provider and a vector store.
pub struct MultiHopRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    reranker: Reranker,
    collection: String,
    config: MultiHopConfig,
}

impl MultiHopRetriever {
    /// Create a retriever over the given capabilities and collection.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        reranker: Reranker,
        collection: impl Into<String>,
        config: MultiHopConfig,
    ) -> Self {
        Self {
            embedder,
            vectors,
            reranker,
            collection: collection.into(),
            config,
        }
    }

    /// Run the hop loop for `query`.
    pub async fn retrieve(&self, query: &str) -> RetrievalResult<MultiHopOutcome> {
        let mut outcome = MultiHopOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut current_query = query.to_string();

        for hop in 1..=self.config.max_hops {
            let vector = self.embedder.embed(&current_query).await?;
            if vector.is_empty() {
                // Soft embedding failure: nothing searchable, keep what we have.
                debug!(hop, "embedding unavailable, stopping hop loop");
                break;
            }

            let hits = self
                .vectors
                .search(&self.collection, &vector, self.config.candidates_per_hop)
                .await?;

            let candidates: Vec<ScoredDocument> = hits
                .into_iter()
                .filter_map(|hit| {
                    let content = hit.payload.get("content")?.clone();
                    if seen.contains(&content) {
                        return None;
                    }
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
                .collect();

            if candidates.is_empty() {
                outcome.hops.push(HopTrace {
                    hop,
                    query: current_query.clone(),
                    candidate_count: 0,
                    kept_count: 0,
                });
                debug!(hop, "no new candidates, stopping hop loop");
                break;
            }

            let candidate_count = candidates.len();
            let kept = self
                .reranker
                .rerank(&current_query, candidates, self.config.top_k_per_hop);

            outcome.hops.push(HopTrace {
                hop,
                query: current_query.clone(),
                candidate_count,
                kept_count: kept.len(),
            });

            let top_score = kept.first().map(|d| d.score).unwrap_or(0.0);
            let best_content = kept.first().map(|d| d.content.clone());
            for doc in &kept {
                seen.insert(doc.content.clone());
            }
            outcome.documents.extend(kept);

            if top_score >= self.config.confidence_threshold {
                debug!(hop, top_score, "confidence threshold met, stopping early");
                break;
            }

            if hop < self.config.max_hops {
                if let Some(best) = best_content {
                    current_query = expand_query(&current_query, &best);
                }
            }
        }

        info!(
            hops = outcome.hops.len(),
            documents = outcome.documents.len(),
            "multi-hop retrieval finished"
        );
        Ok(outcome)
    }
}

/// Extend `query` with up to 3 high-frequency non-stopword tokens from
/// the given document text.
fn expand_query(query: &str, document: &str) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in document
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
    {
        if token.len() > 3 && !STOPWORDS.contains(&token) {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut expanded = query.to_string();
    for (token, _) in ranked.into_iter().take(3) {
        expanded.push(' ');
        expanded.push_str(&token);
    }
    expanded
}
