//! Relevance reranking over retrieved candidates.
//!
//! The primary path scores (query, document) pairs through a learned
//! cross-encoder-style model behind the [`RelevanceModel`] trait, squashing
//! its raw output through a logistic. Whenever no model is configured, or
//! the model errors on a pair, scoring falls back to a lexical coverage
//! heuristic that needs no model at all.

use std::sync::Arc;

use tracing::debug;

use super::ScoredDocument;
use crate::error::RetrievalResult;

/// Learned relevance scorer over a concatenated (query, document) pair.
///
/// Returns a raw score (a logit); the reranker squashes and clamps it.
#[cfg_attr(test, mockall::automock)]
pub trait RelevanceModel: Send + Sync {
    /// Score one pair. Errors route the pair to the lexical fallback.
    fn score_pair(&self, query: &str, document: &str) -> RetrievalResult<f64>;
}

/// Scores and reorders candidates by relevance to a query.
#[derive(Clone, Default)]
pub struct Reranker {
    model: Option<Arc<dyn RelevanceModel>>,
}

impl Reranker {
    /// Reranker using only the lexical fallback.
    pub fn lexical() -> Self {
        Self { model: None }
    }

    /// Reranker backed by a learned relevance model.
    pub fn with_model(model: Arc<dyn RelevanceModel>) -> Self {
        Self { model: Some(model) }
    }

    /// Relevance of `document` to `query`, always in [0.0, 1.0].
    pub fn score(&self, query: &str, document: &str) -> f64 {
        if let Some(model) = &self.model {
            match model.score_pair(query, document) {
                Ok(raw) => return logistic(raw).clamp(0.0, 1.0),
                Err(e) => {
                    debug!(error = %e, "relevance model failed, using lexical fallback");
                }
            }
        }
        lexical_score(query, document)
    }

    /// Top-`top_k` candidates sorted descending by score.
    ///
    /// An empty candidate list yields an empty result, never an error.
    pub fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredDocument>,
        top_k: usize,
    ) -> Vec<ScoredDocument> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut rescored: Vec<ScoredDocument> = candidates
            .into_iter()
            .map(|mut doc| {
                doc.score = self.score(query, &doc.content);
                doc
            })
            .collect();

        rescored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rescored.truncate(top_k);
        rescored
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Lexical fallback: substring coverage of query words, blended with a
/// mild preference for shorter documents.
fn lexical_score(query: &str, document: &str) -> f64 {
    let doc_lower = document.to_lowercase();
    let words: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2)
        .map(str::to_string)
        .collect();

    if words.is_empty() || document.is_empty() {
        return 0.0;
    }

    let matched = words.iter().filter(|w| doc_lower.contains(w.as_str())).count();
    let coverage = matched as f64 / words.len() as f64;
    let length_factor = (500.0 / document.len() as f64).min(1.0);

    (0.7 * coverage + 0.3 * length_factor).clamp(0.0, 1.0)
}
