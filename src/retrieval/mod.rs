//! Evidence retrieval: strategy selection, single/multi-hop execution,
//! and relevance reranking.
//!
//! The [`RagCoordinator`] is the entry point: it scores query complexity,
//! picks a strategy, and assembles a reranked evidence set from the log
//! source and the vector store. Multi-hop retrieval with query expansion
//! lives in [`MultiHopRetriever`]; relevance scoring in [`Reranker`].

mod coordinator;
mod multihop;
mod rerank;

pub use coordinator::{LogCache, RagCoordinator, RetrievalStrategy};
pub use multihop::{HopTrace, MultiHopConfig, MultiHopOutcome, MultiHopRetriever};
pub use rerank::{RelevanceModel, Reranker};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One scored, metadata-tagged unit of retrieved evidence.
///
/// Immutable value type: produced by retrieval, consumed by reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The document text.
    pub content: String,
    /// Relevance in [0.0, 1.0].
    pub score: f64,
    /// Provenance tags: `source`, `timestamp`, `level`, `id`.
    pub metadata: HashMap<String, String>,
}

impl ScoredDocument {
    /// Create a document with a clamped score and no metadata.
    pub fn new(content: impl Into<String>, score: f64) -> Self {
        Self {
            content: content.into(),
            score: score.clamp(0.0, 1.0),
            metadata: HashMap::new(),
        }
    }

    /// Attach one metadata tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` tag, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scored_document_clamps_score() {
        assert!((ScoredDocument::new("a", 1.7).score - 1.0).abs() < f64::EPSILON);
        assert!((ScoredDocument::new("b", -0.2).score - 0.0).abs() < f64::EPSILON);
        assert!((ScoredDocument::new("c", 0.42).score - 0.42).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scored_document_tags() {
        let doc = ScoredDocument::new("db timeout", 0.9)
            .with_tag("source", "log_file")
            .with_tag("level", "error");
        assert_eq!(doc.source(), Some("log_file"));
        assert_eq!(doc.metadata.get("level").map(String::as_str), Some("error"));
    }
}
