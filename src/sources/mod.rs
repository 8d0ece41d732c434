//! External capability contracts consumed by the investigation pipeline.
//!
//! Log storage, vector indexing, and embedding computation are external
//! collaborators. This module pins down their interface boundary; the
//! in-memory implementations in [`memory`] back the CLI's local mode and
//! the test suite.

mod memory;

pub use memory::{HashingEmbedder, InMemoryVectorStore, StaticLogSource};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetrievalResult;

/// One log record from the operational log store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was emitted.
    pub timestamp: DateTime<Utc>,
    /// Severity of the entry.
    pub level: LogLevel,
    /// The raw log message.
    pub message: String,
}

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl LogLevel {
    /// Parses a level string (case-insensitive). Unknown strings map to `Info`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warning,
            "error" | "err" => Self::Error,
            "critical" => Self::Critical,
            "fatal" => Self::Fatal,
            _ => Self::Info,
        }
    }

    /// Returns `true` for Warning, Error, Critical, and Fatal entries.
    pub fn is_noteworthy(self) -> bool {
        matches!(
            self,
            Self::Warning | Self::Error | Self::Critical | Self::Fatal
        )
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Fatal => "fatal",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One similarity-search hit from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    /// Stable identifier of the stored point.
    pub id: String,
    /// Similarity score reported by the store.
    pub score: f64,
    /// Stored payload; document text lives under the `content` key.
    pub payload: HashMap<String, String>,
}

/// Source of operational log evidence.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// All entries recorded under the given correlation id.
    async fn by_correlation_id(&self, correlation_id: &str) -> RetrievalResult<Vec<LogEntry>>;

    /// Entries within the given time range.
    async fn by_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RetrievalResult<Vec<LogEntry>>;

    /// The most recent `n` entries.
    async fn recent(&self, n: usize) -> RetrievalResult<Vec<LogEntry>>;
}

/// Similarity index over knowledge/runbook documents.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest-neighbor search in a collection.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> RetrievalResult<Vec<VectorHit>>;

    /// Insert or replace a point.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        payload: HashMap<String, String>,
    ) -> RetrievalResult<()>;
}

/// Text embedding capability.
///
/// An empty vector signals a soft failure: callers skip the dependent
/// search instead of failing the pipeline.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed the given text. Empty result means "skip, don't fail".
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>>;
}
