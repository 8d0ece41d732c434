//! Prompt assembly and backend invocation.
//!
//! The gateway builds the structured reasoning prompt, sends it to the
//! generation backend, and recovers a structured outcome from whatever
//! text comes back. A backend timeout degrades into an outcome with
//! confidence 0 rather than an error, so the investigation loop can
//! reflect on it like any other weak result.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use tracing::{debug, info, warn};

use super::backend::GenerationBackend;
use super::parser::recover_reasoning;
use super::types::ReasoningOutcome;
use crate::error::BackendResult;
use crate::prompts::{ANALYSIS_GUIDELINES, CHAIN_OF_THOUGHT_INSTRUCTIONS, CONFIDENCE_TASK};
use crate::retrieval::ScoredDocument;

/// Builds prompts, invokes the backend, and recovers structured results.
#[derive(Clone)]
pub struct ReasoningGateway {
    backend: Arc<dyn GenerationBackend>,
    max_evidence_docs: usize,
}

impl ReasoningGateway {
    /// Create a gateway over a generation backend.
    pub fn new(backend: Arc<dyn GenerationBackend>, max_evidence_docs: usize) -> Self {
        Self {
            backend,
            max_evidence_docs,
        }
    }

    /// Assemble the structured reasoning prompt.
    pub fn build_prompt(
        &self,
        task: &str,
        classification: Option<&str>,
        evidence: &[ScoredDocument],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(task);
        prompt.push_str("\n\n");

        if let Some(classification) = classification {
            prompt.push_str(&format!("Prior classification: {classification}\n\n"));
        }

        if evidence.is_empty() {
            prompt.push_str("Evidence: none retrieved.\n\n");
        } else {
            let shown = evidence.len().min(self.max_evidence_docs);
            prompt.push_str(&format!("Evidence ({shown} documents):\n"));
            for (i, doc) in evidence.iter().take(self.max_evidence_docs).enumerate() {
                let source = doc.source().unwrap_or("unknown");
                prompt.push_str(&format!(
                    "[{}] (score {:.2}, source {}) {}\n",
                    i + 1,
                    doc.score,
                    source,
                    doc.content
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str(CHAIN_OF_THOUGHT_INSTRUCTIONS);
        prompt.push_str("\n\n");
        prompt.push_str(ANALYSIS_GUIDELINES);
        prompt
    }

    /// One reasoning call: build prompt, invoke, recover.
    ///
    /// A backend timeout returns a degraded outcome with confidence 0;
    /// other backend failures propagate.
    pub async fn reason(
        &self,
        task: &str,
        classification: Option<&str>,
        evidence: &[ScoredDocument],
    ) -> BackendResult<ReasoningOutcome> {
        let prompt = self.build_prompt(task, classification, evidence);
        let start = Instant::now();

        match self.backend.generate(&prompt).await {
            Ok(raw) => {
                let outcome = recover_reasoning(&raw);
                info!(
                    latency_ms = start.elapsed().as_millis() as u64,
                    steps = outcome.steps.len(),
                    confidence = outcome.confidence,
                    "reasoning call completed"
                );
                Ok(outcome)
            }
            Err(e) if e.is_timeout() => {
                warn!(error = %e, "reasoning backend timed out");
                Ok(ReasoningOutcome::new(
                    "Reasoning backend timed out before producing an answer",
                    e.to_string(),
                    Vec::new(),
                    0.0,
                    "",
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Score how confidently `findings` answer `query`, in [0.0, 1.0].
    ///
    /// Backend failures score 0.0; this capability gates a verification
    /// fallback, so pessimism is the safe default.
    pub async fn score_confidence(&self, query: &str, findings: &str) -> f64 {
        let prompt = format!("{CONFIDENCE_TASK}\n\nQuery: {query}\n\nFindings:\n{findings}");

        match self.backend.generate(&prompt).await {
            Ok(raw) => {
                let score = first_number(&raw).unwrap_or(0.0).clamp(0.0, 1.0);
                debug!(score, "confidence scoring completed");
                score
            }
            Err(e) => {
                warn!(error = %e, "confidence scoring failed");
                0.0
            }
        }
    }
}

fn first_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER
        .get_or_init(|| Regex::new(r"[0-9]*\.?[0-9]+").expect("static pattern compiles"))
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasoningError;
    use async_trait::async_trait;

    struct CannedBackend(String);

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate(&self, _prompt: &str) -> BackendResult<String> {
            Ok(self.0.clone())
        }
    }

    struct TimeoutBackend;

    #[async_trait]
    impl GenerationBackend for TimeoutBackend {
        async fn generate(&self, _prompt: &str) -> BackendResult<String> {
            Err(ReasoningError::Timeout { timeout_ms: 300_000 })
        }
    }

    fn gateway(raw: &str) -> ReasoningGateway {
        ReasoningGateway::new(Arc::new(CannedBackend(raw.to_string())), 5)
    }

    #[test]
    fn test_prompt_contains_task_evidence_and_instructions() {
        let gateway = gateway("");
        let evidence = vec![
            ScoredDocument::new("db timeout at 12:03", 0.95).with_tag("source", "log_file"),
        ];
        let prompt = gateway.build_prompt("Investigate the outage", None, &evidence);

        assert!(prompt.starts_with("Investigate the outage"));
        assert!(prompt.contains("db timeout at 12:03"));
        assert!(prompt.contains("source log_file"));
        assert!(prompt.contains("valid JSON"));
        assert!(prompt.contains("do not echo"));
    }

    #[test]
    fn test_prompt_bounds_evidence_count() {
        let gateway = ReasoningGateway::new(Arc::new(CannedBackend(String::new())), 2);
        let evidence: Vec<ScoredDocument> = (0..5)
            .map(|i| ScoredDocument::new(format!("evidence item number {i}"), 0.5))
            .collect();
        let prompt = gateway.build_prompt("task", None, &evidence);
        assert!(prompt.contains("evidence item number 0"));
        assert!(prompt.contains("evidence item number 1"));
        assert!(!prompt.contains("evidence item number 2"));
    }

    #[test]
    fn test_prompt_includes_classification_when_present() {
        let gateway = gateway("");
        let prompt = gateway.build_prompt("task", Some("database incident"), &[]);
        assert!(prompt.contains("Prior classification: database incident"));
        assert!(prompt.contains("Evidence: none retrieved."));
    }

    #[tokio::test]
    async fn test_reason_recovers_structured_outcome() {
        let gateway = gateway(
            r#"{"solution": "replica lag", "explanation": "e", "steps": ["check replica status"], "confidence": 0.9}"#,
        );
        let outcome = gateway.reason("task", None, &[]).await.unwrap();
        assert_eq!(outcome.solution, "replica lag");
        assert!((outcome.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_zero_confidence_outcome() {
        let gateway = ReasoningGateway::new(Arc::new(TimeoutBackend), 5);
        let outcome = gateway.reason("task", None, &[]).await.unwrap();
        assert!((outcome.confidence - 0.0).abs() < f64::EPSILON);
        assert!(outcome.solution.contains("timed out"));
    }

    #[tokio::test]
    async fn test_score_confidence_parses_bare_number() {
        let gateway = gateway("0.85");
        let score = gateway.score_confidence("query", "findings").await;
        assert!((score - 0.85).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_score_confidence_parses_number_in_prose() {
        let gateway = gateway("I would rate this 0.6 overall.");
        let score = gateway.score_confidence("query", "findings").await;
        assert!((score - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_score_confidence_clamps_out_of_range() {
        let gateway = gateway("confidence: 7");
        let score = gateway.score_confidence("query", "findings").await;
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_score_confidence_zero_on_backend_failure() {
        let gateway = ReasoningGateway::new(Arc::new(TimeoutBackend), 5);
        let score = gateway.score_confidence("query", "findings").await;
        assert!((score - 0.0).abs() < f64::EPSILON);
    }
}
