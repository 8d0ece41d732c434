//! Verifier node: decides whether the gathered findings are sufficient.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::core::AgentCore;
use super::VERIFIER_NODE;
use crate::error::AppResult;
use crate::graph::{AgentState, ContextKey, ContextValue, NodeBehavior};

/// Fixed reason recorded when a session-scoped query retrieved nothing.
pub const NO_SESSION_EVIDENCE_REASON: &str =
    "no log evidence was retrieved for the supplied correlation id";

/// Produces `verification_passed`, `verification_score`, and
/// `verification_reason`.
///
/// Policy, in priority order: missing execution results pass only as a
/// general-knowledge answer (no correlation id, non-empty plan); a
/// session-scoped query with zero retrieved documents always fails; any
/// retrieved evidence passes with a document-count score; otherwise the
/// concatenated findings are confidence-scored by the gateway.
pub struct VerifierNode {
    core: AgentCore,
}

impl VerifierNode {
    /// Create a verifier over the shared core.
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl NodeBehavior for VerifierNode {
    fn name(&self) -> &str {
        VERIFIER_NODE
    }

    fn description(&self) -> &str {
        "verifies sufficiency of execution results against the evidence"
    }

    async fn execute(
        &self,
        state: AgentState,
        _cancel: &CancellationToken,
    ) -> AppResult<AgentState> {
        let results = state.list(ContextKey::ExecutionResults);
        let docs = state.docs(ContextKey::PreRetrievalDocs);
        let correlation_id = state.text(ContextKey::CorrelationId);
        let plan = state.list(ContextKey::Plan);

        let (passed, score, reason) = if results.is_empty() {
            if correlation_id.is_empty() && !plan.is_empty() {
                (
                    true,
                    0.5,
                    "no execution results; accepted as a general-knowledge answer".to_string(),
                )
            } else {
                (false, 0.0, "no execution results available".to_string())
            }
        } else if !correlation_id.is_empty() && docs.is_empty() {
            (false, 0.0, NO_SESSION_EVIDENCE_REASON.to_string())
        } else if !docs.is_empty() {
            let score = (0.5 + 0.05 * docs.len() as f64).min(0.95);
            (
                true,
                score,
                format!("verified against {} evidence documents", docs.len()),
            )
        } else {
            let query = state.text(ContextKey::Query);
            let combined = results.join("\n");
            let score = self.core.gateway().score_confidence(&query, &combined).await;
            (
                score > 0.5,
                score,
                format!("confidence-scored at {score:.2}"),
            )
        };

        info!(passed, score, reason = %reason, "verification finished");

        Ok(state
            .with_context(ContextKey::VerificationPassed, ContextValue::Flag(passed))
            .with_context(
                ContextKey::VerificationScore,
                ContextValue::Number(score.clamp(0.0, 1.0)),
            )
            .with_context(
                ContextKey::VerificationReason,
                ContextValue::Text(reason.clone()),
            )
            .with_tool_message(VERIFIER_NODE, reason))
    }
}
