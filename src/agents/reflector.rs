//! Reflector node: analyzes verification failures and gates retries.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::core::AgentCore;
use super::REFLECTOR_NODE;
use crate::error::AppResult;
use crate::graph::{AgentState, ContextKey, ContextValue, NodeBehavior};
use crate::prompts::REFLEXION_TASK;
use crate::reasoning::ReflexionOutcome;

/// Produces `reflexion_analysis`, `reflexion_corrections`, and
/// `reflexion_should_retry`, resetting the execution context when a retry
/// is approved.
pub struct ReflectorNode {
    core: AgentCore,
}

impl ReflectorNode {
    /// Create a reflector over the shared core.
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl NodeBehavior for ReflectorNode {
    fn name(&self) -> &str {
        REFLECTOR_NODE
    }

    fn description(&self) -> &str {
        "analyzes verification failures and decides whether to retry"
    }

    async fn execute(
        &self,
        state: AgentState,
        _cancel: &CancellationToken,
    ) -> AppResult<AgentState> {
        if state.flag(ContextKey::VerificationPassed) {
            let outcome = ReflexionOutcome::no_correction_needed();
            return Ok(state
                .with_context(
                    ContextKey::ReflexionAnalysis,
                    ContextValue::Text(outcome.analysis.clone()),
                )
                .with_context(
                    ContextKey::ReflexionCorrections,
                    ContextValue::Text(outcome.corrections),
                )
                .with_context(ContextKey::ReflexionShouldRetry, ContextValue::Flag(false))
                .with_assistant_message(outcome.analysis));
        }

        let query = state.text(ContextKey::Query);
        let reason = state.text(ContextKey::VerificationReason);
        let results = state.list(ContextKey::ExecutionResults);

        let task = format!(
            "{REFLEXION_TASK}\n\nQuery: {query}\n\nFailure reason: {reason}\n\nExecution results:\n{}",
            results.join("\n")
        );

        let reasoned = self.core.gateway().reason(&task, None, &[]).await?;

        // Retries need both a confident analysis and room left under the
        // iteration cap for another plan-execute-verify pass.
        let iterations_remain = state.iteration < state.max_iterations.saturating_sub(1);
        let should_retry = reasoned.confidence > 0.5 && iterations_remain;

        let outcome = ReflexionOutcome {
            analysis: reasoned.explanation.clone(),
            corrections: reasoned.solution.clone(),
            should_retry,
            confidence: reasoned.confidence,
        };

        info!(
            should_retry,
            confidence = outcome.confidence,
            iterations_remain,
            "reflexion finished"
        );

        let mut next = state
            .with_context(
                ContextKey::ReflexionAnalysis,
                ContextValue::Text(outcome.analysis),
            )
            .with_context(
                ContextKey::ReflexionCorrections,
                ContextValue::Text(outcome.corrections),
            )
            .with_context(
                ContextKey::ReflexionShouldRetry,
                ContextValue::Flag(should_retry),
            );

        if should_retry {
            next = next
                .with_context(ContextKey::CurrentStep, ContextValue::Counter(0))
                .without_context(ContextKey::ExecutionResults);
        }

        Ok(next.with_assistant_message(if should_retry {
            "Retrying the investigation with corrections".to_string()
        } else {
            "Not retrying the investigation".to_string()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendResult;
    use crate::reasoning::{GenerationBackend, ReasoningGateway};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBackend {
        raw: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GenerationBackend for CountingBackend {
        async fn generate(&self, _prompt: &str) -> BackendResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.raw.clone())
        }
    }

    fn reflector_with(raw: &str) -> (ReflectorNode, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            raw: raw.to_string(),
            calls: calls.clone(),
        };
        let gateway = ReasoningGateway::new(Arc::new(backend), 5);
        (ReflectorNode::new(AgentCore::new(Arc::new(gateway))), calls)
    }

    fn failed_state() -> AgentState {
        let mut state = AgentState::new(10)
            .with_context(ContextKey::Query, ContextValue::Text("why".to_string()))
            .with_context(ContextKey::VerificationPassed, ContextValue::Flag(false))
            .with_context(
                ContextKey::VerificationReason,
                ContextValue::Text("insufficient evidence".to_string()),
            )
            .with_context(
                ContextKey::ExecutionResults,
                ContextValue::List(vec!["weak finding".to_string()]),
            )
            .with_context(ContextKey::CurrentStep, ContextValue::Counter(1));
        state.iteration = 3;
        state
    }

    #[tokio::test]
    async fn test_passed_verification_is_a_no_op_reflection() {
        let (reflector, calls) = reflector_with("{}");
        let cancel = CancellationToken::new();
        let state = AgentState::new(10)
            .with_context(ContextKey::VerificationPassed, ContextValue::Flag(true));

        let state = reflector.execute(state, &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!state.flag(ContextKey::ReflexionShouldRetry));
        assert!(state
            .text(ContextKey::ReflexionAnalysis)
            .contains("no correction needed"));
    }

    #[tokio::test]
    async fn test_confident_analysis_approves_retry_and_resets_execution() {
        let (reflector, _) = reflector_with(
            r#"{"solution": "retrieve a wider log window", "explanation": "evidence was too narrow", "steps": ["widen the window"], "confidence": 0.8}"#,
        );
        let cancel = CancellationToken::new();
        let state = reflector.execute(failed_state(), &cancel).await.unwrap();

        assert!(state.flag(ContextKey::ReflexionShouldRetry));
        assert_eq!(state.counter(ContextKey::CurrentStep), 0);
        assert!(state.list(ContextKey::ExecutionResults).is_empty());
        assert_eq!(
            state.text(ContextKey::ReflexionCorrections),
            "retrieve a wider log window"
        );
        assert_eq!(
            state.text(ContextKey::ReflexionAnalysis),
            "evidence was too narrow"
        );
    }

    #[tokio::test]
    async fn test_low_confidence_rejects_retry() {
        let (reflector, _) = reflector_with(
            r#"{"solution": "s", "explanation": "unsure", "steps": [], "confidence": 0.3}"#,
        );
        let cancel = CancellationToken::new();
        let state = reflector.execute(failed_state(), &cancel).await.unwrap();

        assert!(!state.flag(ContextKey::ReflexionShouldRetry));
        // Execution context is preserved when no retry happens.
        assert_eq!(state.counter(ContextKey::CurrentStep), 1);
    }

    #[tokio::test]
    async fn test_exhausted_iterations_reject_retry() {
        let (reflector, _) = reflector_with(
            r#"{"solution": "s", "explanation": "confident", "steps": [], "confidence": 0.9}"#,
        );
        let cancel = CancellationToken::new();
        let mut state = failed_state();
        state.iteration = 9; // max_iterations is 10; 9 >= 10 - 1

        let state = reflector.execute(state, &cancel).await.unwrap();
        assert!(!state.flag(ContextKey::ReflexionShouldRetry));
    }
}
