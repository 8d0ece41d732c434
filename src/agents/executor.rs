//! Executor node: one batched reasoning call covering every plan step.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::core::AgentCore;
use super::EXECUTOR_NODE;
use crate::error::AppResult;
use crate::graph::{AgentState, ContextKey, ContextValue, NodeBehavior};
use crate::prompts::EXECUTOR_TASK;

/// Produces `execution_results` (one entry per plan step) and advances
/// `current_step` past the end of the plan.
pub struct ExecutorNode {
    core: AgentCore,
}

impl ExecutorNode {
    /// Create an executor over the shared core.
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl NodeBehavior for ExecutorNode {
    fn name(&self) -> &str {
        EXECUTOR_NODE
    }

    fn description(&self) -> &str {
        "executes all plan steps in one batched reasoning call"
    }

    async fn execute(
        &self,
        state: AgentState,
        _cancel: &CancellationToken,
    ) -> AppResult<AgentState> {
        let plan = state.list(ContextKey::Plan);
        if plan.is_empty() {
            return Ok(state.with_error("no plan before execution"));
        }

        // Re-entry guard: a partially-advanced step counter means this
        // plan was already executed.
        if state.counter(ContextKey::CurrentStep) > 0 {
            debug!("execution already performed, skipping");
            return Ok(state);
        }

        let query = state.text(ContextKey::Query);
        let correlation_id = state.text(ContextKey::CorrelationId);
        let docs = state.docs(ContextKey::PreRetrievalDocs);

        let classification = if correlation_id.is_empty() {
            None
        } else {
            Some(format!(
                "session-scoped investigation (correlation id {correlation_id})"
            ))
        };

        let mut task = format!("{EXECUTOR_TASK}\n\nQuery: {query}\n\nPlan steps:\n");
        for (i, step) in plan.iter().enumerate() {
            task.push_str(&format!("{}. {}\n", i + 1, step));
        }

        let outcome = self
            .core
            .gateway()
            .reason(&task, classification.as_deref(), &docs)
            .await?;

        // One finding per plan step; pad with the overall solution when
        // the backend returned fewer entries than the plan has steps.
        let filler = if outcome.solution.is_empty() {
            outcome.explanation.clone()
        } else {
            outcome.solution.clone()
        };
        let results: Vec<String> = (0..plan.len())
            .map(|i| {
                outcome
                    .steps
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| filler.clone())
            })
            .collect();

        info!(findings = results.len(), "plan executed");

        Ok(state
            .with_context(ContextKey::ExecutionResults, ContextValue::List(results))
            .with_context(ContextKey::CurrentStep, ContextValue::Counter(plan.len()))
            .with_tool_message(
                EXECUTOR_NODE,
                format!("Produced findings for {} plan steps", plan.len()),
            ))
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

    fn executor_with(raw: &str) -> (ExecutorNode, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            raw: raw.to_string(),
            calls: calls.clone(),
        };
        let gateway = ReasoningGateway::new(Arc::new(backend), 5);
        (ExecutorNode::new(AgentCore::new(Arc::new(gateway))), calls)
    }

    fn planned_state(steps: &[&str]) -> AgentState {
        AgentState::new(10)
            .with_context(ContextKey::Query, ContextValue::Text("why".to_string()))
            .with_context(
                ContextKey::Plan,
                ContextValue::List(steps.iter().map(|s| s.to_string()).collect()),
            )
            .with_context(ContextKey::CurrentStep, ContextValue::Counter(0))
    }

    #[tokio::test]
    async fn test_executor_single_batched_call_for_all_steps() {
        let (executor, calls) = executor_with(
            r#"{"solution": "overall", "steps": ["finding for step one", "finding for step two"], "confidence": 0.8}"#,
        );
        let cancel = CancellationToken::new();
        let state = executor
            .execute(planned_state(&["step one", "step two"]), &cancel)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            state.list(ContextKey::ExecutionResults),
            vec![
                "finding for step one".to_string(),
                "finding for step two".to_string()
            ]
        );
        assert_eq!(state.counter(ContextKey::CurrentStep), 2);
    }

    #[tokio::test]
    async fn test_executor_pads_missing_findings_with_solution() {
        let (executor, _) = executor_with(
            r#"{"solution": "shared conclusion", "steps": ["only finding present"], "confidence": 0.8}"#,
        );
        let cancel = CancellationToken::new();
        let state = executor
            .execute(planned_state(&["a", "b", "c"]), &cancel)
            .await
            .unwrap();

        let results = state.list(ContextKey::ExecutionResults);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], "only finding present");
        assert_eq!(results[1], "shared conclusion");
        assert_eq!(results[2], "shared conclusion");
    }

    #[tokio::test]
    async fn test_executor_is_idempotent_on_reentry() {
        let (executor, calls) = executor_with(r#"{"solution": "x", "steps": [], "confidence": 0.5}"#);
        let cancel = CancellationToken::new();
        let state = planned_state(&["one"])
            .with_context(ContextKey::CurrentStep, ContextValue::Counter(1));

        let after = executor.execute(state, &cancel).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(after.list(ContextKey::ExecutionResults).is_empty());
    }

    #[tokio::test]
    async fn test_executor_without_plan_sets_error() {
        let (executor, calls) = executor_with("{}");
        let cancel = CancellationToken::new();
        let state = executor
            .execute(AgentState::new(10), &cancel)
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.error.as_deref(), Some("no plan before execution"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
