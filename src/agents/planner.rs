//! Planner node: turns the query and pre-retrieved evidence into an
//! ordered investigation plan.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::core::AgentCore;
use super::PLANNER_NODE;
use crate::error::AppResult;
use crate::graph::{AgentState, ContextKey, ContextValue, NodeBehavior};
use crate::prompts::PLANNER_TASK;

/// Produces `plan` and `plan_explanation`, and resets `current_step`.
pub struct PlannerNode {
    core: AgentCore,
}

impl PlannerNode {
    /// Create a planner over the shared core.
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl NodeBehavior for PlannerNode {
    fn name(&self) -> &str {
        PLANNER_NODE
    }

    fn description(&self) -> &str {
        "plans the investigation from the query and pre-retrieved evidence"
    }

    async fn execute(
        &self,
        state: AgentState,
        _cancel: &CancellationToken,
    ) -> AppResult<AgentState> {
        let query = state.text(ContextKey::Query);
        if query.trim().is_empty() {
            return Ok(state.with_error("no query provided"));
        }

        let correlation_id = state.text(ContextKey::CorrelationId);
        let docs = state.docs(ContextKey::PreRetrievalDocs);

        let classification = if correlation_id.is_empty() {
            None
        } else {
            Some(format!(
                "session-scoped investigation (correlation id {correlation_id})"
            ))
        };

        let task = format!("{PLANNER_TASK}\n\nQuery: {query}");
        debug!(evidence = docs.len(), "planning investigation");

        let outcome = self
            .core
            .gateway()
            .reason(&task, classification.as_deref(), &docs)
            .await?;

        // A plan must never be empty; a single catch-all step keeps the
        // loop moving when the backend returns none.
        let steps = if outcome.steps.is_empty() {
            vec![format!("Investigate: {query}")]
        } else {
            outcome.steps
        };

        info!(steps = steps.len(), "plan produced");

        Ok(state
            .with_context(ContextKey::Plan, ContextValue::List(steps.clone()))
            .with_context(
                ContextKey::PlanExplanation,
                ContextValue::Text(outcome.explanation),
            )
            .with_context(ContextKey::CurrentStep, ContextValue::Counter(0))
            .with_assistant_message(format!("Planned {} investigation steps", steps.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendResult;
    use crate::reasoning::{GenerationBackend, ReasoningGateway};
    use std::sync::Arc;

    struct CannedBackend(String);

    #[async_trait]
    impl GenerationBackend for CannedBackend {
        async fn generate(&self, _prompt: &str) -> BackendResult<String> {
            Ok(self.0.clone())
        }
    }

    fn planner_with(raw: &str) -> PlannerNode {
        let gateway = ReasoningGateway::new(Arc::new(CannedBackend(raw.to_string())), 5);
        PlannerNode::new(AgentCore::new(Arc::new(gateway)))
    }

    fn state_with_query(query: &str) -> AgentState {
        AgentState::new(10).with_context(
            ContextKey::Query,
            ContextValue::Text(query.to_string()),
        )
    }

    #[tokio::test]
    async fn test_planner_writes_plan_and_resets_step() {
        let planner = planner_with(
            r#"{"solution": "plan", "explanation": "because", "steps": ["inspect error logs", "correlate with deploys"], "confidence": 0.8}"#,
        );
        let cancel = CancellationToken::new();
        let state = planner
            .execute(state_with_query("why did it fail"), &cancel)
            .await
            .unwrap();

        assert_eq!(
            state.list(ContextKey::Plan),
            vec![
                "inspect error logs".to_string(),
                "correlate with deploys".to_string()
            ]
        );
        assert_eq!(state.text(ContextKey::PlanExplanation), "because");
        assert_eq!(state.counter(ContextKey::CurrentStep), 0);
        assert_eq!(state.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_planner_missing_query_sets_error() {
        let planner = planner_with("{}");
        let cancel = CancellationToken::new();
        let state = planner
            .execute(AgentState::new(10), &cancel)
            .await
            .unwrap();

        assert!(state.is_complete);
        assert_eq!(state.error.as_deref(), Some("no query provided"));
    }

    #[tokio::test]
    async fn test_planner_falls_back_to_single_step_plan() {
        // Backend returns a solution but no steps.
        let planner =
            planner_with(r#"{"solution": "look at the logs", "steps": [], "confidence": 0.5}"#);
        let cancel = CancellationToken::new();
        let state = planner
            .execute(state_with_query("service down"), &cancel)
            .await
            .unwrap();

        let plan = state.list(ContextKey::Plan);
        assert_eq!(plan.len(), 1);
        assert!(plan[0].contains("service down"));
    }
}
