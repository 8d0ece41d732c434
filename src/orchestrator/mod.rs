//! Wires the investigation graph, seeds state with a pre-retrieval pass,
//! runs the loop, and renders the final state into a report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{
    AgentCore, ExecutorNode, PlannerNode, ReflectorNode, VerifierNode, EXECUTOR_NODE,
    PLANNER_NODE, REFLECTOR_NODE, VERIFIER_NODE,
};
use crate::config::AgentConfig;
use crate::error::AppResult;
use crate::graph::{
    AgentState, ContextKey, ContextValue, GraphObserver, StateGraph, END_NODE, START_NODE,
};
use crate::reasoning::{mentions_synthesis, ReasoningGateway};
use crate::retrieval::{LogCache, RagCoordinator};

/// The rendered result of one investigation.
///
/// Every failure mode lands in `error`; the orchestrator's entry point
/// never returns an `Err` or panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationReport {
    /// Markdown answer: synthesis, per-step findings, verification status,
    /// and an optional reflexion note.
    pub answer: String,
    /// The final plan.
    pub plan: Vec<String>,
    /// One finding per plan step.
    pub execution_results: Vec<String>,
    /// Whether verification passed.
    pub verification_passed: bool,
    /// Node executions consumed by the run.
    pub iterations: u32,
    /// Verification confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Terminal error, if the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs investigations over a fixed graph wiring.
pub struct Orchestrator {
    coordinator: Arc<RagCoordinator>,
    gateway: Arc<ReasoningGateway>,
    agent_config: AgentConfig,
    observer: Option<Arc<dyn GraphObserver>>,
}

impl Orchestrator {
    /// Create an orchestrator over the coordinator and gateway.
    pub fn new(
        coordinator: Arc<RagCoordinator>,
        gateway: Arc<ReasoningGateway>,
        agent_config: AgentConfig,
    ) -> Self {
        Self {
            coordinator,
            gateway,
            agent_config,
            observer: None,
        }
    }

    /// Attach a telemetry observer to every graph run.
    pub fn with_observer(mut self, observer: Arc<dyn GraphObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn build_graph(&self) -> AppResult<StateGraph> {
        let core = AgentCore::new(self.gateway.clone());

        let mut graph = StateGraph::new();
        if let Some(observer) = &self.observer {
            graph = graph.with_observer(observer.clone());
        }

        graph.add_node(Arc::new(PlannerNode::new(core.clone())))?;
        graph.add_node(Arc::new(ExecutorNode::new(core.clone())))?;
        graph.add_node(Arc::new(VerifierNode::new(core.clone())))?;
        graph.add_node(Arc::new(ReflectorNode::new(core)))?;

        graph.add_edge(START_NODE, PLANNER_NODE);
        graph.add_edge(PLANNER_NODE, EXECUTOR_NODE);
        graph.add_edge(EXECUTOR_NODE, VERIFIER_NODE);
        graph.add_conditional_edges(
            VERIFIER_NODE,
            Arc::new(|state: &AgentState| {
                if state.flag(ContextKey::VerificationPassed) {
                    END_NODE.to_string()
                } else {
                    REFLECTOR_NODE.to_string()
                }
            }),
        );
        graph.add_conditional_edges(
            REFLECTOR_NODE,
            Arc::new(|state: &AgentState| {
                if state.flag(ContextKey::ReflexionShouldRetry) {
                    PLANNER_NODE.to_string()
                } else {
                    END_NODE.to_string()
                }
            }),
        );

        Ok(graph)
    }

    /// Run one investigation to completion.
    pub async fn investigate(
        &self,
        query: &str,
        correlation_id: Option<&str>,
    ) -> InvestigationReport {
        self.investigate_with_cancel(query, correlation_id, &CancellationToken::new())
            .await
    }

    /// Run one investigation with cooperative cancellation.
    ///
    /// Cancellation returns whatever state exists at that point rendered
    /// as a report with completion unset; it is never an error.
    pub async fn investigate_with_cancel(
        &self,
        query: &str,
        correlation_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> InvestigationReport {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let correlation_id = correlation_id.filter(|id| !id.is_empty());

        info!(
            run_id = %run_id,
            correlation_id = correlation_id.unwrap_or(""),
            "investigation started"
        );

        // Pre-retrieval pass. A retrieval failure degrades to an empty
        // evidence set; the verifier decides what that means.
        let mut cache = LogCache::new();
        let docs = match self
            .coordinator
            .retrieve(
                query,
                correlation_id,
                self.agent_config.max_evidence_docs,
                &mut cache,
            )
            .await
        {
            Ok(docs) => docs,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "pre-retrieval failed");
                Vec::new()
            }
        };

        // A session-scoped query with no session logs has a deterministic
        // answer; skip the reasoning loop entirely.
        if let Some(cid) = correlation_id {
            let has_session_logs = docs.iter().any(|d| d.source() == Some("log_file"));
            if !has_session_logs {
                info!(run_id = %run_id, correlation_id = %cid, "no session logs found");
                return no_logs_report(cid, run_id, started.elapsed());
            }
        }

        let mut state = AgentState::new(self.agent_config.max_iterations)
            .with_context(ContextKey::Query, ContextValue::Text(query.to_string()))
            .with_context(ContextKey::PreRetrievalDocs, ContextValue::Docs(docs))
            .with_user_message(query);
        if let Some(cid) = correlation_id {
            state = state.with_context(
                ContextKey::CorrelationId,
                ContextValue::Text(cid.to_string()),
            );
        }

        let graph = match self.build_graph() {
            Ok(graph) => graph,
            Err(e) => {
                let state = state.with_error(e.to_string());
                return render_report(&state, run_id, started.elapsed());
            }
        };

        let final_state = graph.run(state, cancel).await;
        let report = render_report(&final_state, run_id, started.elapsed());

        info!(
            run_id = %run_id,
            iterations = report.iterations,
            passed = report.verification_passed,
            latency_ms = started.elapsed().as_millis() as u64,
            "investigation finished"
        );
        report
    }
}

fn no_logs_report(correlation_id: &str, run_id: Uuid, elapsed: Duration) -> InvestigationReport {
    let mut answer = String::from("## Investigation Report\n\n");
    answer.push_str(&format!(
        "No log entries were found for correlation id `{correlation_id}`. \
         Verify the id and that the session's logs have been ingested.\n"
    ));
    answer.push_str(&trailer(run_id, elapsed, 0));

    InvestigationReport {
        answer,
        plan: Vec::new(),
        execution_results: Vec::new(),
        verification_passed: false,
        iterations: 0,
        confidence: 0.0,
        error: None,
    }
}

fn render_report(state: &AgentState, run_id: Uuid, elapsed: Duration) -> InvestigationReport {
    let plan = state.list(ContextKey::Plan);
    let results = state.list(ContextKey::ExecutionResults);
    let passed = state.flag(ContextKey::VerificationPassed);
    let confidence = state.number(ContextKey::VerificationScore).clamp(0.0, 1.0);

    let mut answer = String::from("## Investigation Report\n\n");

    if let Some(synthesis) = results.iter().find(|r| mentions_synthesis(r)) {
        answer.push_str("### Synthesis\n\n");
        answer.push_str(synthesis);
        answer.push_str("\n\n");
    }

    if !plan.is_empty() && !results.is_empty() {
        answer.push_str("### Findings by step\n\n");
        for (i, step) in plan.iter().enumerate() {
            answer.push_str(&format!("**Step {}: {}**\n\n", i + 1, step));
            if let Some(result) = results.get(i) {
                answer.push_str(result);
                answer.push_str("\n\n");
            }
        }
    }

    answer.push_str(&format!(
        "**Verification:** {} ({:.0}% confidence)\n",
        if passed { "passed" } else { "failed" },
        confidence * 100.0
    ));

    let reflexion = state.text(ContextKey::ReflexionAnalysis);
    if !reflexion.is_empty() {
        answer.push_str(&format!("\n**Reflexion:** {reflexion}\n"));
    }

    if let Some(error) = &state.error {
        answer.push_str(&format!("\n**Error:** {error}\n"));
    }

    answer.push_str(&trailer(run_id, elapsed, state.iteration));

    InvestigationReport {
        answer,
        plan,
        execution_results: results,
        verification_passed: passed,
        iterations: state.iteration,
        confidence,
        error: state.error.clone(),
    }
}

fn trailer(run_id: Uuid, elapsed: Duration, iterations: u32) -> String {
    format!(
        "\n_run {run_id} finished in {:.1}s after {iterations} iterations_\n",
        elapsed.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_report_includes_all_sections() {
        let state = AgentState::new(10)
            .with_context(
                ContextKey::Plan,
                ContextValue::List(vec!["check logs".to_string(), "wrap up".to_string()]),
            )
            .with_context(
                ContextKey::ExecutionResults,
                ContextValue::List(vec![
                    "errors cluster around 12:03".to_string(),
                    "Synthesis: deploy caused the timeout".to_string(),
                ]),
            )
            .with_context(ContextKey::VerificationPassed, ContextValue::Flag(true))
            .with_context(ContextKey::VerificationScore, ContextValue::Number(0.75));

        let report = render_report(&state, Uuid::nil(), Duration::from_secs(2));

        assert!(report.answer.contains("### Synthesis"));
        assert!(report.answer.contains("deploy caused the timeout"));
        assert!(report.answer.contains("**Step 1: check logs**"));
        assert!(report.answer.contains("errors cluster around 12:03"));
        assert!(report.answer.contains("**Verification:** passed (75% confidence)"));
        assert!(report.verification_passed);
        assert!((report.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_render_report_includes_reflexion_and_error() {
        let state = AgentState::new(10)
            .with_context(
                ContextKey::ReflexionAnalysis,
                ContextValue::Text("evidence was too narrow".to_string()),
            )
            .with_error("max iterations reached");

        let report = render_report(&state, Uuid::nil(), Duration::from_secs(1));
        assert!(report.answer.contains("**Reflexion:** evidence was too narrow"));
        assert!(report.answer.contains("**Error:** max iterations reached"));
        assert_eq!(report.error.as_deref(), Some("max iterations reached"));
    }

    #[test]
    fn test_no_logs_report_mentions_correlation_id() {
        let report = no_logs_report("req-17", Uuid::nil(), Duration::from_millis(10));
        assert!(report.answer.contains("req-17"));
        assert!(!report.verification_passed);
        assert_eq!(report.iterations, 0);
        assert!(report.error.is_none());
    }
}
