//! Optional telemetry hooks for graph execution.

use super::state::AgentState;
use tracing::{debug, info, warn};

/// Observer of node-lifecycle events.
///
/// Telemetry only: implementations must never influence control flow, and
/// the engine runs identically when no observer is attached.
pub trait GraphObserver: Send + Sync {
    /// A node is about to execute.
    fn on_node_started(&self, _node: &str, _state: &AgentState) {}

    /// A node returned successfully.
    fn on_node_completed(&self, _node: &str, _state: &AgentState) {}

    /// A node failed; the error is already captured into the state.
    fn on_node_failed(&self, _node: &str, _error: &str) {}

    /// State was replaced after a node execution.
    fn on_state_changed(&self, _state: &AgentState) {}

    /// The run finished (completed, errored, or hit the iteration cap).
    fn on_graph_completed(&self, _state: &AgentState) {}
}

/// Observer that logs lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GraphObserver for TracingObserver {
    fn on_node_started(&self, node: &str, state: &AgentState) {
        debug!(node = %node, iteration = state.iteration, "node started");
    }

    fn on_node_completed(&self, node: &str, state: &AgentState) {
        debug!(node = %node, iteration = state.iteration, "node completed");
    }

    fn on_node_failed(&self, node: &str, error: &str) {
        warn!(node = %node, error = %error, "node failed");
    }

    fn on_graph_completed(&self, state: &AgentState) {
        info!(
            iterations = state.iteration,
            complete = state.is_complete,
            "graph completed"
        );
    }
}
