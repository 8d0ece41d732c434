//! Generic directed-graph executor with conditional routing.
//!
//! Nodes are registered by name; transitions come from an ordered edge
//! list or a single conditional router per source node (the router wins
//! when both exist). The run loop clones state into each node, replaces
//! it with the node's result, and stops on the terminal marker, the
//! iteration cap, cancellation, or a node failure. Node failures are
//! captured into the state's error field; the engine never propagates
//! them to its caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::observer::GraphObserver;
use super::state::AgentState;
use crate::error::{AppResult, GraphError, GraphResult};

/// Virtual node every run starts from.
pub const START_NODE: &str = "__start__";
/// Terminal marker; routing here (or failing to route) ends the run.
pub const END_NODE: &str = "__end__";

/// A unit of work bound to a name.
///
/// Behaviors are stateless; everything they read and write lives in the
/// [`AgentState`] they receive and return.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    /// Unique node name within a graph.
    fn name(&self) -> &str;

    /// Human description for telemetry.
    fn description(&self) -> &str;

    /// Execute one step: state in, state out.
    async fn execute(
        &self,
        state: AgentState,
        cancel: &CancellationToken,
    ) -> AppResult<AgentState>;
}

/// Predicate deciding whether an edge applies to the current state.
pub type EdgePredicate = Arc<dyn Fn(&AgentState) -> bool + Send + Sync>;

/// Router returning the name of the next node (or [`END_NODE`]).
pub type EdgeRouter = Arc<dyn Fn(&AgentState) -> String + Send + Sync>;

struct Edge {
    to: String,
    predicate: Option<EdgePredicate>,
}

/// Directed graph of node behaviors with conditional routing.
#[derive(Default)]
pub struct StateGraph {
    nodes: HashMap<String, Arc<dyn NodeBehavior>>,
    edges: HashMap<String, Vec<Edge>>,
    routers: HashMap<String, EdgeRouter>,
    observer: Option<Arc<dyn GraphObserver>>,
}

impl StateGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an optional observer for node-lifecycle telemetry.
    ///
    /// Observers never influence control flow; a graph without one
    /// behaves identically.
    pub fn with_observer(mut self, observer: Arc<dyn GraphObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register a node behavior. Fails if the name is already taken.
    pub fn add_node(&mut self, behavior: Arc<dyn NodeBehavior>) -> GraphResult<()> {
        let name = behavior.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode { name });
        }
        self.nodes.insert(name, behavior);
        Ok(())
    }

    /// Append an unconditional edge to `from`'s ordered edge list.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.entry(from.into()).or_default().push(Edge {
            to: to.into(),
            predicate: None,
        });
    }

    /// Append a predicated edge; the first matching edge wins.
    pub fn add_edge_when(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        predicate: EdgePredicate,
    ) {
        self.edges.entry(from.into()).or_default().push(Edge {
            to: to.into(),
            predicate: Some(predicate),
        });
    }

    /// Install a conditional router for `from`.
    ///
    /// A router takes priority over the node's edge list.
    pub fn add_conditional_edges(&mut self, from: impl Into<String>, router: EdgeRouter) {
        self.routers.insert(from.into(), router);
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn resolve_next(&self, current: &str, state: &AgentState) -> String {
        if let Some(router) = self.routers.get(current) {
            return router.as_ref()(state);
        }
        if let Some(edges) = self.edges.get(current) {
            for edge in edges {
                let matches = match &edge.predicate {
                    Some(predicate) => predicate.as_ref()(state),
                    None => true,
                };
                if matches {
                    return edge.to.clone();
                }
            }
        }
        END_NODE.to_string()
    }

    /// Execute the graph from the start marker until completion.
    ///
    /// Returns the final state in every case: iteration-cap exhaustion and
    /// node failures land in `state.error`, and cancellation returns the
    /// state as it stood, with the completion flag unset.
    pub async fn run(&self, initial: AgentState, cancel: &CancellationToken) -> AgentState {
        let mut state = initial;
        state.current_node = START_NODE.to_string();

        while !state.is_complete {
            if cancel.is_cancelled() {
                debug!(
                    node = %state.current_node,
                    iteration = state.iteration,
                    "graph run cancelled"
                );
                return state;
            }

            if state.iteration >= state.max_iterations {
                warn!(
                    iteration = state.iteration,
                    max_iterations = state.max_iterations,
                    "iteration cap reached"
                );
                state.error = Some("max iterations reached".to_string());
                state.is_complete = true;
                break;
            }

            let next = self.resolve_next(&state.current_node, &state);
            if next == END_NODE {
                state.is_complete = true;
                break;
            }

            state.iteration += 1;

            let Some(behavior) = self.nodes.get(&next) else {
                let message = GraphError::UnknownNode { name: next }.to_string();
                state.error = Some(message);
                state.is_complete = true;
                break;
            };

            state.current_node = next.clone();
            if let Some(observer) = &self.observer {
                observer.on_node_started(&next, &state);
            }

            debug!(node = %next, iteration = state.iteration, "executing node");

            match behavior.execute(state.clone(), cancel).await {
                Ok(new_state) => {
                    state = new_state;
                    if let Some(observer) = &self.observer {
                        observer.on_node_completed(&next, &state);
                        observer.on_state_changed(&state);
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(node = %next, error = %message, "node execution failed");
                    state.error = Some(message.clone());
                    state.is_complete = true;
                    if let Some(observer) = &self.observer {
                        observer.on_node_failed(&next, &message);
                    }
                    break;
                }
            }
        }

        info!(
            iterations = state.iteration,
            complete = state.is_complete,
            error = state.error.as_deref().unwrap_or(""),
            "graph run finished"
        );
        if let Some(observer) = &self.observer {
            observer.on_graph_completed(&state);
        }
        state
    }
}
