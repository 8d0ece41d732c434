//! The investigation state machine: agent state, the graph engine, and
//! telemetry observers.
//!
//! The engine is an explicit, boundedly-iterated state machine (a table of
//! named nodes plus an edge table), never recursive calls, so the
//! iteration cap on [`AgentState`] is the sole termination guarantee for
//! cyclic configurations such as reflector -> planner.

mod engine;
mod observer;
mod state;

pub use engine::{
    EdgePredicate, EdgeRouter, NodeBehavior, StateGraph, END_NODE, START_NODE,
};
pub use observer::{GraphObserver, TracingObserver};
pub use state::{AgentMessage, AgentState, ContextKey, ContextValue, MessageRole};
