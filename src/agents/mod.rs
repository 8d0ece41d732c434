//! Node behaviors forming the plan-execute-verify-reflect loop.
//!
//! The four behaviors are a closed set behind the [`NodeBehavior`] trait,
//! registered by name into the state graph:
//! - [`PlannerNode`]: query + evidence -> ordered plan
//! - [`ExecutorNode`]: one batched reasoning call over all plan steps
//! - [`VerifierNode`]: sufficiency decision over findings and evidence
//! - [`ReflectorNode`]: failure analysis gating a bounded retry
//!
//! All behaviors share infrastructure via [`AgentCore`] composition.
//!
//! [`NodeBehavior`]: crate::graph::NodeBehavior

mod core;
mod executor;
mod planner;
mod reflector;
mod verifier;

pub use core::AgentCore;
pub use executor::ExecutorNode;
pub use planner::PlannerNode;
pub use reflector::ReflectorNode;
pub use verifier::{VerifierNode, NO_SESSION_EVIDENCE_REASON};

/// Node name of the planner.
pub const PLANNER_NODE: &str = "planner";
/// Node name of the executor.
pub const EXECUTOR_NODE: &str = "executor";
/// Node name of the verifier.
pub const VERIFIER_NODE: &str = "verifier";
/// Node name of the reflector.
pub const REFLECTOR_NODE: &str = "reflector";
