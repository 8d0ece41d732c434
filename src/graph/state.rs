//! The mutable-via-cloning record threaded through every investigation step.
//!
//! A node behavior receives a clone of the current state and returns a new
//! clone; nothing is mutated in place once a state instance has been handed
//! to a caller. The context store is a closed enum-keyed map so that
//! lookups cannot collide on ad-hoc strings, and every accessor falls back
//! to a default instead of erroring on a missing or mismatched key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retrieval::ScoredDocument;

/// Keys of the investigation context store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKey {
    /// The investigation query text.
    Query,
    /// Correlation id scoping evidence to one operational session.
    CorrelationId,
    /// Evidence documents gathered before the graph run.
    PreRetrievalDocs,
    /// Ordered plan steps produced by the planner.
    Plan,
    /// The planner's rationale for the plan.
    PlanExplanation,
    /// Index of the next plan step to execute.
    CurrentStep,
    /// One execution finding per plan step.
    ExecutionResults,
    /// Whether verification passed.
    VerificationPassed,
    /// Verification confidence in [0.0, 1.0].
    VerificationScore,
    /// Human-readable verification outcome.
    VerificationReason,
    /// The reflector's failure analysis.
    ReflexionAnalysis,
    /// The reflector's suggested corrections.
    ReflexionCorrections,
    /// Whether the reflector approved a retry.
    ReflexionShouldRetry,
}

/// Values storable in the context map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    /// Free text.
    Text(String),
    /// Boolean flag.
    Flag(bool),
    /// Score or confidence.
    Number(f64),
    /// Step counter.
    Counter(usize),
    /// Ordered list of strings (plan steps, execution results).
    List(Vec<String>),
    /// Evidence documents.
    Docs(Vec<ScoredDocument>),
}

/// Role of one message in the investigation narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

/// One turn in the investigation's message log. Appended, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Who produced the message.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
    /// Name of the tool that produced a `Tool` message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// When the message was appended.
    pub timestamp: DateTime<Utc>,
}

/// The evolving record of one investigation.
///
/// Cloning is a deep copy: the context map and message log own their
/// contents, so no node behavior can observe mutations made through a
/// sibling clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Name of the node currently executing (or the start marker).
    pub current_node: String,
    context: HashMap<ContextKey, ContextValue>,
    messages: Vec<AgentMessage>,
    /// Set when the graph run has finished, successfully or not.
    pub is_complete: bool,
    /// Count of node executions so far. Monotonically non-decreasing.
    pub iteration: u32,
    /// Backstop against runaway loops from cyclic edges.
    pub max_iterations: u32,
    /// Terminal error, if the run failed.
    pub error: Option<String>,
}

impl AgentState {
    /// Create a fresh state with the given iteration cap.
    pub fn new(max_iterations: u32) -> Self {
        Self {
            current_node: String::new(),
            context: HashMap::new(),
            messages: Vec::new(),
            is_complete: false,
            iteration: 0,
            max_iterations,
            error: None,
        }
    }

    /// Return a clone with one context key set.
    pub fn with_context(&self, key: ContextKey, value: ContextValue) -> Self {
        let mut next = self.clone();
        next.context.insert(key, value);
        next
    }

    /// Return a clone with one context key removed.
    pub fn without_context(&self, key: ContextKey) -> Self {
        let mut next = self.clone();
        next.context.remove(&key);
        next
    }

    /// Return a clone with a user message appended.
    pub fn with_user_message(&self, content: impl Into<String>) -> Self {
        self.push_message(MessageRole::User, content.into(), None)
    }

    /// Return a clone with an assistant message appended.
    pub fn with_assistant_message(&self, content: impl Into<String>) -> Self {
        self.push_message(MessageRole::Assistant, content.into(), None)
    }

    /// Return a clone with a tool message appended.
    pub fn with_tool_message(
        &self,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.push_message(MessageRole::Tool, content.into(), Some(tool_name.into()))
    }

    /// Return a clone carrying a terminal error and the completion flag.
    pub fn with_error(&self, message: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.error = Some(message.into());
        next.is_complete = true;
        next
    }

    fn push_message(&self, role: MessageRole, content: String, tool_name: Option<String>) -> Self {
        let mut next = self.clone();
        next.messages.push(AgentMessage {
            role,
            content,
            tool_name,
            timestamp: Utc::now(),
        });
        next
    }

    /// The ordered message log.
    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    /// Text value, or empty string when absent or of another shape.
    pub fn text(&self, key: ContextKey) -> String {
        match self.context.get(&key) {
            Some(ContextValue::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Boolean value, or `false` when absent or of another shape.
    pub fn flag(&self, key: ContextKey) -> bool {
        match self.context.get(&key) {
            Some(ContextValue::Flag(b)) => *b,
            _ => false,
        }
    }

    /// Numeric value, or `0.0` when absent or of another shape.
    pub fn number(&self, key: ContextKey) -> f64 {
        match self.context.get(&key) {
            Some(ContextValue::Number(n)) => *n,
            _ => 0.0,
        }
    }

    /// Counter value, or `0` when absent or of another shape.
    pub fn counter(&self, key: ContextKey) -> usize {
        match self.context.get(&key) {
            Some(ContextValue::Counter(n)) => *n,
            _ => 0,
        }
    }

    /// String-list value, or empty when absent or of another shape.
    pub fn list(&self, key: ContextKey) -> Vec<String> {
        match self.context.get(&key) {
            Some(ContextValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Document-list value, or empty when absent or of another shape.
    pub fn docs(&self, key: ContextKey) -> Vec<ScoredDocument> {
        match self.context.get(&key) {
            Some(ContextValue::Docs(docs)) => docs.clone(),
            _ => Vec::new(),
        }
    }

    /// `true` when the key holds any value.
    pub fn has(&self, key: ContextKey) -> bool {
        self.context.contains_key(&key)
    }
}
