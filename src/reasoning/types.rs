//! Value types produced by the reasoning layer.

use serde::{Deserialize, Serialize};

/// Outcome of one reasoning-gateway call.
///
/// Always well-formed: the recovery pipeline degrades malformed backend
/// output into a usable outcome instead of erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningOutcome {
    /// Condensed answer to the task.
    pub solution: String,
    /// Supporting explanation.
    pub explanation: String,
    /// Ordered reasoning or execution steps.
    pub steps: Vec<String>,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// The raw backend text the outcome was recovered from.
    pub raw: String,
}

impl ReasoningOutcome {
    /// Create an outcome with a clamped confidence.
    pub fn new(
        solution: impl Into<String>,
        explanation: impl Into<String>,
        steps: Vec<String>,
        confidence: f64,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            solution: solution.into(),
            explanation: explanation.into(),
            steps,
            confidence: confidence.clamp(0.0, 1.0),
            raw: raw.into(),
        }
    }
}

/// Outcome of the reflector's failure analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflexionOutcome {
    /// What went wrong, per the analysis.
    pub analysis: String,
    /// Suggested corrections for the next attempt.
    pub corrections: String,
    /// Whether a retry was approved.
    pub should_retry: bool,
    /// Confidence in the analysis, in [0.0, 1.0].
    pub confidence: f64,
}

impl ReflexionOutcome {
    /// The no-op outcome used when verification already passed.
    pub fn no_correction_needed() -> Self {
        Self {
            analysis: "Verification passed; no correction needed".to_string(),
            corrections: String::new(),
            should_retry: false,
            confidence: 0.95,
        }
    }
}
