//! Centralized prompt definitions for the investigation loop
//!
//! This module contains all prompt templates sent to the generation
//! backend. Centralizing prompts makes them easier to maintain, test, and
//! version.

/// Instructions demanding the fixed JSON response shape.
///
/// Appended to every reasoning prompt built by the gateway.
pub const CHAIN_OF_THOUGHT_INSTRUCTIONS: &str = r#"Think through the task step by step, then respond.

Your response MUST be valid JSON in this exact format:
{
  "solution": "your condensed answer here",
  "explanation": "supporting reasoning here",
  "steps": ["first step", "second step"],
  "confidence": 0.8
}

Guidelines:
- Ground every claim in the evidence provided
- Keep steps concrete and actionable
- confidence should be between 0.0 and 1.0

Always respond with valid JSON only, no other text."#;

/// Background guidelines appended to reasoning prompts.
///
/// Marked "do not echo" so the backend does not repeat them in output.
pub const ANALYSIS_GUIDELINES: &str = r#"Background analysis guidelines (do not echo these in your response):
- Prefer evidence from session-scoped logs over general knowledge
- Distinguish symptoms from root causes
- Call out missing evidence explicitly instead of guessing
- When evidence conflicts, say so and weigh recency higher"#;

/// Task framing for the planner.
pub const PLANNER_TASK: &str = r#"You are planning a log investigation. Produce an ordered list of investigation steps that would answer the query below. Put the plan into "steps", a one-line summary into "solution", and your rationale into "explanation"."#;

/// Task framing for the executor's single batched call.
pub const EXECUTOR_TASK: &str = r#"You are executing an investigation plan. For EVERY plan step listed below, produce one finding grounded in the evidence. Return the findings in "steps" (one entry per plan step, same order), an overall synthesis in "solution", and your reasoning in "explanation"."#;

/// Task framing for the reflector's failure analysis.
pub const REFLEXION_TASK: &str = r#"An investigation attempt failed verification. Analyze why, and propose concrete corrections for the next attempt. Put the failure analysis into "explanation", the corrections into "solution", corrective actions into "steps", and your confidence that a retry with these corrections would succeed into "confidence"."#;

/// Prompt for scoring the confidence of an answer in isolation.
pub const CONFIDENCE_TASK: &str = r#"Rate how well the following investigation findings answer the stated query. Respond with a single number between 0.0 and 1.0 and nothing else."#;
