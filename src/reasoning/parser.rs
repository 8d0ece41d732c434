//! Layered recovery of structured results from free-form backend text.
//!
//! The backend is asked for a fixed JSON shape but is a non-deterministic
//! text generator, so the payload arrives fenced, quote-wrapped,
//! half-escaped, comma-starved, or not as JSON at all. Recovery is an
//! ordered list of pure functions, each tried only when the previous one
//! fails, ending in a total fallback. The pipeline never errors: every
//! input string yields a well-formed [`ReasoningOutcome`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::types::ReasoningOutcome;

/// Key-name artifacts that regex extraction must not mistake for steps.
const STEP_KEY_ARTIFACTS: &[&str] = &["step", "name", "description", "content", "steps", "title"];

/// Confidence assigned when every structured layer fails.
const FALLBACK_CONFIDENCE: f64 = 0.3;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

/// `true` when the text mentions the synthesis marker.
///
/// The report renderer uses the same predicate to pick the synthesis
/// section out of execution results.
pub fn mentions_synthesis(text: &str) -> bool {
    text.to_lowercase().contains("synthes")
}

/// Recover a structured outcome from arbitrary backend text.
pub fn recover_reasoning(raw: &str) -> ReasoningOutcome {
    let sanitized = sanitize(raw);

    let recovered = parse_json_span(&sanitized, raw)
        .or_else(|| parse_aggressively_unescaped(&sanitized, raw))
        .or_else(|| extract_fields(raw));

    let mut outcome = match recovered {
        Some(outcome) => outcome,
        None => {
            debug!("all structured layers failed, using raw-text fallback");
            fallback(raw)
        }
    };

    if outcome.steps.is_empty() && mentions_synthesis(raw) {
        outcome
            .steps
            .push("Synthesize the findings into a final answer".to_string());
    }
    outcome
}

/// Layer 1: mechanical cleanup before any parse attempt.
fn sanitize(raw: &str) -> String {
    // Drop markdown code-fence lines.
    let mut text: String = raw
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    // Unwrap a payload that is one big quoted string.
    let trimmed = text.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        if inner.contains("\\\"") {
            text = inner.replace("\\\"", "\"");
        } else {
            text = inner.to_string();
        }
    }

    // Escape backslashes that do not begin a valid escape sequence.
    static BAD_ESCAPE: OnceLock<Regex> = OnceLock::new();
    let text = regex(&BAD_ESCAPE, r#"\\([^"\\/bfnrtu])"#)
        .replace_all(&text, r"\\$1")
        .into_owned();

    // Insert the comma missing between a value and the next key.
    static MISSING_COMMA: OnceLock<Regex> = OnceLock::new();
    regex(
        &MISSING_COMMA,
        r#"("(?:[^"\\]|\\.)*")[ \t]*\n([ \t]*"(?:[^"\\]|\\.)*"\s*:)"#,
    )
    .replace_all(&text, "$1,\n$2")
    .into_owned()
}

fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Layer 2: parse the first-`{`-to-last-`}` span directly.
fn parse_json_span(sanitized: &str, raw: &str) -> Option<ReasoningOutcome> {
    let span = json_span(sanitized)?;
    let value: Value = serde_json::from_str(span).ok()?;
    outcome_from_value(&value, raw)
}

/// Layer 3: replace escaped quotes/backslashes, then retry.
fn parse_aggressively_unescaped(sanitized: &str, raw: &str) -> Option<ReasoningOutcome> {
    let unescaped = sanitized.replace("\\\"", "\"").replace("\\\\", "\\");
    let span = json_span(&unescaped)?;
    let value: Value = serde_json::from_str(span).ok()?;
    outcome_from_value(&value, raw)
}

fn outcome_from_value(value: &Value, raw: &str) -> Option<ReasoningOutcome> {
    let object = value.as_object()?;

    let solution = object
        .get("solution")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(0.5);

    let steps = object
        .get("steps")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(step_from_value)
                .filter(|s| is_plausible_step(s))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if solution.is_empty() && steps.is_empty() {
        return None;
    }

    Some(ReasoningOutcome::new(
        solution,
        explanation,
        steps,
        confidence,
        raw,
    ))
}

fn step_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["description", "content", "step", "name"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

fn is_plausible_step(step: &str) -> bool {
    let lower = step.trim().to_lowercase();
    lower.len() >= 6 && !STEP_KEY_ARTIFACTS.contains(&lower.as_str())
}

/// Layer 4: targeted regex extraction from text JSON parsing gave up on.
fn extract_fields(raw: &str) -> Option<ReasoningOutcome> {
    static SOLUTION: OnceLock<Regex> = OnceLock::new();
    static EXPLANATION: OnceLock<Regex> = OnceLock::new();
    static CONFIDENCE: OnceLock<Regex> = OnceLock::new();
    static STEPS_BLOCK: OnceLock<Regex> = OnceLock::new();
    static STEP_OBJECT: OnceLock<Regex> = OnceLock::new();
    static QUOTED: OnceLock<Regex> = OnceLock::new();

    let solution = regex(&SOLUTION, r#""solution"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .captures(raw)
        .map(|c| unescape(&c[1]));
    let explanation = regex(&EXPLANATION, r#""explanation"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .captures(raw)
        .map(|c| unescape(&c[1]));
    let confidence = regex(&CONFIDENCE, r#""confidence"\s*:\s*([0-9]*\.?[0-9]+)"#)
        .captures(raw)
        .and_then(|c| c[1].parse::<f64>().ok())
        .unwrap_or(0.5);

    let mut steps = Vec::new();
    if let Some(block) = regex(&STEPS_BLOCK, r#"(?s)"steps"\s*:\s*\[(.*?)\]"#)
        .captures(raw)
        .map(|c| c[1].to_string())
    {
        // Object-shaped entries first ({step/name, description/content}).
        for capture in regex(
            &STEP_OBJECT,
            r#""(?:description|content|step|name)"\s*:\s*"((?:[^"\\]|\\.)*)""#,
        )
        .captures_iter(&block)
        {
            let step = unescape(&capture[1]);
            if is_plausible_step(&step) {
                steps.push(step);
            }
        }
        // Flat string arrays otherwise.
        if steps.is_empty() {
            for capture in regex(&QUOTED, r#""((?:[^"\\]|\\.)*)""#).captures_iter(&block) {
                let step = unescape(&capture[1]);
                if is_plausible_step(&step) {
                    steps.push(step);
                }
            }
        }
    }

    if solution.is_none() && steps.is_empty() {
        return None;
    }

    Some(ReasoningOutcome::new(
        solution.unwrap_or_default(),
        explanation.unwrap_or_default(),
        steps,
        confidence,
        raw,
    ))
}

fn unescape(text: &str) -> String {
    text.replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\\", "\\")
}

/// Layer 6: the raw text itself becomes the solution. Never fails.
fn fallback(raw: &str) -> ReasoningOutcome {
    let mut hasher = DefaultHasher::new();
    raw.hash(&mut hasher);
    let id = (hasher.finish() & 0xffff_ffff) as u32;

    let truncated: String = raw.chars().take(200).collect();
    let solution = format!("[raw-{id:08x}] {truncated}");

    ReasoningOutcome::new(solution, raw.to_string(), Vec::new(), FALLBACK_CONFIDENCE, raw)
}
