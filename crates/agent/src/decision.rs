//! Decisions and reflections — turning model text into loop signals.
//!
//! [`parse_decision`] is an ordered chain of strategies, each returning
//! `Option<Decision>`:
//!
//! 1. a non-empty structured payload from `complete_structured`
//! 2. a JSON object embedded in the raw text that carries a decision key
//! 3. heuristic phrase scanning, which always produces a decision
//!
//! [`parse_reflection`] reuses the heuristic scanning for the Reflect phase.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use deliberate_core::provider::StructuredPayload;

pub const DEFAULT_NEXT_ACTION: &str = "continue";
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
const NO_REASONING: &str = "No reasoning provided.";

/// Keys that mark an embedded JSON object as a decision.
const DECISION_KEYS: &[&str] = &["capability_id", "tool_id", "next_action", "should_stop"];
const INPUT_KEYS: &[&str] = &["capability_input", "tool_input", "tool_args", "arguments"];
const ID_KEYS: &[&str] = &["capability_id", "tool_id"];

static CONFIDENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"confidence[:\s]+(\d+\.?\d*)").unwrap());
static YES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\byes\b").unwrap());
static STOP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bstop\b").unwrap());

/// Output of the Decide phase. Built fresh each step and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub next_action: String,
    /// Empty means no capability is invoked this step.
    pub capability_id: String,
    pub capability_input: Map<String, Value>,
    pub confidence: f64,
    pub should_stop: bool,
    pub should_revise: bool,
    pub reasoning: String,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            next_action: DEFAULT_NEXT_ACTION.into(),
            capability_id: String::new(),
            capability_input: Map::new(),
            confidence: DEFAULT_CONFIDENCE,
            should_stop: false,
            should_revise: false,
            reasoning: String::new(),
        }
    }
}

impl Decision {
    /// Whether this decision invokes a capability.
    pub fn uses_capability(&self) -> bool {
        !self.capability_id.is_empty()
    }

    /// Label recorded in turn history: `tool=<id>` or the action text.
    pub fn action_label(&self) -> String {
        if self.uses_capability() {
            format!("tool={}", self.capability_id)
        } else {
            self.next_action.clone()
        }
    }

    /// Build a decision from a mapping, filling documented defaults.
    ///
    /// Accepts the alias keys `tool_id` and `tool_input`/`tool_args`/`arguments`,
    /// numeric strings for `confidence` and `"true"`/`"false"` for the flags.
    /// A bare string input is wrapped as `{"query": ...}`.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, DecisionError> {
        let next_action = match payload.get("next_action") {
            None | Some(Value::Null) => DEFAULT_NEXT_ACTION.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => return Err(DecisionError::field("next_action", other)),
        };

        let capability_id = match first_present(payload, ID_KEYS) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => return Err(DecisionError::field("capability_id", other)),
        };

        let capability_input = match first_present(payload, INPUT_KEYS) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(s)) if s.trim().is_empty() => Map::new(),
            Some(Value::String(s)) => {
                let mut map = Map::new();
                map.insert("query".into(), Value::String(s.clone()));
                map
            }
            Some(other) => return Err(DecisionError::field("capability_input", other)),
        };

        let confidence = match payload.get("confidence") {
            None | Some(Value::Null) => DEFAULT_CONFIDENCE,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_CONFIDENCE),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|c| c.is_finite())
                .ok_or_else(|| DecisionError::field("confidence", &Value::String(s.clone())))?,
            Some(other) => return Err(DecisionError::field("confidence", other)),
        };

        let reasoning = match payload.get("reasoning") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            next_action,
            capability_id,
            capability_input,
            confidence,
            should_stop: flag(payload, "should_stop")?,
            should_revise: flag(payload, "should_revise")?,
            reasoning,
        })
    }
}

/// A structured payload that could not be turned into a [`Decision`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionError {
    #[error("field '{field}' has unusable value {value}")]
    InvalidField { field: &'static str, value: String },
}

impl DecisionError {
    fn field(field: &'static str, value: &Value) -> Self {
        Self::InvalidField {
            field,
            value: value.to_string(),
        }
    }
}

fn first_present<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| payload.get(*k))
}

fn flag(payload: &Map<String, Value>, key: &'static str) -> Result<bool, DecisionError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            _ => Err(DecisionError::field(key, &Value::String(s.clone()))),
        },
        Some(other) => Err(DecisionError::field(key, other)),
    }
}

// ── Parser chain ──────────────────────────────────────────────────────────

/// Derive exactly one decision from model output. Never fails.
pub fn parse_decision(raw: &str, structured: Option<&StructuredPayload>) -> Decision {
    structured
        .and_then(from_structured)
        .or_else(|| from_embedded_json(raw))
        .unwrap_or_else(|| from_heuristics(raw))
}

/// Strategy 1: the structured payload, when present and non-empty.
///
/// An empty payload counts as absent so that raw text is still consulted.
pub fn from_structured(payload: &StructuredPayload) -> Option<Decision> {
    if payload.is_empty() {
        return None;
    }
    Decision::from_payload(payload).ok()
}

/// Strategy 2: the first JSON object in `raw` that carries a decision key.
pub fn from_embedded_json(raw: &str) -> Option<Decision> {
    raw.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) if DECISION_KEYS.iter().any(|k| map.contains_key(*k)) => {
                Decision::from_payload(&map).ok()
            }
            _ => None,
        }
    })
}

/// Strategy 3: phrase matching and confidence extraction. Total.
pub fn from_heuristics(raw: &str) -> Decision {
    let lower = raw.to_lowercase();
    let should_stop = lower.contains("should_stop")
        || lower.contains("stop and respond")
        || (YES_RE.is_match(&lower) && STOP_RE.is_match(&lower));
    let should_revise = lower.contains("revise");

    let trimmed = raw.trim();
    Decision {
        confidence: extract_confidence(&lower).unwrap_or(DEFAULT_CONFIDENCE),
        should_stop,
        should_revise,
        reasoning: if trimmed.is_empty() {
            NO_REASONING.into()
        } else {
            trimmed.to_string()
        },
        ..Decision::default()
    }
}

/// `confidence: <n>` from lowercased text. Values above 1 are read as
/// percentages.
pub fn extract_confidence(lower: &str) -> Option<f64> {
    let caps = CONFIDENCE_RE.captures(lower)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let value = if value > 1.0 { value / 100.0 } else { value };
    Some(value.min(1.0))
}

// ── Reflection ────────────────────────────────────────────────────────────

/// Self-critique derived from the Reflect phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub confidence: f64,
    pub should_revise: bool,
    pub critique: String,
}

impl Reflection {
    /// The downgraded reflection used when the Reflect call fails.
    pub fn degraded(confidence: f64, critique: impl Into<String>) -> Self {
        Self {
            confidence,
            should_revise: false,
            critique: critique.into(),
        }
    }
}

/// Derive a reflection from raw self-critique text. Never fails.
pub fn parse_reflection(raw: &str) -> Reflection {
    let lower = raw.to_lowercase();
    Reflection {
        confidence: extract_confidence(&lower).unwrap_or(DEFAULT_CONFIDENCE),
        should_revise: lower.contains("revise") || lower.contains("not sufficient"),
        critique: raw.trim().to_string(),
    }
}
