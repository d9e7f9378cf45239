//! Stop policies — whether a decision that asks to stop is allowed to.
//!
//! The loop consults the policy only when a step is not being revised and
//! the decision sets `should_stop`. A rejected stop forces another step.

use deliberate_config::{StopPolicyConfig, StopPolicyKind};

use crate::decision::Decision;

/// Outcome of a stop check.
#[derive(Debug, Clone, PartialEq)]
pub enum StopVerdict {
    Accept,
    Reject(String),
}

pub trait StopPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Judge a decision that has `should_stop` set.
    fn check(&self, decision: &Decision) -> StopVerdict;
}

/// Stops whenever the decision asks to.
#[derive(Debug, Default)]
pub struct Permissive;

impl StopPolicy for Permissive {
    fn name(&self) -> &str {
        "permissive"
    }

    fn check(&self, _decision: &Decision) -> StopVerdict {
        StopVerdict::Accept
    }
}

/// Refuses low-confidence stops, and stops that admit missing information
/// without having invoked a capability in the same step.
#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    min_confidence: f64,
    insufficient_phrases: Vec<String>,
}

impl ConfidenceGate {
    pub fn new(min_confidence: f64, insufficient_phrases: Vec<String>) -> Self {
        Self {
            min_confidence,
            insufficient_phrases: insufficient_phrases
                .into_iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    fn admitted_gap(&self, reasoning: &str) -> Option<&str> {
        let lower = reasoning.to_lowercase();
        self.insufficient_phrases
            .iter()
            .find(|p| lower.contains(p.as_str()))
            .map(String::as_str)
    }
}

impl StopPolicy for ConfidenceGate {
    fn name(&self) -> &str {
        "confidence_gate"
    }

    fn check(&self, decision: &Decision) -> StopVerdict {
        if decision.confidence.is_nan() || decision.confidence < self.min_confidence {
            return StopVerdict::Reject(format!(
                "confidence {:.2} below minimum {:.2}",
                decision.confidence, self.min_confidence
            ));
        }
        if !decision.uses_capability()
            && let Some(phrase) = self.admitted_gap(&decision.reasoning)
        {
            return StopVerdict::Reject(format!(
                "reasoning admits missing information ('{phrase}') and no capability was used"
            ));
        }
        StopVerdict::Accept
    }
}

/// Build the configured policy.
pub fn from_config(config: &StopPolicyConfig) -> Box<dyn StopPolicy> {
    match config.kind {
        StopPolicyKind::Permissive => Box::new(Permissive),
        StopPolicyKind::ConfidenceGate => Box::new(ConfidenceGate::new(
            config.min_confidence,
            config.insufficient_phrases.clone(),
        )),
    }
}
