//! Step executor — the phases of a single step.
//!
//! Reason and Reflect degrade instead of failing. Decide retries with a
//! corrective prompt and is fatal once its budget is spent. Act converts
//! every capability failure into an error string. Observe is pure.

use std::sync::Arc;

use deliberate_core::error::{CompletionError, Error, Result};
use deliberate_core::provider::CompletionService;
use deliberate_core::tool::{CapabilityRegistry, CapabilityResult};
use tracing::{debug, error, info, warn};

use crate::decision::{Decision, Reflection, parse_decision, parse_reflection};
use crate::prompts;
use crate::retry::{RetryPolicy, call_with_retry, structured_with_timeout};

/// Output of the Reason phase.
#[derive(Debug, Clone)]
pub struct Reasoning {
    pub text: String,
    /// True when the completion failed and `text` is a placeholder.
    pub degraded: bool,
}

/// Output of the Act phase.
#[derive(Debug, Clone)]
pub enum ActOutcome {
    /// The decision named no capability.
    Skipped,
    Succeeded(CapabilityResult),
    Failed(String),
}

impl ActOutcome {
    pub fn result(&self) -> Option<&CapabilityResult> {
        match self {
            Self::Succeeded(r) => Some(r),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs the phases of a step against one completion service and registry.
pub struct StepExecutor {
    service: Arc<dyn CompletionService>,
    registry: Arc<CapabilityRegistry>,
    retry: RetryPolicy,
    decide_retries: u32,
}

impl StepExecutor {
    pub fn new(service: Arc<dyn CompletionService>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            service,
            registry,
            retry: RetryPolicy::default(),
            decide_retries: 1,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Extra Decide attempts after the first, each with a corrective prompt.
    pub fn with_decide_retries(mut self, retries: u32) -> Self {
        self.decide_retries = retries;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    // ── Reason ──

    pub async fn reason(&self, context: &str) -> Reasoning {
        let prompt = prompts::reason(context);
        match call_with_retry(self.service.as_ref(), &prompt, "reason", &self.retry).await {
            Ok(text) => {
                let preview: String = text.chars().take(500).collect();
                info!(reasoning = %preview, "Reasoning");
                Reasoning {
                    text,
                    degraded: false,
                }
            }
            Err(e) => {
                error!(error = %e, "Reason phase failed");
                Reasoning {
                    text: format!("(Reasoning failed: {e})"),
                    degraded: true,
                }
            }
        }
    }

    // ── Decide ──

    /// Produce the step's decision, or fail after `decide_retries + 1` attempts.
    pub async fn decide(&self, context: &str, reasoning: &str) -> Result<Decision> {
        let attempts = self.decide_retries + 1;
        let mut prompt = prompts::decide(context, reasoning, &self.registry.render_for_prompt());
        let mut last_error = None;

        for attempt in 1..=attempts {
            let service = self.service.as_ref();
            let (raw, structured) = tokio::join!(
                call_with_retry(service, &prompt, "decide", &self.retry),
                structured_with_timeout(service, &prompt, &self.retry),
            );

            let failure = match raw {
                Err(e) => e,
                Ok(raw) => match strict_structured_check(&structured) {
                    Err(e) => e,
                    Ok(()) => {
                        let decision = parse_decision(&raw, Some(&structured));
                        let reasoning_preview: String = decision.reasoning.chars().take(200).collect();
                        let capability = if decision.uses_capability() {
                            decision.capability_id.as_str()
                        } else {
                            "(none)"
                        };
                        info!(
                            next_action = %decision.next_action,
                            capability,
                            should_stop = decision.should_stop,
                            should_revise = decision.should_revise,
                            confidence = decision.confidence,
                            reasoning = %reasoning_preview,
                            "Decision"
                        );
                        return Ok(decision);
                    }
                },
            };

            warn!(attempt, attempts, error = %failure, "Decide attempt failed");
            last_error = Some(failure);
            if attempt < attempts {
                prompt = prompts::decide_corrective(context);
            }
        }

        Err(Error::Decide {
            attempts,
            source: last_error
                .unwrap_or_else(|| CompletionError::MalformedResponse("no decide attempts".into())),
        })
    }

    // ── Act ──

    /// Invoke the decision's capability, if any. Never fails.
    pub async fn act(&self, decision: &Decision) -> ActOutcome {
        if !decision.uses_capability() {
            return ActOutcome::Skipped;
        }
        let id = decision.capability_id.as_str();
        match self.registry.invoke(id, &decision.capability_input).await {
            Ok(result) => {
                let preview: String = result.output.chars().take(200).collect();
                info!(capability = id, result = %preview, "Capability invoked");
                ActOutcome::Succeeded(result)
            }
            Err(e) => {
                warn!(capability = id, error = %e, "Capability failed");
                ActOutcome::Failed(e.to_string())
            }
        }
    }

    // ── Reflect ──

    pub async fn reflect(&self, context: &str, observation: &str, decision: &Decision) -> Reflection {
        let prompt = prompts::reflect(context, observation);
        match call_with_retry(self.service.as_ref(), &prompt, "reflect", &self.retry).await {
            Ok(raw) => {
                let reflection = parse_reflection(&raw);
                debug!(
                    confidence = reflection.confidence,
                    should_revise = reflection.should_revise,
                    "Reflection"
                );
                reflection
            }
            Err(e) => {
                warn!(error = %e, "Reflect phase failed");
                Reflection::degraded(decision.confidence, e.to_string())
            }
        }
    }
}

/// A non-empty structured payload must be a usable decision.
fn strict_structured_check(
    structured: &deliberate_core::provider::StructuredPayload,
) -> std::result::Result<(), CompletionError> {
    if structured.is_empty() {
        return Ok(());
    }
    Decision::from_payload(structured)
        .map(|_| ())
        .map_err(|e| CompletionError::MalformedResponse(format!("unusable structured decision: {e}")))
}

// ── Observe ──

/// Render the observation for a step's act outcome.
pub fn observe(capability_id: &str, outcome: &ActOutcome) -> String {
    match outcome {
        ActOutcome::Failed(e) => format!("capability {capability_id} failed: {e}"),
        ActOutcome::Succeeded(r) => format!("capability {capability_id} result: {}", r.output),
        ActOutcome::Skipped => "No capability used.".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingCapability, ScriptedCompletion};
    use deliberate_tools::default_registry;
    use serde_json::json;

    fn executor(service: ScriptedCompletion) -> (Arc<ScriptedCompletion>, StepExecutor) {
        let service = Arc::new(service);
        let exec = StepExecutor::new(service.clone(), Arc::new(default_registry()))
            .with_retry(RetryPolicy::no_retry())
            .with_decide_retries(1);
        (service, exec)
    }

    #[tokio::test]
    async fn reason_degrades_on_failure() {
        let (_, exec) = executor(ScriptedCompletion::new().fail(CompletionError::Network("down".into())));
        let reasoning = exec.reason("CTX").await;
        assert!(reasoning.degraded);
        assert_eq!(reasoning.text, "(Reasoning failed: Network error: down)");
    }

    #[tokio::test]
    async fn decide_uses_structured_payload() {
        let (_, exec) = executor(
            ScriptedCompletion::new()
                .reply("free text that would parse differently, should_stop")
                .structured(json!({"next_action": "search", "capability_id": "web_search",
                                   "capability_input": {"query": "acme"}, "confidence": 0.7})),
        );
        let d = exec.decide("CTX", "thinking").await.unwrap();
        assert_eq!(d.capability_id, "web_search");
        assert!(!d.should_stop);
    }

    #[tokio::test]
    async fn decide_prompt_lists_capabilities() {
        let (service, exec) = executor(ScriptedCompletion::new().reply("confidence: 0.5"));
        exec.decide("CTX", "thinking").await.unwrap();
        let prompt = &service.prompts()[0];
        assert!(prompt.contains("- search_companies:"));
        assert!(prompt.contains("Your reasoning so far: thinking"));
    }

    #[tokio::test]
    async fn unusable_structured_payload_triggers_corrective_retry() {
        let (service, exec) = executor(
            ScriptedCompletion::new()
                .reply("first")
                .structured(json!({"confidence": "very"}))
                .reply(r#"{"next_action": "answer", "should_stop": true, "confidence": 0.9}"#),
        );
        let d = exec.decide("CTX", "thinking").await.unwrap();
        assert!(d.should_stop);
        assert_eq!(service.call_count(), 2);
        assert!(service.prompts()[1].contains("previous response was invalid"));
    }

    #[tokio::test]
    async fn decide_reraises_final_failure() {
        let (service, exec) = executor(
            ScriptedCompletion::new()
                .fail(CompletionError::Network("attempt one".into()))
                .fail(CompletionError::Network("attempt two".into())),
        );
        let err = exec.decide("CTX", "thinking").await.unwrap_err();
        match err {
            Error::Decide { attempts, source } => {
                assert_eq!(attempts, 2);
                assert_eq!(source, CompletionError::Network("attempt two".into()));
            }
            other => panic!("expected Decide error, got {other:?}"),
        }
        assert_eq!(service.call_count(), 2);
    }

    #[tokio::test]
    async fn act_skips_without_capability() {
        let (_, exec) = executor(ScriptedCompletion::new());
        assert!(matches!(exec.act(&Decision::default()).await, ActOutcome::Skipped));
    }

    #[tokio::test]
    async fn act_unknown_capability_is_error_string() {
        let (_, exec) = executor(ScriptedCompletion::new());
        let decision = Decision {
            capability_id: "ghost".into(),
            ..Decision::default()
        };
        let outcome = exec.act(&decision).await;
        assert!(outcome.result().is_none());
        let error = outcome.error().unwrap();
        assert!(error.starts_with("Unknown capability: ghost"));
        assert_eq!(
            observe("ghost", &outcome),
            format!("capability ghost failed: {error}")
        );
    }

    #[tokio::test]
    async fn act_invalid_input_is_error_string() {
        let (_, exec) = executor(ScriptedCompletion::new());
        let decision = Decision {
            capability_id: "get_contact".into(),
            ..Decision::default()
        };
        let outcome = exec.act(&decision).await;
        assert!(outcome.error().unwrap().contains("missing required field 'company_key'"));
    }

    #[tokio::test]
    async fn act_execution_failure_is_error_string() {
        let service = Arc::new(ScriptedCompletion::new());
        let registry = default_registry().with(Box::new(FailingCapability));
        let exec = StepExecutor::new(service, Arc::new(registry));
        let decision = Decision {
            capability_id: FailingCapability::ID.into(),
            ..Decision::default()
        };

        let outcome = exec.act(&decision).await;
        assert!(matches!(outcome, ActOutcome::Failed(_)));
        assert_eq!(
            observe(FailingCapability::ID, &outcome),
            "capability crm_export failed: Capability crm_export failed: upstream returned 500"
        );
    }

    #[tokio::test]
    async fn act_success_and_observe() {
        let (_, exec) = executor(ScriptedCompletion::new());
        let decision = Decision {
            capability_id: "get_contact".into(),
            capability_input: json!({"company_key": "acme"}).as_object().cloned().unwrap(),
            ..Decision::default()
        };
        let outcome = exec.act(&decision).await;
        assert_eq!(
            observe("get_contact", &outcome),
            "capability get_contact result: Name: Jane Doe, Role: VP Sales, Email: jane@acme.com"
        );
    }

    #[test]
    fn observe_without_capability() {
        assert_eq!(observe("", &ActOutcome::Skipped), "No capability used.");
    }

    #[tokio::test]
    async fn reflect_degrades_to_decision_confidence() {
        let (_, exec) = executor(ScriptedCompletion::new().fail(CompletionError::Timeout(60)));
        let decision = Decision {
            confidence: 0.8,
            ..Decision::default()
        };
        let reflection = exec.reflect("CTX", "No capability used.", &decision).await;
        assert_eq!(reflection.confidence, 0.8);
        assert!(!reflection.should_revise);
        assert_eq!(reflection.critique, "Request timed out after 60s");
    }
}
