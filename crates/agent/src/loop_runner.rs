//! The control loop — drives steps until a stop, the step budget, or cancellation.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use deliberate_config::AppConfig;
use deliberate_core::error::Result;
use deliberate_core::event::{EventBus, LoopEvent};
use deliberate_core::provider::CompletionService;
use deliberate_core::tool::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::decision::{Decision, Reflection};
use crate::history::TurnHistory;
use crate::policy::{self, ConfidenceGate, StopPolicy, StopVerdict};
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::step::{ActOutcome, StepExecutor, observe};
use crate::working_memory::WorkingMemory;

pub const TASK_COMPLETED_ANSWER: &str = "Task completed.";
pub const BUDGET_EXHAUSTED_ANSWER: &str = "Max steps reached; no final answer yet.";
pub const CANCELLED_ANSWER: &str = "Run cancelled before a final answer.";

const MEMORY_OBSERVATION_CHARS: usize = 150;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Stopped,
    BudgetExhausted,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub answer: String,
    pub state: RunState,
    /// Steps executed; never more than the configured maximum.
    pub steps: u32,
    pub turns: TurnHistory,
    pub memory: WorkingMemory,
}

/// What one step hands back to the loop.
struct StepRecord {
    decision: Decision,
    observation: String,
    reflection: Reflection,
}

/// The Reason → Decide → Act → Observe → Update → Reflect loop.
pub struct ControlLoop {
    executor: StepExecutor,

    /// Gate applied to stop requests
    stop_policy: Box<dyn StopPolicy>,

    /// Step budget
    max_steps: u32,

    /// Turns rendered into each step's context
    recent_turns: usize,

    memory_capacity: usize,
    saved_note_capacity: usize,
    summary_max_chars: usize,

    /// Optional observability port
    events: Option<Arc<EventBus>>,

    /// Checked between steps
    cancel: CancellationToken,
}

impl ControlLoop {
    /// Create a loop with default limits and a 0.6 confidence gate.
    pub fn new(service: Arc<dyn CompletionService>, registry: Arc<CapabilityRegistry>) -> Self {
        let defaults = AppConfig::default();
        Self {
            executor: StepExecutor::new(service, registry),
            stop_policy: Box::new(ConfidenceGate::new(
                defaults.stop_policy.min_confidence,
                defaults.stop_policy.insufficient_phrases,
            )),
            max_steps: defaults.agent.max_steps,
            recent_turns: defaults.agent.recent_turns,
            memory_capacity: defaults.agent.memory_capacity,
            saved_note_capacity: defaults.agent.saved_note_capacity,
            summary_max_chars: defaults.agent.summary_max_chars,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a loop whose limits, retry budgets and stop policy come from configuration.
    pub fn from_config(
        service: Arc<dyn CompletionService>,
        registry: Arc<CapabilityRegistry>,
        config: &AppConfig,
    ) -> Self {
        let agent = &config.agent;
        let executor = StepExecutor::new(service, registry)
            .with_retry(RetryPolicy::from_settings(agent, config.provider.timeout_secs))
            .with_decide_retries(agent.decide_parse_retries);

        Self {
            executor,
            stop_policy: policy::from_config(&config.stop_policy),
            max_steps: agent.max_steps,
            recent_turns: agent.recent_turns,
            memory_capacity: agent.memory_capacity,
            saved_note_capacity: agent.saved_note_capacity,
            summary_max_chars: agent.summary_max_chars,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the step budget.
    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    /// Replace the stop policy.
    pub fn with_stop_policy(mut self, policy: Box<dyn StopPolicy>) -> Self {
        self.stop_policy = policy;
        self
    }

    /// Set the retry policy for every completion call.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.executor = self.executor.with_retry(retry);
        self
    }

    /// Set how many corrective Decide attempts follow a failed one.
    pub fn with_decide_retries(mut self, retries: u32) -> Self {
        self.executor = self.executor.with_decide_retries(retries);
        self
    }

    /// Set how many recent turns are rendered into context.
    pub fn with_recent_turns(mut self, k: usize) -> Self {
        self.recent_turns = k;
        self
    }

    /// Set working memory bounds and the summary budget.
    pub fn with_memory_limits(mut self, capacity: usize, saved_notes: usize, summary_chars: usize) -> Self {
        self.memory_capacity = capacity;
        self.saved_note_capacity = saved_notes;
        self.summary_max_chars = summary_chars;
        self
    }

    /// Attach an event bus.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Run the loop on `task`.
    ///
    /// Fails only when Decide exhausts its retry budget.
    pub async fn run(&self, task: &str) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let mut memory = WorkingMemory::new(self.memory_capacity, self.saved_note_capacity);
        let mut turns = TurnHistory::new();
        let mut step: u32 = 0;

        info!(
            run_id = %run_id,
            max_steps = self.max_steps,
            stop_policy = self.stop_policy.name(),
            capabilities = self.executor.registry().len(),
            "Starting run"
        );

        let (state, answer) = loop {
            if self.cancel.is_cancelled() {
                info!(run_id = %run_id, step, "Run cancelled");
                break (RunState::Cancelled, CANCELLED_ANSWER.to_string());
            }
            if step >= self.max_steps {
                info!(run_id = %run_id, step, "Max steps reached");
                break (RunState::BudgetExhausted, BUDGET_EXHAUSTED_ANSWER.to_string());
            }

            step += 1;
            info!(run_id = %run_id, step, "--- Step {step} ---");
            self.emit(LoopEvent::StepStarted {
                run_id: run_id.clone(),
                step,
                timestamp: Utc::now(),
            });

            let record = match self.run_step(step, task, &mut memory, &mut turns).await {
                Ok(record) => record,
                Err(e) => {
                    self.emit(LoopEvent::Finished {
                        run_id: run_id.clone(),
                        state: "failed".into(),
                        steps: step,
                        timestamp: Utc::now(),
                    });
                    return Err(e);
                }
            };

            // Revise takes priority over stopping.
            if record.decision.should_revise || record.reflection.should_revise {
                info!(step, "Revising: looping again without a final answer");
                continue;
            }
            if !record.decision.should_stop {
                continue;
            }

            match self.stop_policy.check(&record.decision) {
                StopVerdict::Accept => {
                    let answer = final_answer(&record.decision, &record.observation);
                    let preview: String = answer.chars().take(300).collect();
                    info!(step, answer = %preview, "Stopping");
                    break (RunState::Stopped, answer);
                }
                StopVerdict::Reject(reason) => {
                    warn!(step, reason = %reason, "Stop rejected");
                    self.emit(LoopEvent::StopRejected {
                        step,
                        reason,
                        timestamp: Utc::now(),
                    });
                }
            }
        };

        self.emit(LoopEvent::Finished {
            run_id: run_id.clone(),
            state: state.as_str().into(),
            steps: step,
            timestamp: Utc::now(),
        });

        Ok(RunOutcome {
            run_id,
            answer,
            state,
            steps: step,
            turns,
            memory,
        })
    }

    async fn run_step(
        &self,
        step: u32,
        task: &str,
        memory: &mut WorkingMemory,
        turns: &mut TurnHistory,
    ) -> Result<StepRecord> {
        let context = prompts::context(
            task,
            &memory.summary(self.summary_max_chars),
            &turns.render(self.recent_turns),
        );

        // 1. Reason
        let reasoning = self.executor.reason(&context).await;
        self.emit(LoopEvent::Reasoned {
            step,
            degraded: reasoning.degraded,
            timestamp: Utc::now(),
        });

        // 2. Decide
        let decision = self.executor.decide(&context, &reasoning.text).await?;
        self.emit(LoopEvent::Decided {
            step,
            next_action: decision.next_action.clone(),
            capability_id: decision.capability_id.clone(),
            confidence: decision.confidence,
            should_stop: decision.should_stop,
            should_revise: decision.should_revise,
            timestamp: Utc::now(),
        });

        // 3. Act
        let started = Instant::now();
        let outcome = self.executor.act(&decision).await;
        if decision.uses_capability() {
            self.emit(LoopEvent::CapabilityInvoked {
                step,
                capability_id: decision.capability_id.clone(),
                success: outcome.error().is_none(),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });
        }

        // 4. Observe
        let observation = observe(&decision.capability_id, &outcome);
        let preview: String = observation.chars().take(300).collect();
        info!(step, observation = %preview, "Observation");

        // 5. Update
        let excerpt: String = observation.chars().take(MEMORY_OBSERVATION_CHARS).collect();
        let tool = if decision.uses_capability() {
            decision.capability_id.as_str()
        } else {
            "none"
        };
        memory.add(format!(
            "Step {step}: decision={} tool={tool}; observation: {excerpt}",
            decision.next_action
        ));
        if let ActOutcome::Succeeded(result) = &outcome
            && self.executor.registry().is_note_taking(&decision.capability_id)
        {
            debug!(step, "Promoting result to saved notes");
            memory.add_saved_note(result.output.clone());
        }
        turns.push(decision.action_label(), observation.clone());

        // 6. Reflect
        let reflection = self.executor.reflect(&context, &observation, &decision).await;
        self.emit(LoopEvent::Reflected {
            step,
            confidence: reflection.confidence,
            should_revise: reflection.should_revise,
            timestamp: Utc::now(),
        });

        Ok(StepRecord {
            decision,
            observation,
            reflection,
        })
    }
}

/// Reasoning, else the observation, else a fixed fallback.
fn final_answer(decision: &Decision, observation: &str) -> String {
    if !decision.reasoning.trim().is_empty() {
        decision.reasoning.clone()
    } else if !observation.trim().is_empty() {
        observation.to_string()
    } else {
        TASK_COMPLETED_ANSWER.to_string()
    }
}

/// Run `task` with default settings and return only the final answer.
///
/// `max_steps` defaults to the configured default budget and `registry`
/// to the general-purpose capability set.
pub async fn run_task(
    service: Arc<dyn CompletionService>,
    task: &str,
    max_steps: Option<u32>,
    registry: Option<Arc<CapabilityRegistry>>,
) -> Result<String> {
    let registry = registry.unwrap_or_else(|| Arc::new(deliberate_tools::default_registry()));
    let mut control = ControlLoop::new(service, registry);
    if let Some(max) = max_steps {
        control = control.with_max_steps(max);
    }
    Ok(control.run(task).await?.answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Permissive;
    use crate::test_helpers::{FailingCapability, ScriptedCompletion};
    use deliberate_core::error::{CompletionError, Error};
    use deliberate_tools::default_registry;
    use serde_json::json;

    const REASON: &str = "I know little so far.";
    const REFLECT_OK: &str = "Assumptions are reasonable. Confidence: 0.8";

    fn control(service: &Arc<ScriptedCompletion>) -> ControlLoop {
        ControlLoop::new(service.clone(), Arc::new(default_registry()))
            .with_retry(RetryPolicy::no_retry())
    }

    #[tokio::test]
    async fn stops_at_step_one_with_reasoning_as_answer() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply("")
                .structured(json!({
                    "next_action": "answer",
                    "should_stop": true,
                    "confidence": 0.9,
                    "reasoning": "VALUE HYPOTHESIS: X MESSAGING ANGLE: Y SUPPORTING EVIDENCE: Z"
                }))
                .reply(REFLECT_OK),
        );
        let outcome = control(&service).run("Brief Acme").await.unwrap();
        assert_eq!(outcome.state, RunState::Stopped);
        assert_eq!(outcome.steps, 1);
        assert_eq!(
            outcome.answer,
            "VALUE HYPOTHESIS: X MESSAGING ANGLE: Y SUPPORTING EVIDENCE: Z"
        );
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test]
    async fn low_confidence_stop_is_rejected() {
        let service = Arc::new(
            ScriptedCompletion::new()
                // step 1: stop at 0.4 is refused
                .reply(REASON)
                .reply(r#"{"next_action": "answer", "should_stop": true, "confidence": 0.4, "reasoning": "Guess."}"#)
                .reply(REFLECT_OK)
                // step 2: stop at 0.9 is accepted
                .reply(REASON)
                .reply(r#"{"next_action": "answer", "should_stop": true, "confidence": 0.9, "reasoning": "Final."}"#)
                .reply(REFLECT_OK),
        );
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();

        let outcome = control(&service).with_events(bus).run("task").await.unwrap();
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.answer, "Final.");

        let mut rejected = 0;
        while let Ok(event) = rx.try_recv() {
            if let LoopEvent::StopRejected { step, reason, .. } = event.as_ref() {
                assert_eq!(*step, 1);
                assert!(reason.contains("below minimum"));
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1);
    }

    #[tokio::test]
    async fn permissive_policy_accepts_low_confidence() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.1, "reasoning": "Done anyway."}"#)
                .reply(REFLECT_OK),
        );
        let outcome = control(&service)
            .with_stop_policy(Box::new(Permissive))
            .run("task")
            .await
            .unwrap();
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.answer, "Done anyway.");
    }

    #[tokio::test]
    async fn unknown_capability_is_observed_and_run_continues() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply(r#"{"next_action": "lookup", "capability_id": "ghost", "capability_input": {}}"#)
                .reply(REFLECT_OK)
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.9, "reasoning": "Answer without ghost."}"#)
                .reply(REFLECT_OK),
        );
        let outcome = control(&service).run("task").await.unwrap();
        assert_eq!(outcome.state, RunState::Stopped);
        assert_eq!(outcome.turns.len(), 2);

        let first = &outcome.turns.turns()[0];
        assert_eq!(first.action, "tool=ghost");
        assert!(first.observation.starts_with("capability ghost failed: Unknown capability: ghost"));

        // The failure is visible to the next step's Reason prompt.
        let prompts = service.prompts();
        assert!(prompts[3].contains("Turn 1: tool=ghost -> capability ghost failed"));
    }

    #[tokio::test]
    async fn failing_capability_is_observed_and_run_continues() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply(r#"{"next_action": "export", "capability_id": "crm_export"}"#)
                .reply(REFLECT_OK)
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.9, "reasoning": "Brief without the export."}"#)
                .reply(REFLECT_OK),
        );
        let registry = default_registry().with(Box::new(FailingCapability));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();

        let outcome = ControlLoop::new(service.clone(), Arc::new(registry))
            .with_retry(RetryPolicy::no_retry())
            .with_events(bus)
            .run("task")
            .await
            .unwrap();
        assert_eq!(outcome.state, RunState::Stopped);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.answer, "Brief without the export.");
        assert_eq!(
            outcome.turns.turns()[0].observation,
            "capability crm_export failed: Capability crm_export failed: upstream returned 500"
        );
        assert!(service.prompts()[3].contains("Turn 1: tool=crm_export -> capability crm_export failed"));

        let mut invoked = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LoopEvent::CapabilityInvoked { capability_id, success, .. } = event.as_ref() {
                invoked.push((capability_id.clone(), *success));
            }
        }
        assert_eq!(invoked, vec![("crm_export".to_string(), false)]);
    }

    #[tokio::test]
    async fn decide_failure_is_fatal() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .fail(CompletionError::Network("down".into()))
                .fail(CompletionError::Transport {
                    status_code: 503,
                    message: "overloaded".into(),
                }),
        );
        let err = control(&service)
            .with_decide_retries(1)
            .run("task")
            .await
            .unwrap_err();
        match err {
            Error::Decide { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(source, CompletionError::Transport { status_code: 503, .. }));
            }
            other => panic!("expected Decide error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn budget_exhaustion_bounds_steps() {
        let mut script = ScriptedCompletion::new();
        for _ in 0..3 {
            script = script
                .reply(REASON)
                .reply(r#"{"next_action": "keep looking", "confidence": 0.5}"#)
                .reply(REFLECT_OK);
        }
        let service = Arc::new(script);
        let outcome = control(&service).with_max_steps(3).run("task").await.unwrap();
        assert_eq!(outcome.state, RunState::BudgetExhausted);
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.answer, BUDGET_EXHAUSTED_ANSWER);
        assert_eq!(outcome.memory.entries().count(), 3);
    }

    #[tokio::test]
    async fn revise_takes_priority_over_stop() {
        let service = Arc::new(
            ScriptedCompletion::new()
                // decision revises
                .reply(REASON)
                .reply(r#"{"should_stop": true, "should_revise": true, "confidence": 0.9, "reasoning": "A"}"#)
                .reply(REFLECT_OK)
                // reflection revises
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.9, "reasoning": "B"}"#)
                .reply("The information is not sufficient.")
                // clean stop
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.9, "reasoning": "C"}"#)
                .reply(REFLECT_OK),
        );
        let outcome = control(&service).run("task").await.unwrap();
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.answer, "C");
    }

    #[tokio::test]
    async fn note_taking_result_is_promoted() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply(r#"{"next_action": "remember", "capability_id": "save_note", "capability_input": {"note": "Jane Doe runs sales"}}"#)
                .reply(REFLECT_OK)
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.9, "reasoning": "Contact is Jane Doe."}"#)
                .reply(REFLECT_OK),
        );
        let outcome = control(&service).run("task").await.unwrap();
        assert_eq!(outcome.memory.saved_notes().collect::<Vec<_>>(), vec!["Jane Doe runs sales"]);
        assert!(service.prompts()[3].contains("Saved notes:\n- Jane Doe runs sales"));
        assert!(outcome.memory.entries().next().unwrap().starts_with("Step 1: decision=remember tool=save_note"));
    }

    #[tokio::test]
    async fn empty_reasoning_falls_back_to_observation() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply("")
                .structured(json!({"should_stop": true, "confidence": 0.9, "reasoning": ""}))
                .reply(REFLECT_OK),
        );
        let outcome = control(&service).run("task").await.unwrap();
        assert_eq!(outcome.answer, "No capability used.");
    }

    #[tokio::test]
    async fn cancelled_before_first_step() {
        let service = Arc::new(ScriptedCompletion::new());
        let token = CancellationToken::new();
        token.cancel();
        let outcome = control(&service).with_cancellation(token).run("task").await.unwrap();
        assert_eq!(outcome.state, RunState::Cancelled);
        assert_eq!(outcome.steps, 0);
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn events_cover_every_phase() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply(r#"{"capability_id": "search_companies", "capability_input": {"query": "tech"}, "should_stop": true, "confidence": 0.9, "reasoning": "TechStart found."}"#)
                .reply(REFLECT_OK),
        );
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        control(&service).with_events(bus).run("task").await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                LoopEvent::StepStarted { .. } => "started",
                LoopEvent::Reasoned { .. } => "reasoned",
                LoopEvent::Decided { .. } => "decided",
                LoopEvent::CapabilityInvoked { success, .. } => {
                    assert!(success);
                    "invoked"
                }
                LoopEvent::Reflected { .. } => "reflected",
                LoopEvent::StopRejected { .. } => "rejected",
                LoopEvent::Finished { state, .. } => {
                    assert_eq!(state, "stopped");
                    "finished"
                }
            });
        }
        assert_eq!(
            kinds,
            vec!["started", "reasoned", "decided", "invoked", "reflected", "finished"]
        );
    }

    #[tokio::test]
    async fn run_task_returns_answer_text() {
        let service = Arc::new(
            ScriptedCompletion::new()
                .reply(REASON)
                .reply(r#"{"should_stop": true, "confidence": 0.95, "reasoning": "42"}"#)
                .reply(REFLECT_OK),
        );
        let answer = run_task(service, "task", Some(2), None).await.unwrap();
        assert_eq!(answer, "42");
    }
}
