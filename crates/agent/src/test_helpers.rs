//! Shared test helpers for loop tests.

use async_trait::async_trait;
use deliberate_core::error::{CapabilityError, CompletionError};
use deliberate_core::provider::{CompletionService, StructuredPayload};
use deliberate_core::tool::{Capability, CapabilityResult};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A completion service that plays back a script.
///
/// Each call to `complete` returns the next scripted reply or failure.
/// Panics if more calls are made than entries provided. Structured calls
/// draw from a separate queue and return an empty payload once it runs dry.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    structured: Mutex<VecDeque<StructuredPayload>>,
    prompts: Mutex<Vec<String>>,
    call_count: Mutex<usize>,
    latency: Duration,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            structured: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            call_count: Mutex::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Queue a successful text reply.
    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, error: CompletionError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Queue a structured payload.
    pub fn structured(self, payload: serde_json::Value) -> Self {
        let map = payload.as_object().cloned().unwrap_or_default();
        self.structured.lock().unwrap().push_back(map);
        self
    }

    /// Delay every `complete` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// Every prompt passed to `complete`, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let next = {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
                panic!("ScriptedCompletion: no more replies (call #{})", *count)
            })
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        next
    }

    async fn complete_structured(&self, _prompt: &str) -> StructuredPayload {
        self.structured.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// A capability whose own execution always fails.
pub struct FailingCapability;

impl FailingCapability {
    pub const ID: &'static str = "crm_export";
    pub const REASON: &'static str = "upstream returned 500";
}

#[async_trait]
impl Capability for FailingCapability {
    fn id(&self) -> &str {
        Self::ID
    }

    fn description(&self) -> &str {
        "Export the prospect to the CRM."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _input: &Map<String, Value>) -> Result<CapabilityResult, CapabilityError> {
        Err(CapabilityError::ExecutionFailed {
            id: Self::ID.into(),
            reason: Self::REASON.into(),
        })
    }
}
