//! Prospect briefs — the control loop applied to sales research.
//!
//! A request (company, industry, free-text profile) becomes a task prompt,
//! the loop runs with the profile-aware registry, and the final answer is
//! split into a [`ProspectBrief`] by the output extractor.

use std::sync::Arc;

use deliberate_config::AppConfig;
use deliberate_core::error::Result;
use deliberate_core::event::EventBus;
use deliberate_core::provider::CompletionService;
use deliberate_tools::{ProfileContext, prospect_registry};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::extractor::{MESSAGING_ANGLE, OutputExtractor, SUPPORTING_EVIDENCE, VALUE_HYPOTHESIS};
use crate::loop_runner::ControlLoop;
use crate::retry::RetryPolicy;

pub use crate::extractor::ProspectBrief;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProspectRequest {
    pub company: String,
    pub industry: String,
    #[serde(default)]
    pub profile: String,
}

impl ProspectRequest {
    pub fn new(company: impl Into<String>, industry: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            industry: industry.into(),
            profile: profile.into(),
        }
    }

    /// The task handed to the control loop.
    pub fn task_prompt(&self) -> String {
        let profile = if self.profile.trim().is_empty() {
            "(none provided)"
        } else {
            self.profile.trim()
        };
        format!(
            "Prepare a sales prospect brief for {company} in the {industry} industry.\n\
             Prospect profile: {profile}\n\n\
             Use the capabilities to gather facts about {company} (profile, company directory, \
             contacts, web search). When you have enough, stop and put the final brief in your \
             reasoning using exactly these labels:\n\
             {VALUE_HYPOTHESIS}: <why {company} would benefit>\n\
             {MESSAGING_ANGLE}: <how to open the conversation>\n\
             {SUPPORTING_EVIDENCE}: <facts you found that back this up>",
            company = self.company.trim(),
            industry = self.industry.trim(),
        )
    }
}

/// Runs prospect research end to end.
pub struct ProspectBriefer {
    service: Arc<dyn CompletionService>,
    config: AppConfig,
    events: Option<Arc<EventBus>>,
    cancel: CancellationToken,
}

impl ProspectBriefer {
    pub fn new(service: Arc<dyn CompletionService>, config: AppConfig) -> Self {
        Self {
            service,
            config,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Research the prospect and extract the brief.
    ///
    /// Fails only when the loop's Decide phase is exhausted.
    pub async fn brief(&self, request: &ProspectRequest) -> Result<ProspectBrief> {
        let registry = Arc::new(prospect_registry(ProfileContext::new(request.profile.clone())));
        let mut control = ControlLoop::from_config(self.service.clone(), registry, &self.config)
            .with_cancellation(self.cancel.clone());
        if let Some(bus) = &self.events {
            control = control.with_events(bus.clone());
        }

        let outcome = control.run(&request.task_prompt()).await?;
        info!(
            company = %request.company,
            state = %outcome.state,
            steps = outcome.steps,
            "Prospect research finished"
        );

        let extractor = OutputExtractor::new(self.service.clone())
            .with_retry(RetryPolicy::from_settings(
                &self.config.agent,
                self.config.provider.timeout_secs,
            ))
            .with_fallback_chars(self.config.extractor.fallback_chars);
        Ok(extractor.extract(&outcome.answer).await)
    }
}
