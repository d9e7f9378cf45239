//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama's `/v1` shim, vLLM, llama.cpp
//! server, and any endpoint exposing `/chat/completions`.
//!
//! Each prompt is sent as a single user message. Structured completions
//! request `response_format: {"type": "json_object"}`.

use async_trait::async_trait;
use deliberate_core::error::CompletionError;
use deliberate_core::provider::{CompletionService, StructuredPayload};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::json_object_from_text;

/// An OpenAI-compatible completion service.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            timeout,
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            model,
            Duration::from_secs(60),
        )
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(
            "openrouter",
            "https://openrouter.ai/api/v1",
            api_key,
            model,
            Duration::from_secs(60),
        )
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn chat_body(&self, prompt: &str, json_mode: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [ApiMessage { role: "user".into(), content: prompt.to_string() }],
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    async fn post_chat(&self, body: &serde_json::Value) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout.as_secs())
                } else {
                    CompletionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(CompletionError::Transport {
                status_code: status,
                message: error_body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        first_choice_content(&raw)
    }
}

/// Pull the first choice's content out of a chat completion body.
fn first_choice_content(raw: &str) -> Result<String, CompletionError> {
    let api_response: ApiResponse = serde_json::from_str(raw)
        .map_err(|e| CompletionError::MalformedResponse(format!("Failed to parse response: {e}")))?;

    api_response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| CompletionError::MalformedResponse("No choices in response".into()))
}

#[async_trait]
impl CompletionService for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = self.chat_body(prompt, false);
        self.post_chat(&body).await
    }

    async fn complete_structured(&self, prompt: &str) -> StructuredPayload {
        let body = self.chat_body(prompt, true);
        match self.post_chat(&body).await {
            Ok(text) => json_object_from_text(&text),
            Err(e) => {
                debug!(provider = %self.name, error = %e, "Structured completion failed, returning empty payload");
                StructuredPayload::new()
            }
        }
    }

    async fn health_check(&self) -> Result<bool, CompletionError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
