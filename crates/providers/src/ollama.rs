//! Ollama provider — talks to the native `/api/generate` endpoint.
//!
//! Uses non-streaming mode. Structured completions send `format: "json"`
//! so Ollama constrains the model to a JSON document; the reply is then
//! parsed best-effort and an empty map is returned on any failure.

use async_trait::async_trait;
use deliberate_core::error::CompletionError;
use deliberate_core::provider::{CompletionService, StructuredPayload};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::json_object_from_text;

/// A local Ollama completion service.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
    client: reqwest::Client,
}

/// The subset of Ollama's generate response we read.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: None,
            timeout,
            client,
        }
    }

    /// Local daemon on the default port (convenience constructor).
    pub fn local(model: impl Into<String>) -> Self {
        Self::new("http://localhost:11434", model, Duration::from_secs(60))
    }

    /// Set the sampling temperature sent under `options`.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn generate_body(&self, prompt: &str, json_format: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if json_format {
            body["format"] = serde_json::json!("json");
        }
        if let Some(t) = self.temperature {
            body["options"] = serde_json::json!({ "temperature": t });
        }
        body
    }

    async fn post_generate(
        &self,
        body: &serde_json::Value,
    ) -> Result<GenerateResponse, CompletionError> {
        let url = format!("{}/api/generate", self.base_url);

        debug!(model = %self.model, "Sending generate request");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout.as_secs())
                } else {
                    CompletionError::Network(format!("Ollama connection error: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(CompletionError::Transport {
                status_code: status,
                message: error_body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        parse_generate_response(&raw)
    }
}

fn parse_generate_response(raw: &str) -> Result<GenerateResponse, CompletionError> {
    serde_json::from_str(raw).map_err(|_| {
        let preview: String = raw.chars().take(200).collect();
        CompletionError::MalformedResponse(format!("Ollama returned non-JSON response: {preview}"))
    })
}

#[async_trait]
impl CompletionService for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = self.generate_body(prompt, false);
        Ok(self.post_generate(&body).await?.response)
    }

    async fn complete_structured(&self, prompt: &str) -> StructuredPayload {
        let body = self.generate_body(prompt, true);
        match self.post_generate(&body).await {
            Ok(resp) => json_object_from_text(&resp.response),
            Err(e) => {
                debug!(error = %e, "Structured generate failed, returning empty payload");
                StructuredPayload::new()
            }
        }
    }

    async fn health_check(&self) -> Result<bool, CompletionError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}
