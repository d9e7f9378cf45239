//! Provider selection — builds the configured completion service.

use std::sync::Arc;
use std::time::Duration;
use deliberate_config::AppConfig;
use deliberate_core::error::CompletionError;
use deliberate_core::provider::CompletionService;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the completion service named by `config.provider.kind`.
pub fn build_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn CompletionService>, CompletionError> {
    let provider = &config.provider;
    let timeout = Duration::from_secs(provider.timeout_secs);
    let base_url = match (&provider.base_url, default_base_url(&provider.kind)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(CompletionError::NotConfigured(format!(
                "provider '{}' needs provider.base_url",
                provider.kind
            )));
        }
    };

    if provider.kind == "ollama" {
        let mut p = OllamaProvider::new(base_url, &provider.model, timeout);
        if let Some(t) = provider.temperature {
            p = p.with_temperature(t);
        }
        return Ok(Arc::new(p));
    }

    let api_key = provider.api_key.clone().unwrap_or_default();
    if api_key.is_empty() && matches!(provider.kind.as_str(), "openai" | "openrouter") {
        return Err(CompletionError::NotConfigured(format!(
            "provider '{}' needs an API key (DELIBERATE_API_KEY)",
            provider.kind
        )));
    }

    let mut p = OpenAiCompatProvider::new(&provider.kind, base_url, api_key, &provider.model, timeout);
    if let Some(t) = provider.temperature {
        p = p.with_temperature(t);
    }
    Ok(Arc::new(p))
}

/// Get the default base URL for well-known providers.
fn default_base_url(kind: &str) -> Option<&'static str> {
    match kind {
        "ollama" => Some("http://localhost:11434"),
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        "llamacpp" | "llama.cpp" => Some("http://localhost:8080/v1"),
        _ => None,
    }
}
