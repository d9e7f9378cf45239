//! Completion service trait — the abstraction over language-model backends.
//!
//! A completion service takes a single prompt and returns text. It may also
//! offer a best-effort structured mode that returns a JSON object; that mode
//! never fails and yields an empty map when the backend cannot comply.
//!
//! Implementations: Ollama generate API, OpenAI-compatible chat endpoints,
//! scripted fakes in tests.

use async_trait::async_trait;
use crate::error::CompletionError;

/// A best-effort structured reply: a JSON object, possibly empty.
pub type StructuredPayload = serde_json::Map<String, serde_json::Value>;

/// The core completion trait.
///
/// The control loop calls `complete()` for every phase and
/// `complete_structured()` alongside Decide, without knowing which
/// backend is in use.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A human-readable name for this backend (e.g., "ollama", "openai").
    fn name(&self) -> &str;

    /// Send a prompt and get the raw text completion.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError>;

    /// Request a JSON-object completion.
    ///
    /// Default implementation reports no structured support by returning an
    /// empty map, which the decision parser treats as "no payload".
    async fn complete_structured(&self, _prompt: &str) -> StructuredPayload {
        StructuredPayload::new()
    }

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        Ok(true)
    }
}
