//! Completion service implementations for Deliberate.
//!
//! All transports implement the `deliberate_core::CompletionService` trait.
//! [`router::build_from_config`] selects one based on configuration.

pub mod ollama;
pub mod openai_compat;
pub mod router;

pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;

use deliberate_core::provider::StructuredPayload;

/// Interpret a model reply as a JSON object, tolerating surrounding
/// markdown fences. Anything else yields an empty payload.
pub(crate) fn json_object_from_text(text: &str) -> StructuredPayload {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if unfenced.is_empty() {
        return StructuredPayload::new();
    }

    match serde_json::from_str::<serde_json::Value>(unfenced) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => StructuredPayload::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_parses() {
        let map = json_object_from_text(r#"{"should_stop": true}"#);
        assert_eq!(map["should_stop"], serde_json::Value::Bool(true));
    }

    #[test]
    fn fenced_object_parses() {
        let map = json_object_from_text("```json\n{\"next_action\": \"search\"}\n```");
        assert_eq!(map["next_action"], "search");
    }

    #[test]
    fn non_object_is_empty() {
        assert!(json_object_from_text("[1, 2, 3]").is_empty());
        assert!(json_object_from_text("not json").is_empty());
        assert!(json_object_from_text("   ").is_empty());
    }
}
