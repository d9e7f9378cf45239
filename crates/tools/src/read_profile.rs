//! Read profile — exposes the per-run prospect profile to the model.

use async_trait::async_trait;
use deliberate_core::error::CapabilityError;
use deliberate_core::tool::{Capability, CapabilityResult};
use serde_json::{Map, Value};

/// The profile text for a single run, handed to [`ReadProfileCapability`]
/// at registry construction time.
#[derive(Debug, Clone, Default)]
pub struct ProfileContext {
    profile: String,
}

impl ProfileContext {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.profile
    }
}

pub struct ReadProfileCapability {
    context: ProfileContext,
}

impl ReadProfileCapability {
    pub fn new(context: ProfileContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Capability for ReadProfileCapability {
    fn id(&self) -> &str {
        "read_profile"
    }

    fn description(&self) -> &str {
        "Read the prospect profile supplied for this task."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn invoke(&self, _input: &Map<String, Value>) -> Result<CapabilityResult, CapabilityError> {
        let profile = self.context.as_str().trim();
        if profile.is_empty() {
            return Ok(CapabilityResult::text("(no profile provided)"));
        }
        Ok(CapabilityResult::text(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_profile_text() {
        let capability = ReadProfileCapability::new(ProfileContext::new("Mid-market logistics, 200 staff"));
        let result = capability.invoke(&Map::new()).await.unwrap();
        assert_eq!(result.output, "Mid-market logistics, 200 staff");
    }

    #[tokio::test]
    async fn empty_profile_placeholder() {
        let capability = ReadProfileCapability::new(ProfileContext::default());
        let result = capability.invoke(&Map::new()).await.unwrap();
        assert_eq!(result.output, "(no profile provided)");
    }

    #[test]
    fn schema_has_no_params() {
        let capability = ReadProfileCapability::new(ProfileContext::default());
        assert!(capability.descriptor().render().ends_with("(params: none)"));
    }
}
