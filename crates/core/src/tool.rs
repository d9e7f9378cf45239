//! Capability trait — the abstraction over the agent's tools.
//!
//! Capabilities are what give the loop the ability to gather information:
//! search a directory, look up a contact, save a note. The Decide phase
//! names one by id and supplies a keyword-style input object; Act resolves
//! it through the [`CapabilityRegistry`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use crate::error::CapabilityError;

/// The output of a successful capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResult {
    /// Text rendered into the observation
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CapabilityResult {
    /// A text-only result.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: None,
        }
    }
}

/// Self-description of a capability, rendered into the Decide prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// The capability id the model must echo back
    pub id: String,

    /// What the capability does
    pub description: String,

    /// JSON Schema describing the input object
    pub parameters: Value,
}

impl CapabilityDescriptor {
    /// One prompt line: `- id: description (params: a: string, b?: integer)`.
    pub fn render(&self) -> String {
        format!(
            "- {}: {} (params: {})",
            self.id,
            self.description,
            summarize_schema(&self.parameters)
        )
    }
}

/// The core Capability trait.
///
/// Each capability implements this trait and is registered in the
/// [`CapabilityRegistry`] once per run.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique id of this capability (e.g., "search_companies").
    fn id(&self) -> &str;

    /// A description of what this capability does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this capability's input object.
    fn parameters_schema(&self) -> Value;

    /// Whether a successful result should be promoted to the run's saved notes.
    fn is_note_taking(&self) -> bool {
        false
    }

    /// Run the capability with an already-validated input object.
    async fn invoke(&self, input: &Map<String, Value>) -> std::result::Result<CapabilityResult, CapabilityError>;

    /// Describe this capability for prompting.
    fn descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            id: self.id().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A name-indexed, read-only-after-construction set of capabilities.
///
/// Ordered by id so the rendered capability list is stable across runs.
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    /// Register a capability. Replaces any existing capability with the same id.
    pub fn register(&mut self, capability: Box<dyn Capability>) {
        let id = capability.id().to_string();
        self.capabilities.insert(id, capability);
    }

    /// Builder-style register.
    pub fn with(mut self, capability: Box<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    /// Get a capability by id.
    pub fn get(&self, id: &str) -> Option<&dyn Capability> {
        self.capabilities.get(id).map(|c| c.as_ref())
    }

    /// Whether the given id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.capabilities.contains_key(id)
    }

    /// Descriptors of every registered capability, ordered by id.
    pub fn list(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities.values().map(|c| c.descriptor()).collect()
    }

    /// The capability list as it appears in the Decide prompt.
    pub fn render_for_prompt(&self) -> String {
        if self.capabilities.is_empty() {
            return "(no capabilities available)".into();
        }
        self.list()
            .iter()
            .map(CapabilityDescriptor::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether the given id is a note-taking capability.
    pub fn is_note_taking(&self, id: &str) -> bool {
        self.get(id).is_some_and(|c| c.is_note_taking())
    }

    /// Resolve, validate, and invoke a capability.
    pub async fn invoke(
        &self,
        id: &str,
        input: &Map<String, Value>,
    ) -> std::result::Result<CapabilityResult, CapabilityError> {
        let capability = self.get(id).ok_or_else(|| CapabilityError::Unknown {
            id: id.to_string(),
            available: self.ids().into_iter().map(String::from).collect(),
        })?;
        validate_input(id, &capability.parameters_schema(), input)?;
        capability.invoke(input).await
    }

    /// List all registered capability ids.
    pub fn ids(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check an input object against the `required` list and primitive
/// `type` declarations of an object schema.
pub fn validate_input(
    id: &str,
    schema: &Value,
    input: &Map<String, Value>,
) -> std::result::Result<(), CapabilityError> {
    let invalid = |reason: String| CapabilityError::InvalidInput {
        id: id.to_string(),
        reason,
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !input.contains_key(key) {
                return Err(invalid(format!("missing required field '{key}'")));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in input {
        let Some(expected) = properties
            .get(key)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
        else {
            continue;
        };
        let matches = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !matches {
            return Err(invalid(format!("field '{key}' must be of type {expected}")));
        }
    }

    Ok(())
}

/// `a: string, b?: integer` from an object schema; `none` when empty.
fn summarize_schema(schema: &Value) -> String {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return "none".into();
    };
    if properties.is_empty() {
        return "none".into();
    }
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    properties
        .iter()
        .map(|(name, prop)| {
            let ty = prop.get("type").and_then(Value::as_str).unwrap_or("any");
            let marker = if required.contains(&name.as_str()) { "" } else { "?" };
            format!("{name}{marker}: {ty}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
