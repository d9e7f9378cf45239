//! Contact lookup by company key.

use async_trait::async_trait;
use deliberate_core::error::CapabilityError;
use deliberate_core::tool::{Capability, CapabilityResult};
use serde_json::{Map, Value};

struct Contact {
    name: &'static str,
    role: &'static str,
    email: &'static str,
}

const CONTACTS: &[(&str, Contact)] = &[
    ("acme", Contact { name: "Jane Doe", role: "VP Sales", email: "jane@acme.com" }),
    ("techstart", Contact { name: "John Smith", role: "CEO", email: "john@techstart.com" }),
];

pub struct ContactLookupCapability;

#[async_trait]
impl Capability for ContactLookupCapability {
    fn id(&self) -> &str {
        "get_contact"
    }

    fn description(&self) -> &str {
        "Get contact details for a company by key (e.g. acme, techstart)."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "company_key": {
                    "type": "string",
                    "description": "Company identifier"
                }
            },
            "required": ["company_key"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>) -> Result<CapabilityResult, CapabilityError> {
        let raw_key = input
            .get("company_key")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let key = raw_key.trim().to_lowercase();

        // A miss is an observation, not a failure: the model should see the known keys.
        let Some((_, contact)) = CONTACTS.iter().find(|(k, _)| *k == key) else {
            let known: Vec<&str> = CONTACTS.iter().map(|(k, _)| *k).collect();
            return Ok(CapabilityResult::text(format!(
                "No contact found for '{raw_key}'. Known keys: {known:?}"
            )));
        };

        Ok(CapabilityResult {
            output: format!(
                "Name: {}, Role: {}, Email: {}",
                contact.name, contact.role, contact.email
            ),
            data: Some(serde_json::json!({
                "name": contact.name,
                "role": contact.role,
                "email": contact.email,
            })),
        })
    }
}
