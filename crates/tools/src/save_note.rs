//! Save note — the note-taking capability.
//!
//! The capability itself only normalises and echoes the note; the control
//! loop promotes a successful result into working memory's saved notes.

use async_trait::async_trait;
use chrono::Utc;
use deliberate_core::error::CapabilityError;
use deliberate_core::tool::{Capability, CapabilityResult};
use serde_json::{Map, Value};
use tracing::debug;

pub struct SaveNoteCapability;

#[async_trait]
impl Capability for SaveNoteCapability {
    fn id(&self) -> &str {
        "save_note"
    }

    fn description(&self) -> &str {
        "Save a short note (a key finding) so it stays in memory for the rest of the task."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "note": {
                    "type": "string",
                    "description": "The finding to remember"
                }
            },
            "required": ["note"]
        })
    }

    fn is_note_taking(&self) -> bool {
        true
    }

    async fn invoke(&self, input: &Map<String, Value>) -> Result<CapabilityResult, CapabilityError> {
        let note = input
            .get("note")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        if note.is_empty() {
            return Err(CapabilityError::InvalidInput {
                id: self.id().into(),
                reason: "note must not be empty".into(),
            });
        }

        debug!(chars = note.len(), "Note saved");

        Ok(CapabilityResult {
            output: note.to_string(),
            data: Some(serde_json::json!({ "saved_at": Utc::now().to_rfc3339() })),
        })
    }
}
