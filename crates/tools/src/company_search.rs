//! Company search — keyword lookup over a small fixed company directory.
//!
//! Unknown keywords fall back to the `acme` bucket so the loop always has
//! something to observe.

use async_trait::async_trait;
use deliberate_core::error::CapabilityError;
use deliberate_core::tool::{Capability, CapabilityResult};
use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_BUCKET: &str = "acme";

#[derive(Debug, Clone, Serialize)]
struct CompanyRecord {
    company: &'static str,
    industry: &'static str,
    revenue: &'static str,
}

fn directory(key: &str) -> Option<&'static [CompanyRecord]> {
    const ACME: &[CompanyRecord] = &[
        CompanyRecord { company: "Acme Corp", industry: "Manufacturing", revenue: "10M" },
        CompanyRecord { company: "Acme Labs", industry: "Tech", revenue: "2M" },
    ];
    const TECH: &[CompanyRecord] = &[
        CompanyRecord { company: "TechStart Inc", industry: "SaaS", revenue: "5M" },
    ];

    match key {
        "acme" => Some(ACME),
        "tech" => Some(TECH),
        _ => None,
    }
}

pub struct CompanySearchCapability;

#[async_trait]
impl Capability for CompanySearchCapability {
    fn id(&self) -> &str {
        "search_companies"
    }

    fn description(&self) -> &str {
        "Search for companies by keyword (e.g. acme, tech). Returns company name, industry, revenue."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search keyword"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>) -> Result<CapabilityResult, CapabilityError> {
        let query = input.get("query").and_then(Value::as_str).unwrap_or_default();
        let key = query.trim().to_lowercase();

        let records = directory(&key)
            .or_else(|| directory(DEFAULT_BUCKET))
            .unwrap_or_default();

        if records.is_empty() {
            return Ok(CapabilityResult::text("No results found."));
        }

        let output = records
            .iter()
            .map(|r| format!("- {} ({}, {})", r.company, r.industry, r.revenue))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(CapabilityResult {
            output,
            data: serde_json::to_value(records).ok(),
        })
    }
}
