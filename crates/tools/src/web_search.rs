//! Web search — deterministic offline results.
//!
//! Results are keyed on words in the query so the loop can be exercised
//! end-to-end without network access.

use async_trait::async_trait;
use deliberate_core::error::CapabilityError;
use deliberate_core::tool::{Capability, CapabilityResult};
use serde::Serialize;
use serde_json::{Map, Value};

const DEFAULT_RESULTS: u64 = 3;
const MAX_RESULTS: u64 = 5;

pub struct WebSearchCapability;

#[async_trait]
impl Capability for WebSearchCapability {
    fn id(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for news and background on a company or industry. Returns titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (default 3, max 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, input: &Map<String, Value>) -> Result<CapabilityResult, CapabilityError> {
        let query = input.get("query").and_then(Value::as_str).unwrap_or_default();
        if query.trim().is_empty() {
            return Err(CapabilityError::InvalidInput {
                id: self.id().into(),
                reason: "query must not be empty".into(),
            });
        }

        let count = input
            .get("num_results")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_RESULTS)
            .clamp(1, MAX_RESULTS) as usize;

        let results = search(query, count);
        let output = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {} ({})\n   {}", i + 1, r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(CapabilityResult {
            output,
            data: serde_json::to_value(&results).ok(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
}

impl SearchHit {
    fn new(title: &str, url: &str, snippet: &str) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

fn search(query: &str, count: usize) -> Vec<SearchHit> {
    let q = query.to_lowercase();

    if q.contains("acme") {
        return [
            SearchHit::new(
                "Acme Corp expands automated assembly lines",
                "https://news.example.com/acme-automation",
                "Acme Corp is investing in factory automation to cut lead times across its manufacturing plants.",
            ),
            SearchHit::new(
                "Acme Labs raises seed round",
                "https://news.example.com/acme-labs-seed",
                "Acme Labs closed a 2M seed round to build analytics tooling for industrial customers.",
            ),
        ]
        .into_iter()
        .take(count)
        .collect();
    }

    if q.contains("techstart") || q.contains("saas") {
        return [
            SearchHit::new(
                "TechStart Inc hires first CRO",
                "https://news.example.com/techstart-cro",
                "TechStart is scaling its go-to-market team after reaching 5M ARR.",
            ),
            SearchHit::new(
                "SaaS buyers prioritise consolidation in 2026",
                "https://research.example.com/saas-consolidation",
                "Survey: mid-market SaaS buyers are reducing vendor count and favour integrated platforms.",
            ),
        ]
        .into_iter()
        .take(count)
        .collect();
    }

    (0..count)
        .map(|i| SearchHit {
            title: format!("Result {} for: {}", i + 1, query),
            url: format!("https://example.com/search?q={}&p={}", query.replace(' ', "+"), i + 1),
            snippet: format!("Background material matching '{query}'."),
        })
        .collect()
}
