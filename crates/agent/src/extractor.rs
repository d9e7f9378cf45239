//! Output extractor — splits a free-form final answer into the three
//! labelled sections of a prospect brief.
//!
//! Extraction order:
//! 1. label regex over the answer
//! 2. one corrective completion asking for the labels, then the regex again
//! 3. the head of the raw answer as the value hypothesis, placeholders elsewhere

use std::sync::{Arc, LazyLock};

use deliberate_core::provider::CompletionService;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::retry::{RetryPolicy, call_with_retry};

pub const NOT_EXTRACTED: &str = "(not extracted)";

pub const VALUE_HYPOTHESIS: &str = "VALUE HYPOTHESIS";
pub const MESSAGING_ANGLE: &str = "MESSAGING ANGLE";
pub const SUPPORTING_EVIDENCE: &str = "SUPPORTING EVIDENCE";

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(value[ _]+hypothesis|messaging[ _]+angle|supporting[ _]+evidence)\s*(?:\*\*)?\s*[:\-]",
    )
    .unwrap()
});

/// The three-section brief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProspectBrief {
    pub value_hypothesis: String,
    pub messaging_angle: String,
    pub supporting_evidence: String,
}

impl ProspectBrief {
    /// Render with canonical labels, one section per line.
    pub fn render(&self) -> String {
        format!(
            "{VALUE_HYPOTHESIS}: {}\n{MESSAGING_ANGLE}: {}\n{SUPPORTING_EVIDENCE}: {}",
            self.value_hypothesis, self.messaging_angle, self.supporting_evidence
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Value,
    Messaging,
    Evidence,
}

fn section_of(label: &str) -> Section {
    let lower = label.to_ascii_lowercase();
    if lower.starts_with("value") {
        Section::Value
    } else if lower.starts_with("messaging") {
        Section::Messaging
    } else {
        Section::Evidence
    }
}

fn clean(text: &str) -> String {
    text.trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '#')
        .to_string()
}

/// Regex path: `None` when no label is present.
///
/// Labels may appear in any order and any case; each section runs to the
/// next label or the end of the text. The first occurrence of a label wins.
pub fn extract_sections(text: &str) -> Option<ProspectBrief> {
    let matches: Vec<_> = LABEL_RE.captures_iter(text).collect();
    if matches.is_empty() {
        return None;
    }

    let mut value = None;
    let mut messaging = None;
    let mut evidence = None;

    for (i, caps) in matches.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let body = clean(&text[whole.end()..end]);

        let slot = match section_of(label.as_str()) {
            Section::Value => &mut value,
            Section::Messaging => &mut messaging,
            Section::Evidence => &mut evidence,
        };
        if slot.is_none() && !body.is_empty() {
            *slot = Some(body);
        }
    }

    // Labels with nothing after them count as no extraction.
    if value.is_none() && messaging.is_none() && evidence.is_none() {
        return None;
    }

    let or_placeholder = |s: Option<String>| s.unwrap_or_else(|| NOT_EXTRACTED.to_string());
    Some(ProspectBrief {
        value_hypothesis: or_placeholder(value),
        messaging_angle: or_placeholder(messaging),
        supporting_evidence: or_placeholder(evidence),
    })
}

/// Last resort: the first `chars` characters as the value hypothesis.
pub fn truncation_fallback(answer: &str, chars: usize) -> ProspectBrief {
    let head: String = answer.trim().chars().take(chars).collect();
    ProspectBrief {
        value_hypothesis: if head.is_empty() { NOT_EXTRACTED.into() } else { head },
        messaging_angle: NOT_EXTRACTED.into(),
        supporting_evidence: NOT_EXTRACTED.into(),
    }
}

fn reformat_prompt(answer: &str) -> String {
    format!(
        "Reformat the following text into exactly three labelled sections, \
         each starting on its own line:\n\
         {VALUE_HYPOTHESIS}: <why the prospect would benefit>\n\
         {MESSAGING_ANGLE}: <how to pitch it>\n\
         {SUPPORTING_EVIDENCE}: <facts that back it up>\n\n\
         Text:\n{answer}"
    )
}

/// Extracts briefs, falling back to one corrective completion.
pub struct OutputExtractor {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    fallback_chars: usize,
}

impl OutputExtractor {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
            fallback_chars: 500,
        }
    }

    /// Supplies the bounded wait for the corrective call; its retry count is ignored.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fallback_chars(mut self, chars: usize) -> Self {
        self.fallback_chars = chars;
        self
    }

    /// Never fails.
    pub async fn extract(&self, answer: &str) -> ProspectBrief {
        if let Some(brief) = extract_sections(answer) {
            debug!("Sections extracted from final answer");
            return brief;
        }

        info!("No section labels found, requesting a reformat");
        let policy = RetryPolicy {
            max_retries: 0,
            ..self.retry.clone()
        };
        match call_with_retry(self.service.as_ref(), &reformat_prompt(answer), "extract", &policy).await {
            Ok(reformatted) => {
                if let Some(brief) = extract_sections(&reformatted) {
                    return brief;
                }
                warn!("Reformatted answer still has no section labels");
            }
            Err(e) => warn!(error = %e, "Reformat call failed"),
        }

        truncation_fallback(answer, self.fallback_chars)
    }
}
