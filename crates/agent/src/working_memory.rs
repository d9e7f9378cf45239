//! Working memory — the run-scoped fact log plus curated saved notes.
//!
//! Both sequences are bounded FIFO queues: once a capacity is exceeded the
//! oldest entries are evicted. Working memory is:
//!
//! - **Run-scoped**: created at run start, dropped at run end
//! - **Serializable**: returned in the run outcome for inspection
//! - **Renderable**: produces the memory section of the step context

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const EMPTY_SUMMARY: &str = "(no memory yet)";
const TRUNCATION_MARKER: &str = "...";

// ── Data Structures ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemory {
    /// One synthesized line per completed step.
    entries: VecDeque<String>,

    /// Notes promoted by a note-taking capability.
    saved_notes: VecDeque<String>,

    capacity: usize,
    note_capacity: usize,
}

// ── Implementation ────────────────────────────────────────────────────────

impl WorkingMemory {
    /// Create an empty memory. Capacities below one are raised to one.
    pub fn new(capacity: usize, note_capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            saved_notes: VecDeque::new(),
            capacity: capacity.max(1),
            note_capacity: note_capacity.max(1),
        }
    }

    // ── Recording ──

    /// Append a line to the step log.
    pub fn add(&mut self, line: impl Into<String>) {
        push_bounded(&mut self.entries, line.into(), self.capacity);
    }

    /// Append a saved note.
    pub fn add_saved_note(&mut self, note: impl Into<String>) {
        push_bounded(&mut self.saved_notes, note.into(), self.note_capacity);
    }

    // ── Access ──

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn saved_notes(&self) -> impl Iterator<Item = &str> {
        self.saved_notes.iter().map(String::as_str)
    }

    pub fn item_count(&self) -> usize {
        self.entries.len() + self.saved_notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.saved_notes.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.saved_notes.clear();
    }

    // ── Rendering ──

    /// Render saved notes, then the step log, oldest first.
    ///
    /// When the text exceeds `max_chars` characters only the tail is kept,
    /// prefixed with `...`.
    pub fn summary(&self, max_chars: usize) -> String {
        if self.is_empty() {
            return EMPTY_SUMMARY.into();
        }

        let mut sections = Vec::new();
        if !self.saved_notes.is_empty() {
            let notes: Vec<String> = self.saved_notes.iter().map(|n| format!("- {n}")).collect();
            sections.push(format!("Saved notes:\n{}", notes.join("\n")));
        }
        if !self.entries.is_empty() {
            let log: Vec<&str> = self.entries().collect();
            sections.push(format!("Step log:\n{}", log.join("\n")));
        }
        let text = sections.join("\n\n");

        let total = text.chars().count();
        if total <= max_chars {
            return text;
        }
        let tail: String = text.chars().skip(total - max_chars).collect();
        format!("{TRUNCATION_MARKER}{tail}")
    }
}

fn push_bounded(queue: &mut VecDeque<String>, item: String, capacity: usize) {
    queue.push_back(item);
    while queue.len() > capacity {
        queue.pop_front();
    }
}
