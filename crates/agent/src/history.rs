//! Turn history — one `{action, observation}` pair per completed step.
//!
//! The full history is kept for the run; only the most recent turns are
//! rendered into the step context.

use serde::{Deserialize, Serialize};

const EMPTY_HISTORY: &str = "(no turns yet)";
const OBSERVATION_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub action: String,
    pub observation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnHistory {
    turns: Vec<Turn>,
}

impl TurnHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: impl Into<String>, observation: impl Into<String>) {
        self.turns.push(Turn {
            action: action.into(),
            observation: observation.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `k` turns, one line each, numbered from 1 within the window.
    pub fn render(&self, k: usize) -> String {
        let start = self.turns.len().saturating_sub(k);
        let window = &self.turns[start..];
        if window.is_empty() {
            return EMPTY_HISTORY.into();
        }
        window
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let preview: String = t.observation.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
                format!("Turn {}: {} -> {}", i + 1, t.action, preview)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_placeholder() {
        assert_eq!(TurnHistory::new().render(5), "(no turns yet)");
        let mut h = TurnHistory::new();
        h.push("continue", "No capability used.");
        assert_eq!(h.render(0), "(no turns yet)");
    }

    #[test]
    fn renders_only_recent_window_but_keeps_all() {
        let mut h = TurnHistory::new();
        for i in 1..=7 {
            h.push(format!("action{i}"), format!("obs{i}"));
        }
        assert_eq!(h.len(), 7);
        let rendered = h.render(2);
        assert_eq!(rendered, "Turn 1: action6 -> obs6\nTurn 2: action7 -> obs7");
    }

    #[test]
    fn long_observations_are_previewed() {
        let mut h = TurnHistory::new();
        h.push("tool=web_search", "x".repeat(500));
        let rendered = h.render(5);
        assert_eq!(rendered.len(), "Turn 1: tool=web_search -> ".len() + 200);
    }
}
