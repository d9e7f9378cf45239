//! Prompt templates for each phase of a step.

/// Reasoning text beyond this many characters is not repeated in the Decide prompt.
const REASONING_EXCERPT_CHARS: usize = 300;

/// Step context shared by Reason, Decide and Reflect.
pub fn context(task: &str, memory_summary: &str, recent_turns: &str) -> String {
    format!("Task: {task}\n\nMemory (prior findings):\n{memory_summary}\n\nRecent turns:\n{recent_turns}")
}

pub fn reason(context: &str) -> String {
    format!(
        "{context}\n\n\
         As the agent, briefly state: what do you know so far and what is still missing? \
         One short paragraph."
    )
}

pub fn decide(context: &str, reasoning: &str, capabilities: &str) -> String {
    let excerpt: String = reasoning.chars().take(REASONING_EXCERPT_CHARS).collect();
    format!(
        "{context}\n\n\
         Your reasoning so far: {excerpt}\n\n\
         Available capabilities:\n{capabilities}\n\n\
         Decide: What should you do next? Do you need a capability (if so, which id and what input)? \
         Is your information sufficient? How confident are you (0-1)? Should you revise your approach? \
         Should you stop and respond with the final answer?\n\
         Respond with a short reasoning and a JSON object with: next_action, capability_id, \
         capability_input (object), confidence, should_stop, should_revise, reasoning. \
         When stopping, put the complete final answer in reasoning."
    )
}

/// Sent instead of the Decide prompt after an unusable reply.
pub fn decide_corrective(context: &str) -> String {
    format!(
        "{context}\n\n\
         Your previous response was invalid. Please respond with a JSON object containing exactly: \
         next_action (string), capability_id (string, empty for none), capability_input (object), \
         confidence (0-1), should_stop (bool), should_revise (bool), reasoning (string)."
    )
}

pub fn reflect(context: &str, observation: &str) -> String {
    format!(
        "{context}\n\n\
         Last observation: {observation}\n\n\
         Evaluate: What assumptions are you making? Is your information sufficient? \
         How confident are you (0-1)? Should you revise your approach or stop and answer the user?"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_layout() {
        let ctx = context("Find Acme", "(no memory yet)", "(no turns yet)");
        assert_eq!(
            ctx,
            "Task: Find Acme\n\nMemory (prior findings):\n(no memory yet)\n\nRecent turns:\n(no turns yet)"
        );
    }

    #[test]
    fn decide_embeds_capabilities_and_truncated_reasoning() {
        let long = "r".repeat(1000);
        let prompt = decide("CTX", &long, "- web_search: Search (params: query: string)");
        assert!(prompt.starts_with("CTX\n\n"));
        assert!(prompt.contains(&format!("Your reasoning so far: {}\n", "r".repeat(300))));
        assert!(!prompt.contains(&"r".repeat(301)));
        assert!(prompt.contains("- web_search: Search"));
        assert!(prompt.contains("capability_id"));
    }

    #[test]
    fn corrective_demands_exact_shape() {
        let prompt = decide_corrective("CTX");
        assert!(prompt.contains("previous response was invalid"));
        assert!(prompt.contains("should_revise (bool)"));
    }

    #[test]
    fn reflect_embeds_observation() {
        let prompt = reflect("CTX", "capability get_contact result: Jane");
        assert!(prompt.contains("Last observation: capability get_contact result: Jane"));
    }
}
