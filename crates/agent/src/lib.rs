//! The control loop — the heart of Deliberate.
//!
//! Each step follows a fixed **Reason → Decide → Act → Observe → Update → Reflect** cycle:
//!
//! 1. **Reason** about what is known and what is missing
//! 2. **Decide** the next action as a structured [`Decision`]
//! 3. **Act** by invoking a capability, if one was chosen
//! 4. **Observe** the result (or error) as text
//! 5. **Update** working memory and turn history
//! 6. **Reflect** on the observation and decide whether to revise
//!
//! The loop continues until a stop request passes the [`StopPolicy`], the
//! step budget is exhausted, or the run is cancelled.

pub mod decision;
pub mod extractor;
pub mod history;
pub mod loop_runner;
pub mod policy;
pub mod prompts;
pub mod prospect;
pub mod retry;
pub mod step;
pub mod working_memory;

#[cfg(test)]
mod test_helpers;

pub use decision::{Decision, Reflection, parse_decision, parse_reflection};
pub use extractor::{OutputExtractor, ProspectBrief};
pub use history::{Turn, TurnHistory};
pub use loop_runner::{ControlLoop, RunOutcome, RunState, run_task};
pub use policy::{ConfidenceGate, Permissive, StopPolicy, StopVerdict};
pub use prospect::{ProspectBriefer, ProspectRequest};
pub use retry::{RetryPolicy, call_with_retry};
pub use step::{ActOutcome, StepExecutor};
pub use working_memory::WorkingMemory;
