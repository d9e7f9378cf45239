//! Error types for the Deliberate domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator of the control loop has its own error enum; the
//! top-level [`Error`] is what a run surfaces to its caller.

use thiserror::Error;

/// The top-level error type for all Deliberate operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Completion service errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    // --- Decide phase exhausted its retry budget ---
    #[error("Decide failed after {attempts} attempts: {source}")]
    Decide {
        attempts: u32,
        #[source]
        source: CompletionError,
    },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the model-completion transport.
///
/// Every variant is retryable from the loop's point of view; the retry
/// helper in the agent crate treats them uniformly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    #[error("Completion request failed: {message} (status: {status_code})")]
    Transport { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),

    #[error("Completion service not configured: {0}")]
    NotConfigured(String),
}

/// Failures raised while resolving or running a capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("Unknown capability: {id}. Available: {available:?}")]
    Unknown { id: String, available: Vec<String> },

    #[error("Invalid input for {id}: {reason}")]
    InvalidInput { id: String, reason: String },

    #[error("Capability {id} failed: {reason}")]
    ExecutionFailed { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_status() {
        let err = Error::Completion(CompletionError::Transport {
            status_code: 503,
            message: "model loading".into(),
        });
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model loading"));
    }

    #[test]
    fn unknown_capability_lists_available() {
        let err = CapabilityError::Unknown {
            id: "teleport".into(),
            available: vec!["search_companies".into()],
        };
        let text = err.to_string();
        assert!(text.starts_with("Unknown capability: teleport"));
        assert!(text.contains("search_companies"));
    }

    #[test]
    fn decide_error_carries_attempts() {
        let err = Error::Decide {
            attempts: 2,
            source: CompletionError::Timeout(60),
        };
        assert!(err.to_string().contains("2 attempts"));
        assert!(err.to_string().contains("60s"));
    }
}
