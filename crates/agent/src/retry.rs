//! Retry discipline around completion calls.
//!
//! Every call gets a bounded wait. Failures, including expiry, are retried
//! with exponential backoff plus jitter until the attempt budget runs out,
//! at which point the last error is returned.

use deliberate_config::AgentSettings;
use deliberate_core::error::CompletionError;
use deliberate_core::provider::{CompletionService, StructuredPayload};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry behaviour for completion calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
    /// Bounded wait for a single call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &AgentSettings, timeout_secs: u64) -> Self {
        Self {
            max_retries: settings.model_error_retries,
            base_delay_ms: settings.retry_base_delay_ms,
            max_delay_ms: settings.retry_max_delay_ms,
            call_timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// No retries, no delay (for testing).
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
            call_timeout: Duration::from_secs(60),
        }
    }

    /// Fast retries (for testing).
    #[must_use]
    pub const fn fast(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 5,
            call_timeout: Duration::from_secs(60),
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus jitter, capped at `max_delay_ms`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let base_delay = self.base_delay_ms.saturating_mul(1u64 << exp);

        let max_jitter = self.base_delay_ms.min(1000);
        let jitter = if max_jitter > 0 {
            u64::from(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos(),
            ) % max_jitter
        } else {
            0
        };

        Duration::from_millis(base_delay.saturating_add(jitter).min(self.max_delay_ms))
    }
}

/// Call `service.complete` up to `max_retries + 1` times.
pub async fn call_with_retry(
    service: &dyn CompletionService,
    prompt: &str,
    phase: &str,
    policy: &RetryPolicy,
) -> Result<String, CompletionError> {
    let attempts = policy.max_retries + 1;
    let mut last_error = CompletionError::NotConfigured("no attempts made".into());

    for attempt in 1..=attempts {
        let outcome = match tokio::time::timeout(policy.call_timeout, service.complete(prompt)).await
        {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(policy.call_timeout.as_secs())),
        };

        match outcome {
            Ok(text) => return Ok(text),
            Err(e) => {
                warn!(
                    phase,
                    attempt,
                    attempts,
                    provider = service.name(),
                    error = %e,
                    "Completion call failed"
                );
                last_error = e;
            }
        }

        if attempt < attempts {
            let delay = policy.backoff_delay(attempt);
            debug!(phase, delay_ms = delay.as_millis() as u64, "Backing off before retry");
            tokio::time::sleep(delay).await;
        }
    }

    Err(last_error)
}

/// Best-effort structured completion under the same bounded wait.
/// Expiry yields an empty payload.
pub async fn structured_with_timeout(
    service: &dyn CompletionService,
    prompt: &str,
    policy: &RetryPolicy,
) -> StructuredPayload {
    match tokio::time::timeout(policy.call_timeout, service.complete_structured(prompt)).await {
        Ok(payload) => payload,
        Err(_) => {
            debug!(
                timeout_secs = policy.call_timeout.as_secs(),
                "Structured completion timed out"
            );
            StructuredPayload::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedCompletion;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            call_timeout: Duration::from_secs(1),
        };
        let first = policy.backoff_delay(1).as_millis();
        let second = policy.backoff_delay(2).as_millis();
        assert!((100..200).contains(&first), "first = {first}");
        assert!((200..300).contains(&second), "second = {second}");
        assert_eq!(policy.backoff_delay(10).as_millis(), 1_000);
        assert_eq!(policy.backoff_delay(200).as_millis(), 1_000);
    }

    #[test]
    fn zero_base_means_no_delay() {
        assert_eq!(RetryPolicy::no_retry().backoff_delay(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let service = ScriptedCompletion::new()
            .fail(CompletionError::Network("refused".into()))
            .fail(CompletionError::Timeout(1))
            .reply("ok");
        let out = call_with_retry(&service, "p", "reason", &RetryPolicy::fast(2)).await.unwrap();
        assert_eq!(out, "ok");
        assert_eq!(service.call_count(), 3);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let service = ScriptedCompletion::new()
            .fail(CompletionError::Network("first".into()))
            .fail(CompletionError::Network("second".into()));
        let err = call_with_retry(&service, "p", "decide", &RetryPolicy::fast(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("second"));
        assert_eq!(service.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let service = ScriptedCompletion::new()
            .reply("late")
            .with_latency(Duration::from_secs(30));
        let policy = RetryPolicy {
            call_timeout: Duration::from_secs(5),
            ..RetryPolicy::no_retry()
        };
        let err = call_with_retry(&service, "p", "reflect", &policy).await.unwrap_err();
        assert!(matches!(err, CompletionError::Timeout(5)));
    }
}
