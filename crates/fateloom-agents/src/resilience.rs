//! Call resilience: timeouts, retries with exponential backoff and
//! jitter.
//!
//! Every agent call runs through [`call_with_resilience`]:
//!
//! 1. The attempt is wrapped in the configured deadline; exceeding it
//!    cancels the call and discards any buffered output.
//! 2. Transient errors (and timeouts) retry up to the configured count,
//!    with delay `base * 2^attempt` plus a bounded random jitter.
//! 3. Auth errors never retry -- they surface immediately as fatal.

use std::time::Duration;

use rand::Rng;
use tokio::time::timeout;

use crate::backend::{Conversation, LlmBackend};
use crate::config::ResilienceConfig;
use crate::error::AgentError;

/// Cap on a single backoff delay.
const MAX_DELAY_MS: u64 = 10_000;

/// Complete a conversation with timeout, retry, and jitter applied.
///
/// # Errors
///
/// Returns the final [`AgentError`] after retries are exhausted, or the
/// first non-retryable error encountered.
pub async fn call_with_resilience(
    backend: &LlmBackend,
    conversation: &Conversation,
    config: &ResilienceConfig,
) -> Result<String, AgentError> {
    let mut attempt: u32 = 0;
    loop {
        let result = match timeout(config.timeout(), backend.complete(conversation)).await {
            Ok(inner) => inner,
            Err(_) => Err(AgentError::Timeout(config.timeout_ms)),
        };

        match result {
            Ok(text) => {
                if attempt > 0 {
                    tracing::info!(
                        backend = backend.name(),
                        attempt = attempt,
                        "LLM call succeeded after retry"
                    );
                }
                return Ok(text);
            }
            Err(error) if error.is_retryable() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    backend = backend.name(),
                    attempt = attempt,
                    delay = ?delay,
                    error = %error,
                    "LLM call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
            Err(error) => {
                tracing::warn!(
                    backend = backend.name(),
                    attempt = attempt,
                    error = %error,
                    "LLM call failed, not retrying"
                );
                return Err(error);
            }
        }
    }
}

/// Delay for one retry attempt: `base * 2^attempt`, capped, with
/// `+/- jitter_pct` percent of random jitter.
fn backoff_delay(config: &ResilienceConfig, attempt: u32) -> Duration {
    let exponential = config
        .base_delay_ms
        .saturating_mul(1_u64.checked_shl(attempt).unwrap_or(u64::MAX))
        .min(MAX_DELAY_MS);
    let jitter_range = exponential
        .saturating_mul(u64::from(config.jitter_pct))
        .checked_div(100)
        .unwrap_or(0);
    if jitter_range == 0 {
        return Duration::from_millis(exponential);
    }
    let jitter: u64 = rand::rng().random_range(0..=jitter_range.saturating_mul(2));
    let with_jitter = exponential
        .saturating_add(jitter)
        .saturating_sub(jitter_range);
    Duration::from_millis(with_jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;

    fn fast_config() -> ResilienceConfig {
        ResilienceConfig {
            timeout_ms: 1_000,
            max_retries: 2,
            base_delay_ms: 1,
            jitter_pct: 0,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = ResilienceConfig {
            timeout_ms: 1_000,
            max_retries: 10,
            base_delay_ms: 100,
            jitter_pct: 0,
        };
        assert_eq!(backoff_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(&config, 2), Duration::from_millis(400));
        // Far attempts cap at MAX_DELAY_MS.
        assert_eq!(backoff_delay(&config, 30), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn jitter_stays_bounded() {
        let config = ResilienceConfig {
            timeout_ms: 1_000,
            max_retries: 1,
            base_delay_ms: 1_000,
            jitter_pct: 20,
        };
        for _roll in 0..50 {
            let delay = backoff_delay(&config, 0).as_millis();
            assert!((800..=1200).contains(&delay), "delay {delay} out of band");
        }
    }

    #[tokio::test]
    async fn transient_errors_retry_until_success() {
        // Empty queue twice (transient), then a success on the third pull
        // is impossible with a scripted backend -- instead pre-load one
        // response and let the first attempt succeed, then verify the
        // exhausted path retries and finally errors.
        let backend = LlmBackend::Scripted(ScriptedBackend::with_responses([String::from(
            "hello",
        )]));
        let conversation = Conversation {
            system: String::new(),
            turns: Vec::new(),
        };
        let first = call_with_resilience(&backend, &conversation, &fast_config()).await;
        assert_eq!(first.ok(), Some(String::from("hello")));

        // Queue exhausted: every attempt is transient, retries run out.
        let exhausted = call_with_resilience(&backend, &conversation, &fast_config()).await;
        assert!(matches!(exhausted, Err(AgentError::Transient(_))));
    }

    #[tokio::test]
    async fn retry_consumes_later_queued_responses() {
        let scripted = ScriptedBackend::default();
        scripted.push_response("late arrival");
        let backend = LlmBackend::Scripted(scripted);
        let conversation = Conversation {
            system: String::new(),
            turns: Vec::new(),
        };
        let result = call_with_resilience(&backend, &conversation, &fast_config()).await;
        assert_eq!(result.ok(), Some(String::from("late arrival")));
    }
}
