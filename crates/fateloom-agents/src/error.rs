//! Error types for the agent layer.

/// Errors from LLM calls and agent orchestration.
///
/// The variants mirror how the engine reacts: transient errors retry with
/// backoff, auth errors are fatal to the operator, timeouts cancel and
/// fall back, and format errors route to per-agent defaults.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    /// A retryable failure: network hiccup, 429, 5xx.
    #[error("transient LLM error: {0}")]
    Transient(String),

    /// Credentials rejected. Fatal; surfaced to the operator.
    #[error("LLM authentication failed: {0}")]
    Auth(String),

    /// The call exceeded its deadline and was cancelled.
    #[error("LLM call timed out after {0}ms")]
    Timeout(u64),

    /// The response arrived but could not be understood.
    #[error("LLM response format error: {0}")]
    Format(String),

    /// A prompt template failed to render.
    #[error("prompt template error: {0}")]
    Template(String),
}

impl AgentError {
    /// Whether retrying the call could plausibly succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}
