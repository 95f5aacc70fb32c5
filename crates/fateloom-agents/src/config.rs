//! Configuration types for LLM backends and call resilience.

use std::time::Duration;

use serde::Deserialize;

/// Which wire shape a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions (`OpenAI`, `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// In-process scripted responses: offline mode and tests.
    Scripted,
}

/// Connection settings for one LLM backend.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Wire shape.
    pub kind: BackendKind,
    /// Base API URL (`https://api.openai.com/v1`).
    #[serde(default)]
    pub api_url: String,
    /// API key; empty for local endpoints.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier.
    #[serde(default)]
    pub model: String,
    /// Per-response token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

const fn default_max_tokens() -> u32 {
    1024
}

/// Resilience settings applied to every agent call.
#[derive(Debug, Clone, Deserialize)]
pub struct ResilienceConfig {
    /// Per-call deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the initial attempt (transient errors only).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay before the first retry, doubled per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Jitter applied around each delay, in percent of the delay.
    #[serde(default = "default_jitter_pct")]
    pub jitter_pct: u32,
}

const fn default_timeout_ms() -> u64 {
    30_000
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_base_delay_ms() -> u64 {
    500
}

const fn default_jitter_pct() -> u32 {
    20
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter_pct: default_jitter_pct(),
        }
    }
}

impl ResilienceConfig {
    /// The per-call deadline as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resilience_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.jitter_pct, 20);
    }

    #[test]
    fn backend_config_deserialises_with_defaults() {
        let config: Result<BackendConfig, _> =
            serde_json::from_str(r#"{"kind": "scripted"}"#);
        let config = config.ok();
        assert_eq!(config.as_ref().map(|c| c.kind), Some(BackendKind::Scripted));
        assert_eq!(config.map(|c| c.max_tokens), Some(1024));
    }
}
