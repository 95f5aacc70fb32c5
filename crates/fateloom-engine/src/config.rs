//! Engine configuration: `fateloom.yaml` layered with `FATELOOM_*`
//! environment overrides.

use serde::Deserialize;

use fateloom_agents::{BackendConfig, BackendKind, ResilienceConfig};

use crate::error::EngineError;

/// Database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the save-game `SQLite` file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    String::from("fateloom.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Planner settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Per-perspective deadline in milliseconds.
    #[serde(default = "default_agent_timeout_ms")]
    pub per_agent_timeout_ms: u64,
}

const fn default_agent_timeout_ms() -> u64 {
    45_000
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            per_agent_timeout_ms: default_agent_timeout_ms(),
        }
    }
}

/// UI transport settings (contract-side only; the UI itself is external).
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    /// Capacity of the narrator-to-UI chunk queue.
    #[serde(default = "default_chunk_capacity")]
    pub chunk_queue_capacity: usize,
}

const fn default_chunk_capacity() -> usize {
    256
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            chunk_queue_capacity: default_chunk_capacity(),
        }
    }
}

/// The full engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// LLM backend settings.
    #[serde(default = "default_backend")]
    pub llm: BackendConfig,
    /// Call resilience settings.
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// Planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,
    /// UI transport settings.
    #[serde(default)]
    pub ui: UiConfig,
}

fn default_backend() -> BackendConfig {
    BackendConfig {
        kind: BackendKind::Scripted,
        api_url: String::new(),
        api_key: String::new(),
        model: String::new(),
        max_tokens: 1024,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            llm: default_backend(),
            resilience: ResilienceConfig::default(),
            planner: PlannerConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration: `fateloom.yaml` (optional) layered under
    /// `FATELOOM_*` environment variables (`FATELOOM_DATABASE__PATH`).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if a present source fails to parse.
    pub fn load() -> Result<Self, EngineError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("fateloom").required(false))
            .add_source(
                config::Environment::with_prefix("FATELOOM")
                    .separator("__")
                    .try_parsing(true),
            );
        builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.database.path, "fateloom.db");
        assert_eq!(config.ui.chunk_queue_capacity, 256);
        assert_eq!(config.llm.kind, BackendKind::Scripted);
        assert!(config.planner.per_agent_timeout_ms >= 1_000);
    }

    #[test]
    fn yaml_fragment_deserialises() {
        let yaml = r#"{"database": {"path": "/tmp/save.db"}, "llm": {"kind": "anthropic", "model": "claude"}}"#;
        let config: Result<EngineConfig, _> = serde_json::from_str(yaml);
        let config = config.ok();
        assert_eq!(
            config.as_ref().map(|c| c.database.path.clone()),
            Some(String::from("/tmp/save.db"))
        );
        assert_eq!(config.map(|c| c.llm.kind), Some(BackendKind::Anthropic));
    }
}
