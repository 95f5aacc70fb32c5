//! LLM agent ensemble and story planner for the Fateloom narrative
//! engine.
//!
//! The core depends only on the streaming-chat-agent contract: a session
//! starts from a system directive, carries its own conversation history,
//! and answers each message with an ordered, finite, cancellable chunk
//! stream. Provider specifics (OpenAI-compatible, Anthropic, scripted)
//! live behind enum dispatch in [`backend`].
//!
//! # Modules
//!
//! - [`backend`] -- Provider implementations and the conversation shape
//! - [`session`] -- Stateful chat sessions and word-chunk streaming
//! - [`resilience`] -- Timeouts, retries with backoff and jitter
//! - [`prompt`] -- Embedded `minijinja` templates
//! - [`parse`] -- Tolerant JSON extraction from model output
//! - [`ensemble`] -- The specialised agents (intent, narrator,
//!   generators, perspectives, system definer)
//! - [`planner`] -- The planning council orchestration
//! - [`config`] -- Backend and resilience configuration
//! - [`error`] -- Error types ([`AgentError`])

pub mod backend;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod parse;
pub mod planner;
pub mod prompt;
pub mod resilience;
pub mod session;

// Re-export primary types at crate root for convenience.
pub use backend::{ChatTurn, Conversation, LlmBackend, ScriptedBackend, create_backend};
pub use config::{BackendConfig, BackendKind, ResilienceConfig};
pub use ensemble::AgentDeps;
pub use ensemble::generators::{LocationGenerator, NpcGenerator, QuestGenerator};
pub use ensemble::intent::{IntentAnalysis, IntentAnalyzer, heuristic_intent};
pub use ensemble::narrator::{NarrationContext, Narrator};
pub use ensemble::perspective::PerspectiveAgent;
pub use ensemble::system_definer::{SystemDefiner, default_definition};
pub use error::AgentError;
pub use planner::{PlanOutcome, Planner};
pub use prompt::PromptEngine;
pub use session::{ChatSession, ChunkStream, CHUNK_CHANNEL_CAPACITY};

/// Minimal constructors shared by unit tests across modules.
#[cfg(test)]
pub(crate) mod test_support {
    use fateloom_types::enums::{SkillCategory, SkillRarity, TargetType};
    use fateloom_types::ids::SkillId;
    use fateloom_types::skill::{AcquisitionSource, Skill, SkillCost};

    /// Build a bare owned skill without pulling in the rules catalog.
    pub fn catalog_like_skill(id: &str, name: &str) -> Option<Skill> {
        Some(Skill {
            id: SkillId::from(id),
            name: String::from(name),
            description: String::new(),
            rarity: SkillRarity::Common,
            cost: SkillCost::default(),
            base_cooldown: 1,
            current_cooldown: 0,
            level: 1,
            max_level: 10,
            xp: 0,
            effects: Vec::new(),
            passive: false,
            target: TargetType::SingleEnemy,
            evolution_paths: Vec::new(),
            fusion_tags: std::collections::BTreeSet::new(),
            source: AcquisitionSource::ClassGrant {
                class: String::from("test"),
            },
            category: SkillCategory::Offense,
        })
    }
}
