//! The narrator agent: turns a turn's mechanics into streamed prose.

use crate::ensemble::AgentDeps;
use crate::error::AgentError;
use crate::prompt::names;
use crate::session::{ChatSession, ChunkStream};

/// Everything the narrator needs to know about the turn.
#[derive(Debug, Clone, Default)]
pub struct NarrationContext {
    /// The campaign system's name.
    pub system_name: String,
    /// Its voice.
    pub system_personality: String,
    /// Tonal theme.
    pub theme: String,
    /// Current location name.
    pub location_name: String,
    /// Current location description.
    pub location_description: String,
    /// Player character name.
    pub player_name: String,
    /// Player level.
    pub level: u32,
    /// Grade label.
    pub grade: String,
    /// Current hit points.
    pub hp_current: u32,
    /// Maximum hit points.
    pub hp_max: u32,
    /// The raw player input.
    pub player_input: String,
    /// The classified intent label.
    pub intent: String,
    /// Tool outcomes to narrate (`"dealt 12 damage to the goblin"`).
    pub tool_results: Vec<String>,
    /// Digest lines of recent events.
    pub recent_events: Vec<String>,
    /// Titles of upcoming triggered beats.
    pub upcoming_beats: Vec<String>,
    /// Foreshadowing hints to weave in.
    pub foreshadowing: Vec<String>,
}

/// The narrator agent.
pub struct Narrator {
    deps: AgentDeps,
    session: ChatSession,
}

impl Narrator {
    /// Start the narrator with its voice directive.
    pub fn start(deps: AgentDeps, system_personality: &str) -> Self {
        let session = ChatSession::start(
            deps.backend.clone(),
            deps.resilience.clone(),
            format!(
                "You are the narrator of a text role-playing game. \
                 Your voice: {system_personality}. Write vivid second-person \
                 prose. Never break character, never mention mechanics."
            ),
        );
        Self { deps, session }
    }

    /// Narrate one turn, returning the ordered chunk stream.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when both the call and its retries fail;
    /// the orchestrator then falls back to a plain system notification so
    /// the turn still terminates cleanly.
    pub async fn narrate(&mut self, context: &NarrationContext) -> Result<ChunkStream, AgentError> {
        let value = serde_json::json!({
            "system_name": context.system_name,
            "system_personality": context.system_personality,
            "theme": context.theme,
            "location_name": context.location_name,
            "location_description": context.location_description,
            "player_name": context.player_name,
            "level": context.level,
            "grade": context.grade,
            "hp_current": context.hp_current,
            "hp_max": context.hp_max,
            "player_input": context.player_input,
            "intent": context.intent,
            "tool_results": context.tool_results,
            "recent_events": context.recent_events,
            "upcoming_beats": context.upcoming_beats,
            "foreshadowing": context.foreshadowing,
        });
        let prompt = self.deps.prompts.render(names::NARRATOR, &value)?;
        self.session.send_streaming(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backend::{LlmBackend, ScriptedBackend};
    use crate::config::ResilienceConfig;
    use crate::prompt::PromptEngine;

    fn deps_with(responses: &[&str]) -> AgentDeps {
        let backend = Arc::new(LlmBackend::Scripted(ScriptedBackend::with_responses(
            responses.iter().map(|r| String::from(*r)),
        )));
        let prompts = Arc::new(PromptEngine::new().unwrap_or_else(|e| {
            tracing::error!("prompt engine failed: {e}");
            std::process::exit(1);
        }));
        AgentDeps::new(
            backend,
            ResilienceConfig {
                timeout_ms: 1_000,
                max_retries: 0,
                base_delay_ms: 1,
                jitter_pct: 0,
            },
            prompts,
        )
    }

    #[tokio::test]
    async fn narration_streams_the_reply() {
        let mut narrator = Narrator::start(
            deps_with(&["The grove holds its breath as you step forward."]),
            "quiet, watchful",
        );
        let stream = narrator
            .narrate(&NarrationContext {
                player_name: String::from("Kaya"),
                player_input: String::from("look around"),
                intent: String::from("EXPLORATION"),
                ..NarrationContext::default()
            })
            .await
            .ok();
        let Some(stream) = stream else {
            assert!(false, "narration failed");
            return;
        };
        let text = stream.collect_text().await;
        assert_eq!(text, "The grove holds its breath as you step forward.");
    }

    #[tokio::test]
    async fn narration_failure_surfaces_as_error() {
        let mut narrator = Narrator::start(deps_with(&[]), "quiet");
        let result = narrator.narrate(&NarrationContext::default()).await;
        assert!(result.is_err());
    }
}
