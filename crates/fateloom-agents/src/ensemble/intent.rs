//! Intent classification: LLM first, deterministic heuristics as the
//! fallback.
//!
//! The analyzer never fails a turn: if the model times out or returns
//! something unusable, keyword heuristics classify the input instead,
//! defaulting to exploration.

use serde::Deserialize;

use fateloom_types::enums::Intent;
use fateloom_types::game::GameState;

use crate::ensemble::AgentDeps;
use crate::parse::{extract_json, parse_intent};
use crate::prompt::names;
use crate::session::ChatSession;

/// The classified intent plus an optional extracted target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentAnalysis {
    /// The classified intent.
    pub intent: Intent,
    /// The target phrase, if the input names one (`"goblin"`).
    pub target: Option<String>,
    /// Whether the heuristics produced this (for diagnostics).
    pub from_fallback: bool,
}

/// Raw shape of the model's classification response.
#[derive(Debug, Deserialize)]
struct RawIntentResponse {
    intent: String,
    #[serde(default)]
    target: Option<String>,
}

/// The intent analyzer agent.
pub struct IntentAnalyzer {
    deps: AgentDeps,
    session: ChatSession,
}

impl IntentAnalyzer {
    /// Start the analyzer with its classification directive.
    pub fn start(deps: AgentDeps) -> Self {
        let session = ChatSession::start(
            deps.backend.clone(),
            deps.resilience.clone(),
            String::from(
                "You classify player input for a text role-playing game. \
                 Respond with JSON only, never prose.",
            ),
        );
        Self { deps, session }
    }

    /// Classify one player input against the current state snapshot.
    pub async fn analyze(&mut self, input: &str, state: &GameState) -> IntentAnalysis {
        let context = serde_json::json!({
            "player_input": input,
            "location_name": state.current_location.name,
            "npcs_here": state.npcs_here().iter().map(|n| n.name.clone()).collect::<Vec<_>>(),
            "skills": state.character.skills.iter().map(|s| s.name.clone()).collect::<Vec<_>>(),
        });

        let prompt = match self.deps.prompts.render(names::INTENT, &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "intent prompt render failed, using heuristics");
                return heuristic_intent(input, state);
            }
        };

        match self.session.send(&prompt).await {
            Ok(raw) => match extract_json::<RawIntentResponse>(&raw) {
                Ok(parsed) => IntentAnalysis {
                    intent: parse_intent(&parsed.intent),
                    target: parsed.target.filter(|t| !t.trim().is_empty()),
                    from_fallback: false,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "intent response unparseable, using heuristics");
                    heuristic_intent(input, state)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "intent call failed, using heuristics");
                heuristic_intent(input, state)
            }
        }
    }
}

/// Deterministic keyword classification, used when the model is
/// unavailable or unusable.
pub fn heuristic_intent(input: &str, state: &GameState) -> IntentAnalysis {
    let lowered = input.trim().to_lowercase();

    let analysis = |intent: Intent, target: Option<String>| IntentAnalysis {
        intent,
        target,
        from_fallback: true,
    };

    // Menus first: single words with unambiguous meaning.
    if matches!(lowered.as_str(), "status" | "stats" | "character") {
        return analysis(Intent::StatusMenu, None);
    }
    if matches!(lowered.as_str(), "inventory" | "bag" | "items") {
        return analysis(Intent::InventoryMenu, None);
    }
    if matches!(lowered.as_str(), "skills" | "skill list" | "abilities") {
        return analysis(Intent::SkillMenu, None);
    }

    if let Some(rest) = strip_any(&lowered, &["attack ", "fight ", "strike ", "kill "]) {
        return analysis(Intent::Combat, Some(rest));
    }
    if let Some(rest) = strip_any(&lowered, &["talk to ", "speak to ", "speak with ", "ask "]) {
        return analysis(Intent::NpcDialogue, Some(rest));
    }
    // Naming a present NPC counts as addressing them.
    for npc in state.npcs_here() {
        if lowered.contains(&npc.name.to_lowercase()) {
            return analysis(Intent::NpcDialogue, Some(npc.name.clone()));
        }
    }
    if let Some(rest) = strip_any(&lowered, &["use ", "cast "]) {
        // Only a skill-use if the phrase matches an owned skill.
        let named = state
            .character
            .skills
            .iter()
            .find(|s| rest.contains(&s.name.to_lowercase()) || rest.contains(s.id.as_str()));
        if let Some(skill) = named {
            return analysis(Intent::UseSkill, Some(skill.id.as_str().to_owned()));
        }
    }
    if lowered.starts_with("evolve") {
        return analysis(Intent::SkillEvolution, None);
    }
    if lowered.starts_with("fuse") || lowered.contains("fusion") {
        return analysis(Intent::SkillFusion, None);
    }
    if lowered.contains("quest") {
        return analysis(Intent::QuestAction, None);
    }
    if lowered.starts_with("choose ") && lowered.contains("class") || lowered.starts_with("class ")
    {
        return analysis(Intent::ClassSelection, None);
    }
    if lowered.starts_with("system") || lowered.starts_with("what is") || lowered.ends_with('?') {
        return analysis(Intent::SystemQuery, None);
    }

    analysis(Intent::Exploration, None)
}

/// Strip the first matching prefix, returning the remainder.
fn strip_any(input: &str, prefixes: &[&str]) -> Option<String> {
    prefixes
        .iter()
        .find_map(|p| input.strip_prefix(p))
        .map(|rest| rest.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Arc;

    use fateloom_types::character::CharacterSheet;
    use fateloom_types::enums::SystemType;
    use fateloom_types::game::WorldSettings;
    use fateloom_types::ids::{GameId, LocationId};
    use fateloom_types::location::Location;

    use crate::backend::{LlmBackend, ScriptedBackend};
    use crate::config::ResilienceConfig;
    use crate::prompt::PromptEngine;

    fn test_state() -> GameState {
        GameState {
            game_id: GameId::new(),
            system_type: SystemType::SystemIntegration,
            world_settings: WorldSettings::default(),
            character: CharacterSheet::new_level_one(),
            current_location: Location {
                id: LocationId::from("tutorial-grove"),
                name: String::from("Tutorial Grove"),
                description: String::new(),
                tags: BTreeSet::new(),
                connections: BTreeSet::new(),
                danger_level: 1,
            },
            player_name: String::from("Kaya"),
            backstory: String::new(),
            discovered_locations: BTreeSet::new(),
            custom_locations: BTreeMap::new(),
            npcs_by_location: BTreeMap::new(),
            active_quests: BTreeMap::new(),
            completed_quests: BTreeSet::new(),
            death_count: 0,
            opening_narration_played: false,
        }
    }

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
    async fn model_classification_is_used_when_parseable() {
        let mut analyzer = IntentAnalyzer::start(deps_with(&[
            r#"{"intent": "COMBAT", "target": "goblin"}"#,
        ]));
        let analysis = analyzer.analyze("attack goblin", &test_state()).await;
        assert_eq!(analysis.intent, Intent::Combat);
        assert_eq!(analysis.target.as_deref(), Some("goblin"));
        assert!(!analysis.from_fallback);
    }

    #[tokio::test]
    async fn unusable_model_output_falls_back() {
        let mut analyzer =
            IntentAnalyzer::start(deps_with(&["I believe the player wants to fight."]));
        let analysis = analyzer.analyze("attack goblin", &test_state()).await;
        assert_eq!(analysis.intent, Intent::Combat);
        assert_eq!(analysis.target.as_deref(), Some("goblin"));
        assert!(analysis.from_fallback);
    }

    #[tokio::test]
    async fn backend_failure_falls_back() {
        let mut analyzer = IntentAnalyzer::start(deps_with(&[]));
        let analysis = analyzer.analyze("inventory", &test_state()).await;
        assert_eq!(analysis.intent, Intent::InventoryMenu);
        assert!(analysis.from_fallback);
    }

    #[test]
    fn heuristics_cover_the_menu_family() {
        let state = test_state();
        assert_eq!(heuristic_intent("status", &state).intent, Intent::StatusMenu);
        assert_eq!(
            heuristic_intent("inventory", &state).intent,
            Intent::InventoryMenu
        );
        assert_eq!(heuristic_intent("skills", &state).intent, Intent::SkillMenu);
    }

    #[test]
    fn heuristics_classify_skill_use_only_for_owned_skills() {
        let mut state = test_state();
        assert_eq!(
            heuristic_intent("use power strike", &state).intent,
            Intent::Exploration
        );
        if let Some(skill) = crate::test_support::catalog_like_skill("power_strike", "Power Strike")
        {
            state.character.skills.push(skill);
        }
        let analysis = heuristic_intent("use power strike", &state);
        assert_eq!(analysis.intent, Intent::UseSkill);
        assert_eq!(analysis.target.as_deref(), Some("power_strike"));
    }

    #[test]
    fn heuristics_default_to_exploration() {
        let state = test_state();
        let analysis = heuristic_intent("wander toward the treeline", &state);
        assert_eq!(analysis.intent, Intent::Exploration);
        assert!(analysis.from_fallback);
    }
}
