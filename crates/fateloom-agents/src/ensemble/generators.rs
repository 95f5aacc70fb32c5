//! Content generators: NPCs, locations, quests.
//!
//! Each generator asks the model for a strictly-typed object, parses
//! tolerantly, and substitutes a minimal deterministic default when the
//! output is irrecoverable -- generation can disappoint, but it can never
//! fail a turn.

use serde::Deserialize;
use std::collections::BTreeSet;

use fateloom_types::enums::{QuestStatus, QuestType};
use fateloom_types::game::GameState;
use fateloom_types::ids::{LocationId, NpcId, QuestId};
use fateloom_types::location::Location;
use fateloom_types::npc::Npc;
use fateloom_types::quest::{Objective, Quest, QuestRewards};

use crate::ensemble::AgentDeps;
use crate::parse::extract_json;
use crate::prompt::names;
use crate::session::ChatSession;

// ---------------------------------------------------------------------------
// Draft shapes (what the model actually returns)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NpcDraft {
    id: String,
    name: String,
    #[serde(default)]
    archetype: String,
    #[serde(default)]
    personality: String,
    #[serde(default)]
    lore: String,
    #[serde(default)]
    greeting_context: String,
}

#[derive(Debug, Deserialize)]
struct LocationDraft {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    danger_level: u32,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDraft {
    description: String,
    #[serde(default)]
    current_progress: u32,
    #[serde(default = "default_target")]
    target_progress: u32,
}

const fn default_target() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RewardsDraft {
    #[serde(default)]
    xp: u64,
    #[serde(default)]
    gold: u64,
}

#[derive(Debug, Deserialize)]
struct QuestDraft {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    objectives: Vec<ObjectiveDraft>,
    #[serde(default)]
    rewards: Option<RewardsDraft>,
}

// ---------------------------------------------------------------------------
// Shared generator core
// ---------------------------------------------------------------------------

/// One generator: a session plus the template it speaks through.
struct Generator {
    deps: AgentDeps,
    session: ChatSession,
    template: &'static str,
}

impl Generator {
    fn start(deps: AgentDeps, template: &'static str, directive: &str) -> Self {
        let session = ChatSession::start(
            deps.backend.clone(),
            deps.resilience.clone(),
            format!("{directive} Respond with JSON only, never prose."),
        );
        Self {
            deps,
            session,
            template,
        }
    }

    /// Render, call, and parse; `None` when the model's output is
    /// irrecoverable.
    async fn generate<T: serde::de::DeserializeOwned>(
        &mut self,
        context: &serde_json::Value,
    ) -> Option<T> {
        let prompt = match self.deps.prompts.render(self.template, context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(template = self.template, error = %e, "generator prompt failed");
                return None;
            }
        };
        match self.session.send(&prompt).await {
            Ok(raw) => match extract_json::<T>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(template = self.template, error = %e, "generator output unparseable");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(template = self.template, error = %e, "generator call failed");
                None
            }
        }
    }
}

/// Kebab-case a display name into a content slug.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        String::from("unnamed")
    } else {
        slug
    }
}

// ---------------------------------------------------------------------------
// NPC generator
// ---------------------------------------------------------------------------

/// Generates NPCs for the current location.
pub struct NpcGenerator {
    inner: Generator,
}

impl NpcGenerator {
    /// Start the generator.
    pub fn start(deps: AgentDeps) -> Self {
        Self {
            inner: Generator::start(
                deps,
                names::NPC_GEN,
                "You invent memorable NPCs for a text role-playing game.",
            ),
        }
    }

    /// Generate an NPC at the player's current location. Falls back to a
    /// nameless wanderer when the model output is irrecoverable.
    pub async fn generate(&mut self, state: &GameState, hint: &str, theme: &str) -> Npc {
        let context = serde_json::json!({
            "location_name": state.current_location.name,
            "location_description": state.current_location.description,
            "theme": theme,
            "level": state.character.level,
            "hint": hint,
        });
        let draft: Option<NpcDraft> = self.inner.generate(&context).await;
        let location_id = state.current_location.id.clone();
        match draft {
            Some(draft) => Npc {
                id: NpcId::from(slugify(if draft.id.is_empty() {
                    &draft.name
                } else {
                    &draft.id
                })),
                name: draft.name,
                archetype: draft.archetype,
                location_id,
                personality: draft.personality,
                conversation: Vec::new(),
                affinity: std::collections::BTreeMap::new(),
                shop: None,
                offered_quests: Vec::new(),
                lore: draft.lore,
                greeting_context: draft.greeting_context,
            },
            None => fallback_npc(location_id),
        }
    }
}

/// The minimal default NPC.
fn fallback_npc(location_id: LocationId) -> Npc {
    Npc {
        id: NpcId::from("wanderer"),
        name: String::from("A Hooded Wanderer"),
        archetype: String::from("traveler"),
        location_id,
        personality: String::from("guarded, speaks in short sentences"),
        conversation: Vec::new(),
        affinity: std::collections::BTreeMap::new(),
        shop: None,
        offered_quests: Vec::new(),
        lore: String::new(),
        greeting_context: String::from("passing through"),
    }
}

// ---------------------------------------------------------------------------
// Location generator
// ---------------------------------------------------------------------------

/// Generates new locations from discovery cues.
pub struct LocationGenerator {
    inner: Generator,
}

impl LocationGenerator {
    /// Start the generator.
    pub fn start(deps: AgentDeps) -> Self {
        Self {
            inner: Generator::start(
                deps,
                names::LOCATION_GEN,
                "You invent evocative locations for a text role-playing game.",
            ),
        }
    }

    /// Generate a location adjacent to the player's position. Falls back
    /// to an unmarked path when the model output is irrecoverable.
    pub async fn generate(&mut self, state: &GameState, cue: &str, theme: &str) -> Location {
        let context = serde_json::json!({
            "location_name": state.current_location.name,
            "location_description": state.current_location.description,
            "theme": theme,
            "level": state.character.level,
            "cue": cue,
        });
        let draft: Option<LocationDraft> = self.inner.generate(&context).await;
        match draft {
            Some(draft) => Location {
                id: LocationId::from(slugify(if draft.id.is_empty() {
                    &draft.name
                } else {
                    &draft.id
                })),
                name: draft.name,
                description: draft.description,
                tags: draft.tags,
                connections: BTreeSet::new(),
                danger_level: draft.danger_level.clamp(1, 10),
            },
            None => fallback_location(state.character.level),
        }
    }
}

/// The minimal default location.
fn fallback_location(level: u32) -> Location {
    Location {
        id: LocationId::from("unmarked-path"),
        name: String::from("An Unmarked Path"),
        description: String::from("A narrow trail that does not appear on any map."),
        tags: [String::from("wilds")].into_iter().collect(),
        connections: BTreeSet::new(),
        danger_level: (level / 5).clamp(1, 10),
    }
}

// ---------------------------------------------------------------------------
// Quest generator
// ---------------------------------------------------------------------------

/// Generates quests, optionally tied to a giver NPC.
pub struct QuestGenerator {
    inner: Generator,
}

impl QuestGenerator {
    /// Start the generator.
    pub fn start(deps: AgentDeps) -> Self {
        Self {
            inner: Generator::start(
                deps,
                names::QUEST_GEN,
                "You design quests for a text role-playing game.",
            ),
        }
    }

    /// Generate a quest for the current situation. Falls back to a simple
    /// scouting errand when the model output is irrecoverable.
    pub async fn generate(
        &mut self,
        state: &GameState,
        giver: Option<&NpcId>,
        hint: &str,
        theme: &str,
    ) -> Quest {
        let context = serde_json::json!({
            "location_name": state.current_location.name,
            "theme": theme,
            "level": state.character.level,
            "giver": giver.map(fateloom_types::ids::NpcId::as_str),
            "hint": hint,
        });
        let draft: Option<QuestDraft> = self.inner.generate(&context).await;
        match draft {
            Some(draft) => {
                let objectives = if draft.objectives.is_empty() {
                    vec![Objective {
                        description: format!("See it through: {}", draft.name),
                        current_progress: 0,
                        target_progress: 1,
                    }]
                } else {
                    draft
                        .objectives
                        .into_iter()
                        .map(|o| Objective {
                            description: o.description,
                            current_progress: o.current_progress.min(o.target_progress),
                            target_progress: o.target_progress.max(1),
                        })
                        .collect()
                };
                let rewards = draft.rewards.map_or_else(
                    || default_rewards(state.character.level),
                    |r| QuestRewards {
                        xp: r.xp,
                        items: Vec::new(),
                        unlocked_locations: BTreeSet::new(),
                        gold: r.gold,
                    },
                );
                Quest {
                    id: QuestId::from(slugify(if draft.id.is_empty() {
                        &draft.name
                    } else {
                        &draft.id
                    })),
                    name: draft.name,
                    description: draft.description,
                    quest_type: QuestType::Side,
                    objectives,
                    rewards,
                    prerequisites: BTreeSet::new(),
                    giver: giver.cloned(),
                    status: QuestStatus::NotStarted,
                }
            }
            None => fallback_quest(state.character.level, giver.cloned()),
        }
    }
}

/// Level-scaled default rewards.
fn default_rewards(level: u32) -> QuestRewards {
    QuestRewards {
        xp: u64::from(level).saturating_mul(50),
        items: Vec::new(),
        unlocked_locations: BTreeSet::new(),
        gold: u64::from(level).saturating_mul(5),
    }
}

/// The minimal default quest.
fn fallback_quest(level: u32, giver: Option<NpcId>) -> Quest {
    Quest {
        id: QuestId::from("scout-the-surroundings"),
        name: String::from("Scout the Surroundings"),
        description: String::from("Learn the lay of the land nearby."),
        quest_type: QuestType::Side,
        objectives: vec![Objective {
            description: String::from("Visit a place you have not seen before"),
            current_progress: 0,
            target_progress: 1,
        }],
        rewards: default_rewards(level),
        prerequisites: BTreeSet::new(),
        giver,
        status: QuestStatus::NotStarted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use fateloom_types::character::CharacterSheet;
    use fateloom_types::enums::SystemType;
    use fateloom_types::game::WorldSettings;
    use fateloom_types::ids::GameId;

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
                description: String::from("A quiet clearing."),
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

    #[test]
    fn slugify_produces_kebab_case() {
        assert_eq!(slugify("Whispering Hollow"), "whispering-hollow");
        assert_eq!(slugify("  Brakka's  Forge! "), "brakka-s-forge");
        assert_eq!(slugify(""), "unnamed");
    }

    #[tokio::test]
    async fn npc_generation_parses_model_output() {
        let mut generator = NpcGenerator::start(deps_with(&[
            r#"{"id": "brakka", "name": "Brakka", "archetype": "blacksmith", "personality": "gruff"}"#,
        ]));
        let npc = generator.generate(&test_state(), "", "forge-light").await;
        assert_eq!(npc.id, NpcId::from("brakka"));
        assert_eq!(npc.location_id, LocationId::from("tutorial-grove"));
    }

    #[tokio::test]
    async fn npc_generation_falls_back_on_garbage() {
        let mut generator =
            NpcGenerator::start(deps_with(&["A blacksmith would be nice here."]));
        let npc = generator.generate(&test_state(), "", "forge-light").await;
        assert_eq!(npc.id, NpcId::from("wanderer"));
        assert_eq!(npc.location_id, LocationId::from("tutorial-grove"));
    }

    #[tokio::test]
    async fn location_generation_clamps_danger() {
        let mut generator = LocationGenerator::start(deps_with(&[
            r#"{"id": "abyss", "name": "The Abyss", "danger_level": 99}"#,
        ]));
        let location = generator.generate(&test_state(), "a dark cleft", "depths").await;
        assert_eq!(location.danger_level, 10);
    }

    #[tokio::test]
    async fn quest_generation_guarantees_objectives() {
        let mut generator = QuestGenerator::start(deps_with(&[
            r#"{"id": "forge-errand", "name": "The Forge Errand", "objectives": []}"#,
        ]));
        let quest = generator.generate(&test_state(), None, "", "theme").await;
        assert_eq!(quest.objectives.len(), 1);
        assert_eq!(quest.status, QuestStatus::NotStarted);
    }

    #[tokio::test]
    async fn quest_generation_falls_back_with_giver() {
        let mut generator = QuestGenerator::start(deps_with(&[]));
        let giver = NpcId::from("brakka");
        let quest = generator
            .generate(&test_state(), Some(&giver), "", "theme")
            .await;
        assert_eq!(quest.giver, Some(giver));
        assert!(!quest.objectives.is_empty());
    }
}
