//! The system definer: produces the campaign's unique system identity at
//! game start and refreshes it on later planner runs.

use serde::Deserialize;

use fateloom_types::game::GameConfig;
use fateloom_types::plot::SystemDefinition;

use crate::ensemble::AgentDeps;
use crate::parse::extract_json;
use crate::prompt::names;
use crate::session::ChatSession;

/// Raw shape of the model's definition response.
#[derive(Debug, Deserialize)]
struct DefinitionDraft {
    name: String,
    #[serde(default)]
    personality: String,
    #[serde(default)]
    central_mystery: String,
    #[serde(default)]
    threat: String,
    #[serde(default)]
    theme: String,
    #[serde(default)]
    factions: Vec<String>,
    #[serde(default)]
    hooks: Vec<String>,
}

/// The system definer agent.
pub struct SystemDefiner {
    deps: AgentDeps,
    session: ChatSession,
}

impl SystemDefiner {
    /// Start the definer.
    pub fn start(deps: AgentDeps) -> Self {
        let session = ChatSession::start(
            deps.backend.clone(),
            deps.resilience.clone(),
            String::from(
                "You design the identity of a game system for a text \
                 role-playing campaign. Respond with JSON only.",
            ),
        );
        Self { deps, session }
    }

    /// Produce a definition for the given game configuration. Falls back
    /// to a deterministic default derived from the system type when the
    /// model output is irrecoverable.
    pub async fn define(&mut self, config: &GameConfig) -> SystemDefinition {
        let context = serde_json::json!({
            "system_type": format!("{:?}", config.system_type),
            "difficulty": format!("{:?}", config.difficulty),
            "tone": config.world_settings.tone,
            "player_name": config.player_name,
            "backstory": config.backstory,
        });
        let prompt = match self.deps.prompts.render(names::SYSTEM_DEFINER, &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "definer prompt failed, using default definition");
                return default_definition(config);
            }
        };
        match self.session.send(&prompt).await {
            Ok(raw) => match extract_json::<DefinitionDraft>(&raw) {
                Ok(draft) => SystemDefinition {
                    name: draft.name,
                    personality: draft.personality,
                    central_mystery: draft.central_mystery,
                    threat: draft.threat,
                    theme: draft.theme,
                    factions: draft.factions,
                    hooks: draft.hooks,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "definer output unparseable, using default definition");
                    default_definition(config)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "definer call failed, using default definition");
                default_definition(config)
            }
        }
    }
}

/// A deterministic default definition per system type: a playable
/// campaign identity even with no model at all.
pub fn default_definition(config: &GameConfig) -> SystemDefinition {
    use fateloom_types::enums::SystemType;
    let (name, mystery, threat, theme) = match config.system_type {
        SystemType::SystemIntegration => (
            "The Integration",
            "Why did the system choose this world now?",
            "Entities that arrived with the system",
            "powers with a price",
        ),
        SystemType::CultivationPath => (
            "The Unnumbered Path",
            "What waits past the final realm?",
            "Sects that prune promising cultivators",
            "slow ascent",
        ),
        SystemType::DeathLoop => (
            "The Recurrence",
            "What breaks the loop?",
            "Something that remembers across resets",
            "borrowed time",
        ),
        SystemType::DungeonDelve => (
            "The Delve Ledger",
            "Who built the floors below the floors?",
            "The dungeon's own hunger",
            "descent",
        ),
        SystemType::ArcaneAcademy => (
            "The Registry Arcane",
            "What is sealed beneath the academy?",
            "A faculty that studies students",
            "forbidden curricula",
        ),
        SystemType::TabletopClassic => (
            "The Chronicle",
            "Why do the old maps disagree?",
            "A war nobody admits is coming",
            "found family on the road",
        ),
        SystemType::EpicJourney => (
            "The Long Road",
            "What calls from the far shore?",
            "The cost of every shortcut",
            "distance and change",
        ),
        SystemType::HeroAwakening => (
            "The First Spark",
            "Why this person, why now?",
            "Those who hunt the newly awakened",
            "reluctant heroism",
        ),
    };
    SystemDefinition {
        name: String::from(name),
        personality: String::from("precise, patient, faintly amused"),
        central_mystery: String::from(mystery),
        threat: String::from(threat),
        theme: String::from(theme),
        factions: Vec::new(),
        hooks: vec![format!("{} begins quietly.", name)],
    }
}
