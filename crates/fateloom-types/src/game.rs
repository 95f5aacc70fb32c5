//! Game identity, creation configuration, world settings, and the full
//! per-game state snapshot.
//!
//! `GameState` is the unit the orchestrator holds in memory and the
//! persistence layer saves atomically. It is a value: every turn produces
//! a new snapshot, and agents only ever see frozen copies.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::character::CharacterSheet;
use crate::enums::{Difficulty, SystemType};
use crate::ids::{GameId, LocationId, QuestId};
use crate::location::Location;
use crate::npc::Npc;
use crate::quest::Quest;

// ---------------------------------------------------------------------------
// World settings and creation config
// ---------------------------------------------------------------------------

/// Tunable world flavour chosen at game creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorldSettings {
    /// Overall tone (`"grim"`, `"hopeful"`).
    #[serde(default)]
    pub tone: String,
    /// How common magic is in the world.
    #[serde(default)]
    pub magic_prevalence: String,
    /// Free-form extra directives passed through to agent prompts.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// Everything the engine needs to create a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Player character name.
    pub player_name: String,
    /// Narrative system flavour.
    pub system_type: SystemType,
    /// Combat tuning.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// World flavour.
    #[serde(default)]
    pub world_settings: WorldSettings,
    /// Optional player-written backstory.
    #[serde(default)]
    pub backstory: String,
}

// ---------------------------------------------------------------------------
// Game row
// ---------------------------------------------------------------------------

/// The identity row for one save. One per game; immutable except for
/// `level`, `playtime_seconds`, and `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Row identifier.
    pub id: GameId,
    /// Player character name.
    pub player_name: String,
    /// Narrative system flavour.
    pub system_type: SystemType,
    /// Combat tuning.
    pub difficulty: Difficulty,
    /// Denormalised current level for save-list display.
    pub level: u32,
    /// Accumulated play time.
    pub playtime_seconds: u64,
    /// PRNG seed for deterministic combat variance.
    pub seed: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Game state snapshot
// ---------------------------------------------------------------------------

/// The full mutable-world snapshot for one game.
///
/// Invariants checked by [`Self::invariant_violations`]:
///
/// - every NPC's `location_id` equals the key it is stored under in
///   `npcs_by_location`
/// - no active quest id appears in `completed_quests`
/// - the character's grade is derived from its level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// Owning game.
    pub game_id: GameId,
    /// Narrative system flavour (copied from the game row for prompts).
    pub system_type: SystemType,
    /// World flavour.
    pub world_settings: WorldSettings,
    /// The player character.
    pub character: CharacterSheet,
    /// Where the player currently is.
    pub current_location: Location,
    /// Player character name.
    pub player_name: String,
    /// Player-written backstory.
    #[serde(default)]
    pub backstory: String,
    /// Template-location ids the player has discovered.
    #[serde(default)]
    pub discovered_locations: BTreeSet<LocationId>,
    /// Player-created locations keyed by id.
    #[serde(default)]
    pub custom_locations: BTreeMap<LocationId, Location>,
    /// NPCs present at each location, in arrival order.
    #[serde(default)]
    pub npcs_by_location: BTreeMap<LocationId, Vec<Npc>>,
    /// Active quests keyed by id.
    #[serde(default)]
    pub active_quests: BTreeMap<QuestId, Quest>,
    /// Ids of completed quests.
    #[serde(default)]
    pub completed_quests: BTreeSet<QuestId>,
    /// How many times the player has died.
    #[serde(default)]
    pub death_count: u32,
    /// Whether the opening narration has been played.
    #[serde(default)]
    pub opening_narration_played: bool,
}

impl GameState {
    /// Find an NPC anywhere in the world by id.
    pub fn find_npc(&self, npc_id: &crate::ids::NpcId) -> Option<&Npc> {
        self.npcs_by_location
            .values()
            .flat_map(|npcs| npcs.iter())
            .find(|npc| &npc.id == npc_id)
    }

    /// NPCs at the player's current location.
    pub fn npcs_here(&self) -> &[Npc] {
        self.npcs_by_location
            .get(&self.current_location.id)
            .map_or(&[], Vec::as_slice)
    }

    /// Look up a location by id, template-discovered or custom.
    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        if &self.current_location.id == id {
            return Some(&self.current_location);
        }
        self.custom_locations.get(id)
    }

    /// Check the structural invariants, returning a description of every
    /// violation found. An empty vector means the snapshot is consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (location_id, npcs) in &self.npcs_by_location {
            for npc in npcs {
                if &npc.location_id != location_id {
                    violations.push(format!(
                        "npc {} stored under {} but located at {}",
                        npc.id, location_id, npc.location_id
                    ));
                }
            }
        }

        for quest_id in self.active_quests.keys() {
            if self.completed_quests.contains(quest_id) {
                violations.push(format!("quest {quest_id} is both active and completed"));
            }
        }

        let derived = crate::enums::Grade::from_level(self.character.level);
        if self.character.grade != derived {
            violations.push(format!(
                "grade {:?} does not match level {} (expected {:?})",
                self.character.grade, self.character.level, derived
            ));
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NpcId;

    fn minimal_state() -> GameState {
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
            discovered_locations: [LocationId::from("tutorial-grove")].into_iter().collect(),
            custom_locations: BTreeMap::new(),
            npcs_by_location: BTreeMap::new(),
            active_quests: BTreeMap::new(),
            completed_quests: BTreeSet::new(),
            death_count: 0,
            opening_narration_played: false,
        }
    }

    fn npc_at(id: &str, location: &str) -> Npc {
        Npc {
            id: NpcId::from(id),
            name: String::from(id),
            archetype: String::new(),
            location_id: LocationId::from(location),
            personality: String::new(),
            conversation: Vec::new(),
            affinity: BTreeMap::new(),
            shop: None,
            offered_quests: Vec::new(),
            lore: String::new(),
            greeting_context: String::new(),
        }
    }

    #[test]
    fn consistent_state_has_no_violations() {
        let mut state = minimal_state();
        state
            .npcs_by_location
            .insert(LocationId::from("tutorial-grove"), vec![npc_at("brakka", "tutorial-grove")]);
        assert!(state.invariant_violations().is_empty());
    }

    #[test]
    fn misplaced_npc_is_a_violation() {
        let mut state = minimal_state();
        state
            .npcs_by_location
            .insert(LocationId::from("tutorial-grove"), vec![npc_at("brakka", "old-road")]);
        let violations = state.invariant_violations();
        assert_eq!(violations.len(), 1);
        assert!(violations.first().is_some_and(|v| v.contains("brakka")));
    }

    #[test]
    fn active_and_completed_quest_is_a_violation() {
        let mut state = minimal_state();
        state.active_quests.insert(
            QuestId::from("rat-cull"),
            Quest {
                id: QuestId::from("rat-cull"),
                name: String::new(),
                description: String::new(),
                quest_type: crate::enums::QuestType::Side,
                objectives: Vec::new(),
                rewards: crate::quest::QuestRewards::default(),
                prerequisites: BTreeSet::new(),
                giver: None,
                status: crate::enums::QuestStatus::InProgress,
            },
        );
        state.completed_quests.insert(QuestId::from("rat-cull"));
        assert_eq!(state.invariant_violations().len(), 1);
    }

    #[test]
    fn npcs_here_reads_current_location() {
        let mut state = minimal_state();
        assert!(state.npcs_here().is_empty());
        state
            .npcs_by_location
            .insert(LocationId::from("tutorial-grove"), vec![npc_at("brakka", "tutorial-grove")]);
        assert_eq!(state.npcs_here().len(), 1);
    }

    #[test]
    fn find_npc_searches_all_locations() {
        let mut state = minimal_state();
        state
            .npcs_by_location
            .insert(LocationId::from("old-road"), vec![npc_at("wren", "old-road")]);
        assert!(state.find_npc(&NpcId::from("wren")).is_some());
        assert!(state.find_npc(&NpcId::from("ghost")).is_none());
    }
}
