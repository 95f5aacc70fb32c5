//! The typed tools layer: the closed set of operations the orchestrator
//! (and through it, the narrator's context assembly) may invoke.
//!
//! Every tool carries a side-effect class. Pure and state-read tools
//! return views; state-write tools never touch the live state -- they
//! return typed [`Mutation`] proposals that the orchestrator applies
//! atomically in its commit step. LLM-invoking operations (intent
//! analysis, content generation, narration) are dispatched to the agent
//! ensemble and classified here for completeness.

use rand::rngs::StdRng;

use fateloom_db::event_store::{EventFilter, EventStore};
use fateloom_types::enums::{Difficulty, Intent};
use fateloom_types::event::GameEventBody;
use fateloom_types::game::GameState;
use fateloom_types::ids::{GameId, ItemId, LocationId, NpcId, QuestId, SkillId};
use fateloom_types::location::Location;
use fateloom_types::npc::Npc;
use fateloom_types::quest::Quest;

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How a tool interacts with the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Deterministic over its inputs; no reads beyond the snapshot.
    Pure,
    /// Reads persisted data beyond the snapshot.
    StateRead,
    /// Proposes state mutations (applied by the orchestrator).
    StateWrite,
    /// Calls the LLM.
    LlmInvoking,
}

/// The closed set of tool operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    /// Render the status screen.
    PlayerStatus,
    /// Render the current location.
    LocationInfo,
    /// Render the inventory.
    InventoryView,
    /// Render the skill list.
    SkillMenu,
    /// Validate an intent/target pair against the snapshot.
    ValidateAction {
        /// The classified intent.
        intent: Intent,
        /// The extracted target, if any.
        target: Option<String>,
    },
    /// Resolve combat against a named target.
    ResolveCombat {
        /// What to fight.
        target: String,
    },
    /// Equip an owned item.
    EquipItem {
        /// The item to equip.
        item: ItemId,
    },
    /// Consume an owned item.
    UseItem {
        /// The item to use.
        item: ItemId,
    },
    /// Buy one unit from an NPC shop.
    ShopPurchase {
        /// The shopkeeper.
        npc: NpcId,
        /// The listing.
        item: ItemId,
    },
    /// Sell one unit to an NPC shop.
    ShopSell {
        /// The shopkeeper.
        npc: NpcId,
        /// The item.
        item: ItemId,
    },
    /// Search the event log (see [`search_events`]).
    SearchEvents,
    /// Classify player input (agent ensemble).
    AnalyzeIntent,
    /// Generate a location (agent ensemble).
    GenerateLocation,
    /// Generate an NPC (agent ensemble).
    GenerateNpc,
    /// Generate a quest (agent ensemble).
    GenerateQuest,
}

impl ToolRequest {
    /// The side-effect class of this tool.
    pub const fn side_effect(&self) -> SideEffect {
        match self {
            Self::PlayerStatus
            | Self::LocationInfo
            | Self::InventoryView
            | Self::SkillMenu
            | Self::ValidateAction { .. }
            | Self::ResolveCombat { .. } => SideEffect::Pure,
            Self::SearchEvents => SideEffect::StateRead,
            Self::EquipItem { .. }
            | Self::UseItem { .. }
            | Self::ShopPurchase { .. }
            | Self::ShopSell { .. } => SideEffect::StateWrite,
            Self::AnalyzeIntent
            | Self::GenerateLocation
            | Self::GenerateNpc
            | Self::GenerateQuest => SideEffect::LlmInvoking,
        }
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// A typed state mutation proposed by a tool and applied atomically by
/// the orchestrator's commit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Replace the character sheet.
    ReplaceCharacter(fateloom_types::character::CharacterSheet),
    /// Insert or update an NPC (keyed by its `location_id`).
    UpsertNpc(Npc),
    /// Insert or update an active quest.
    UpsertQuest(Quest),
    /// Move a quest to the completed set.
    CompleteQuest(QuestId),
    /// Register a player-created location.
    AddCustomLocation(Location),
    /// Move the player to a location.
    MoveTo(Location),
    /// Mark a template location discovered.
    MarkDiscovered(LocationId),
    /// Count a death (respawn handled by the sheet mutation).
    IncrementDeathCount,
    /// Record that the opening narration played.
    MarkOpeningPlayed,
}

/// Apply mutations in order to produce the next snapshot.
#[must_use]
pub fn apply_mutations(state: &GameState, mutations: &[Mutation]) -> GameState {
    let mut next = state.clone();
    for mutation in mutations {
        match mutation {
            Mutation::ReplaceCharacter(sheet) => next.character = sheet.clone(),
            Mutation::UpsertNpc(npc) => {
                // Remove any previous copy, then append at its location.
                for npcs in next.npcs_by_location.values_mut() {
                    npcs.retain(|n| n.id != npc.id);
                }
                next.npcs_by_location
                    .entry(npc.location_id.clone())
                    .or_default()
                    .push(npc.clone());
            }
            Mutation::UpsertQuest(quest) => {
                next.completed_quests.remove(&quest.id);
                next.active_quests.insert(quest.id.clone(), quest.clone());
            }
            Mutation::CompleteQuest(quest_id) => {
                next.active_quests.remove(quest_id);
                next.completed_quests.insert(quest_id.clone());
                next.character.completed_quests.insert(quest_id.clone());
            }
            Mutation::AddCustomLocation(location) => {
                next.custom_locations
                    .insert(location.id.clone(), location.clone());
                next.discovered_locations.insert(location.id.clone());
            }
            Mutation::MoveTo(location) => {
                next.current_location = location.clone();
            }
            Mutation::MarkDiscovered(location_id) => {
                next.discovered_locations.insert(location_id.clone());
            }
            Mutation::IncrementDeathCount => {
                next.death_count = next.death_count.saturating_add(1);
            }
            Mutation::MarkOpeningPlayed => {
                next.opening_narration_played = true;
            }
        }
    }
    next
}

// ---------------------------------------------------------------------------
// Tool outcome
// ---------------------------------------------------------------------------

/// The result of dispatching one tool.
#[derive(Debug, Clone, Default)]
pub struct ToolOutcome {
    /// A rendered view for the player (menus, validation feedback).
    pub view: Option<String>,
    /// Proposed mutations.
    pub mutations: Vec<Mutation>,
    /// Event bodies the commit step should log.
    pub events: Vec<GameEventBody>,
    /// One-line summaries handed to the narrator as tool results.
    pub summaries: Vec<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an intent/target pair against the snapshot.
///
/// # Errors
///
/// Returns [`EngineError::InvalidAction`] with a player-facing message;
/// the orchestrator renders it as a system notification and does not
/// mutate state.
pub fn validate_action(
    intent: Intent,
    target: Option<&str>,
    state: &GameState,
) -> Result<(), EngineError> {
    match intent {
        Intent::Combat => {
            if state.character.dead {
                return Err(EngineError::InvalidAction(String::from(
                    "You are in no condition to fight.",
                )));
            }
            if target.is_none_or(|t| t.trim().is_empty()) {
                return Err(EngineError::InvalidAction(String::from(
                    "Attack what? Name a target.",
                )));
            }
            Ok(())
        }
        Intent::NpcDialogue => {
            let Some(target) = target else {
                return Err(EngineError::InvalidAction(String::from(
                    "Talk to whom? Nobody by that name is here.",
                )));
            };
            let lowered = target.to_lowercase();
            let present = state.npcs_here().iter().any(|n| {
                n.name.to_lowercase().contains(&lowered) || n.id.as_str() == lowered
            });
            if present {
                Ok(())
            } else {
                Err(EngineError::InvalidAction(format!(
                    "There is no one called \"{target}\" here."
                )))
            }
        }
        Intent::UseSkill => {
            let Some(target) = target else {
                return Err(EngineError::InvalidAction(String::from(
                    "Use which skill?",
                )));
            };
            let skill_id = SkillId::from(target);
            if state.character.has_skill(&skill_id) {
                fateloom_rules::can_use_skill(&state.character, &skill_id)
                    .map_err(|e| EngineError::InvalidAction(e.to_string()))
            } else {
                Err(EngineError::InvalidAction(format!(
                    "You do not know a skill called \"{target}\"."
                )))
            }
        }
        Intent::SkillEvolution => {
            if state.character.skills.iter().any(|s| s.at_max_level()) {
                Ok(())
            } else {
                Err(EngineError::InvalidAction(String::from(
                    "No skill has reached its limit yet.",
                )))
            }
        }
        Intent::SkillFusion => {
            if state.character.skills.len() >= 2 {
                Ok(())
            } else {
                Err(EngineError::InvalidAction(String::from(
                    "Fusion needs at least two skills.",
                )))
            }
        }
        Intent::ClassSelection => {
            if state.character.class.is_some() {
                Err(EngineError::InvalidAction(String::from(
                    "Your path is already chosen.",
                )))
            } else {
                Ok(())
            }
        }
        Intent::SystemQuery
        | Intent::QuestAction
        | Intent::SkillMenu
        | Intent::StatusMenu
        | Intent::InventoryMenu
        | Intent::Exploration => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Dispatch one synchronous tool against the snapshot.
///
/// LLM-invoking variants are routed through the agent ensemble by the
/// orchestrator and return an invalid-action error here.
///
/// # Errors
///
/// Returns [`EngineError`] on validation failures; never mutates state.
pub fn run_tool(
    request: &ToolRequest,
    state: &GameState,
    game_id: GameId,
    difficulty: Difficulty,
    rng: &mut StdRng,
) -> Result<ToolOutcome, EngineError> {
    match request {
        ToolRequest::PlayerStatus => Ok(view(render_status(state))),
        ToolRequest::LocationInfo => Ok(view(render_location(state))),
        ToolRequest::InventoryView => Ok(view(render_inventory(state))),
        ToolRequest::SkillMenu => Ok(view(render_skills(state))),
        ToolRequest::ValidateAction { intent, target } => {
            validate_action(*intent, target.as_deref(), state)?;
            Ok(ToolOutcome::default())
        }
        ToolRequest::ResolveCombat { target } => resolve_combat_tool(state, target, difficulty, rng),
        ToolRequest::EquipItem { item } => {
            let sheet = fateloom_rules::sheet::equip_item(&state.character, item)?;
            let summary = format!("equipped {item}");
            Ok(ToolOutcome {
                view: None,
                mutations: vec![Mutation::ReplaceCharacter(sheet)],
                events: vec![GameEventBody::StatChange {
                    description: summary.clone(),
                }],
                summaries: vec![summary],
            })
        }
        ToolRequest::UseItem { item } => use_item_tool(state, item),
        ToolRequest::ShopPurchase { npc, item } => shop_purchase_tool(state, game_id, npc, item),
        ToolRequest::ShopSell { npc, item } => shop_sell_tool(state, npc, item),
        ToolRequest::SearchEvents => Err(EngineError::InvalidAction(String::from(
            "event search runs through search_events",
        ))),
        ToolRequest::AnalyzeIntent
        | ToolRequest::GenerateLocation
        | ToolRequest::GenerateNpc
        | ToolRequest::GenerateQuest => Err(EngineError::InvalidAction(String::from(
            "llm-invoking tools are dispatched through the agent ensemble",
        ))),
    }
}

/// Search the event log (the `StateRead` tool).
///
/// # Errors
///
/// Returns [`EngineError::Store`] if the query fails.
pub async fn search_events(
    events: &EventStore<'_>,
    game_id: GameId,
    filter: &EventFilter,
    limit: u32,
) -> Result<Vec<String>, EngineError> {
    let found = events.search(game_id, filter, limit).await?;
    Ok(found
        .iter()
        .map(|e| e.body.searchable_text())
        .collect())
}

fn view(text: String) -> ToolOutcome {
    ToolOutcome {
        view: Some(text),
        ..ToolOutcome::default()
    }
}

// ---------------------------------------------------------------------------
// Individual tools
// ---------------------------------------------------------------------------

fn resolve_combat_tool(
    state: &GameState,
    target: &str,
    difficulty: Difficulty,
    rng: &mut StdRng,
) -> Result<ToolOutcome, EngineError> {
    let outcome = fateloom_rules::resolve_combat(&state.character, target, difficulty, rng)?;

    let mut mutations = vec![Mutation::ReplaceCharacter(outcome.sheet.clone())];
    let mut summaries = Vec::new();
    let mut events = vec![GameEventBody::CombatLog {
        target: outcome.enemy.name.clone(),
        damage: outcome.damage_dealt,
        xp_gained: outcome.xp_gained,
        gold: outcome.gold,
        loot: outcome.loot.iter().map(|i| i.id.clone()).collect(),
    }];

    if outcome.defeated {
        summaries.push(format!(
            "defeated the {} ({} damage dealt, {} xp)",
            outcome.enemy.name, outcome.damage_dealt, outcome.xp_gained
        ));
        for item in &outcome.loot {
            events.push(GameEventBody::ItemGained {
                item_id: item.id.clone(),
                quantity: item.quantity,
            });
        }
    } else if outcome.sheet.dead {
        summaries.push(format!("was struck down by the {}", outcome.enemy.name));
        mutations.push(Mutation::IncrementDeathCount);
    } else {
        summaries.push(format!(
            "fought the {} but it still stands ({} damage taken)",
            outcome.enemy.name, outcome.damage_taken
        ));
    }

    if let Some(grade) = outcome.promoted_to {
        events.push(GameEventBody::LevelUp {
            new_level: outcome.resulting_level,
            grade: grade.label().to_owned(),
        });
        summaries.push(format!("advanced to {}", grade.label()));
    } else if outcome.resulting_level > state.character.level {
        events.push(GameEventBody::LevelUp {
            new_level: outcome.resulting_level,
            grade: outcome.sheet.grade.label().to_owned(),
        });
        summaries.push(format!("reached level {}", outcome.resulting_level));
    }

    Ok(ToolOutcome {
        view: None,
        mutations,
        events,
        summaries,
    })
}

fn use_item_tool(state: &GameState, item: &ItemId) -> Result<ToolOutcome, EngineError> {
    use fateloom_types::character::ItemKind;
    let Some(stack) = state.character.inventory.slots.get(item) else {
        return Err(EngineError::InvalidAction(format!(
            "You are not carrying \"{item}\"."
        )));
    };
    if stack.kind != ItemKind::Consumable {
        return Err(EngineError::InvalidAction(format!(
            "{} is not something you can use up.",
            stack.name
        )));
    }
    // Consumables heal for their value (potions are priced by potency).
    let heal_amount = u32::try_from(stack.value).unwrap_or(u32::MAX);
    let name = stack.name.clone();
    let sheet = fateloom_rules::sheet::remove_item(&state.character, item, 1)?;
    let sheet = fateloom_rules::heal(&sheet, heal_amount);
    let summary = format!("used {name} and recovered {heal_amount} HP");
    Ok(ToolOutcome {
        view: None,
        mutations: vec![Mutation::ReplaceCharacter(sheet)],
        events: vec![GameEventBody::StatChange {
            description: summary.clone(),
        }],
        summaries: vec![summary],
    })
}

fn shop_purchase_tool(
    state: &GameState,
    game_id: GameId,
    npc_id: &NpcId,
    item: &ItemId,
) -> Result<ToolOutcome, EngineError> {
    let Some(npc) = state.find_npc(npc_id) else {
        return Err(EngineError::InvalidAction(format!(
            "No one called \"{npc_id}\" is trading here."
        )));
    };
    let outcome = fateloom_rules::npc::purchase(&state.character, npc, game_id, item)?;
    let summary = format!("bought {} from {} for {} gold", item, npc.name, outcome.paid);
    Ok(ToolOutcome {
        view: None,
        mutations: vec![
            Mutation::ReplaceCharacter(outcome.sheet),
            Mutation::UpsertNpc(outcome.npc),
        ],
        events: vec![GameEventBody::ItemGained {
            item_id: item.clone(),
            quantity: 1,
        }],
        summaries: vec![summary],
    })
}

fn shop_sell_tool(
    state: &GameState,
    npc_id: &NpcId,
    item: &ItemId,
) -> Result<ToolOutcome, EngineError> {
    let Some(npc) = state.find_npc(npc_id) else {
        return Err(EngineError::InvalidAction(format!(
            "No one called \"{npc_id}\" is trading here."
        )));
    };
    let (sheet, paid) = fateloom_rules::npc::sell(&state.character, npc, item)?;
    let summary = format!("sold {} to {} for {paid} gold", item, npc.name);
    Ok(ToolOutcome {
        view: None,
        mutations: vec![Mutation::ReplaceCharacter(sheet)],
        events: vec![GameEventBody::StatChange {
            description: summary.clone(),
        }],
        summaries: vec![summary],
    })
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

fn render_status(state: &GameState) -> String {
    let c = &state.character;
    let stats = fateloom_rules::effective_stats(c);
    let mut lines = vec![
        format!("── {} ──", state.player_name),
        format!("Level {} ({}) | XP {}", c.level, c.grade.label(), c.xp),
        format!(
            "HP {}/{} | Mana {}/{} | Energy {}/{}",
            c.hp.current, c.hp.max, c.mana.current, c.mana.max, c.energy.current, c.energy.max
        ),
        format!(
            "STR {} DEX {} CON {} INT {} WIS {} CHA {} DEF {}",
            stats.strength,
            stats.dexterity,
            stats.constitution,
            stats.intelligence,
            stats.wisdom,
            stats.charisma,
            stats.defense
        ),
        format!(
            "Class: {} | Unspent points: {} | Deaths: {}",
            c.class.as_deref().unwrap_or("none"),
            c.unspent_stat_points,
            state.death_count
        ),
    ];
    if c.dead {
        lines.push(String::from("You are DEAD. Speak to return."));
    }
    lines.join("\n")
}

fn render_location(state: &GameState) -> String {
    let location = &state.current_location;
    let npcs: Vec<&str> = state.npcs_here().iter().map(|n| n.name.as_str()).collect();
    let exits: Vec<&str> = location
        .connections
        .iter()
        .map(fateloom_types::ids::LocationId::as_str)
        .collect();
    format!(
        "── {} ──\n{}\nPresent: {}\nPaths: {}",
        location.name,
        location.description,
        if npcs.is_empty() {
            String::from("nobody")
        } else {
            npcs.join(", ")
        },
        if exits.is_empty() {
            String::from("none you can see")
        } else {
            exits.join(", ")
        },
    )
}

fn render_inventory(state: &GameState) -> String {
    let inventory = &state.character.inventory;
    let mut lines = vec![format!(
        "── Inventory ({}/{} slots, {} gold) ──",
        inventory.used_slots(),
        inventory.max_slots,
        inventory.gold
    )];
    for item in inventory.slots.values() {
        lines.push(format!("{} x{}", item.name, item.quantity));
    }
    lines.join("\n")
}

fn render_skills(state: &GameState) -> String {
    let mut lines = vec![String::from("── Skills ──")];
    for skill in &state.character.skills {
        let readiness = if skill.is_ready() {
            String::from("ready")
        } else {
            format!("cooldown {}", skill.current_cooldown)
        };
        lines.push(format!(
            "{} (lv {}/{}, {:?}) -- {}",
            skill.name, skill.level, skill.max_level, skill.rarity, readiness
        ));
    }
    for partial in &state.character.insight.partials {
        lines.push(format!("{} -- forming", partial.hint_name));
    }
    if lines.len() == 1 {
        lines.push(String::from("none yet"));
    }
    lines.join("\n")
}
