//! Shared domain types for the Fateloom narrative engine.
//!
//! Every gameplay entity is an immutable value snapshot: the rules crate
//! produces new snapshots from pure transitions, the persistence layer
//! serialises them, and the orchestrator swaps the current one under its
//! per-game lock. Nothing in this crate performs I/O.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly typed identifiers (row ids and content slugs)
//! - [`enums`] -- Closed enumerations: grades, rarities, intents, statuses
//! - [`character`] -- Character sheet, stats, resources, inventory, status effects
//! - [`skill`] -- Skills, effects, acquisition sources, evolution, fusion recipes
//! - [`npc`] -- NPCs, conversation history, relationships, shops
//! - [`quest`] -- Quests, objectives, rewards
//! - [`location`] -- Locations and their connections
//! - [`plot`] -- Plot graph entities: beats, nodes, edges, proposals, consensus
//! - [`game`] -- Game identity row, world settings, and the full state snapshot
//! - [`event`] -- Append-only game event log entries

pub mod character;
pub mod enums;
pub mod event;
pub mod game;
pub mod ids;
pub mod location;
pub mod npc;
pub mod plot;
pub mod quest;
pub mod skill;

// Re-export primary types at crate root for convenience.
pub use character::{
    ActionInsightTracker, BaseStats, CharacterSheet, Equipment, Inventory, Item, ItemKind,
    PartialSkill, ResourcePool, StatusEffect,
};
pub use enums::{
    BeatType, ConsensusType, DamageType, Difficulty, EdgeType, EventCategory, EventImportance,
    Grade, Intent, NodeStatus, PerspectiveKind, QuestStatus, QuestType, SkillCategory, SkillRarity,
    Stat, SystemType, TargetType, ThreadCategory, WeaponType,
};
pub use event::{GameEvent, GameEventBody};
pub use game::{Game, GameConfig, GameState, WorldSettings};
pub use ids::{
    BeatId, EdgeId, GameId, ItemId, LocationId, NodeId, NpcId, PlanningSessionId, QuestId,
    RecipeId, SkillId, ThreadId,
};
pub use location::Location;
pub use npc::{ConversationTurn, Npc, Shop, ShopItem, Speaker};
pub use plot::{
    AgentProposal, Beat, ConsensusConflict, ConsensusResult, Foreshadow, NodePosition,
    PlanningSession, PlotEdge, PlotGraph, PlotNode, PlotThread, SystemDefinition,
};
pub use quest::{Objective, Quest, QuestRewards};
pub use skill::{
    AcquisitionSource, EvolutionPath, EvolutionRequirements, FusionRecipe, Skill, SkillCost,
    SkillEffect,
};
