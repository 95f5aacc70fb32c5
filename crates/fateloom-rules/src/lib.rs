//! Pure gameplay rules for the Fateloom narrative engine.
//!
//! Everything in this crate is a deterministic function over the value
//! types in `fateloom-types`: no I/O, no clocks, no global randomness.
//! Combat variance consumes an externally supplied PRNG seed so outcomes
//! replay exactly. Transitions take a snapshot and return a new snapshot
//! plus a typed description of what changed; the orchestrator decides what
//! to persist and what events to emit.
//!
//! # Modules
//!
//! - [`progression`] -- XP curves, level-ups, grade promotion, stat growth
//! - [`sheet`] -- Effective stats, damage/heal/resource clamps, equipment,
//!   inventory, status-effect ticks
//! - [`combat`] -- Deterministic combat resolution from a seeded PRNG
//! - [`skills`] -- Skill execution, action insight, evolution, fusion,
//!   cooldowns
//! - [`npc`] -- Relationship affinity, conversation history, shop trades
//! - [`quest`] -- Quest acceptance, objective progress, completion rewards
//! - [`error`] -- Error types for all rule operations ([`RulesError`])

pub mod combat;
pub mod error;
pub mod npc;
pub mod progression;
pub mod quest;
pub mod sheet;
pub mod skills;

pub use combat::{CombatOutcome, EnemyProfile, resolve_combat};
pub use error::RulesError;
pub use progression::{GainXpOutcome, cumulative_xp_for_level, gain_xp, xp_to_next_level};
pub use sheet::{EffectiveStats, effective_stats, heal, take_damage, tick_status_effects};
pub use skills::cooldown::{can_use_skill, tick_skill_cooldowns};
pub use skills::execution::{ExecutionOutcome, execute_skill};
pub use skills::fusion::{FusionOutcome, fuse_skills};
pub use skills::insight::{InsightOutcome, track_action};
pub use skills::evolution::evolve_skill;
