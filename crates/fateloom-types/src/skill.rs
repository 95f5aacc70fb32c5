//! Skill value types: effects, costs, acquisition sources, evolution paths,
//! and fusion recipes.
//!
//! A skill is data; executing one is a pure transition in
//! `fateloom-rules::skills`. Effects are a sealed variant set dispatched
//! exhaustively -- new effect kinds are added here, and the executor's
//! `match` will not compile until it handles them.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{DamageType, SkillCategory, SkillRarity, Stat, TargetType};
use crate::ids::{NpcId, QuestId, RecipeId, SkillId};

// ---------------------------------------------------------------------------
// Costs
// ---------------------------------------------------------------------------

/// Resource costs paid when a skill is executed.
///
/// `health` may never reduce the caster below 1 HP -- affordability checks
/// in the rules crate require `current_hp > health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SkillCost {
    /// Mana spent per use.
    #[serde(default)]
    pub mana: u32,
    /// Energy spent per use.
    #[serde(default)]
    pub energy: u32,
    /// Health sacrificed per use.
    #[serde(default)]
    pub health: u32,
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// One effect inside a skill, applied in declaration order on execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillEffect {
    /// Direct damage to the target.
    Damage {
        /// Base damage before rarity and level scaling.
        base: u32,
        /// Which mitigation formula the target applies.
        damage_type: DamageType,
        /// Attribute whose value is added via `scaling_ratio`.
        scaling_stat: Stat,
        /// Fraction of the scaling stat added to base damage.
        scaling_ratio: Decimal,
    },
    /// Restore the caster's or ally's hit points.
    Heal {
        /// Base healing before scaling.
        base: u32,
        /// Attribute whose value is added via `scaling_ratio`.
        scaling_stat: Stat,
        /// Fraction of the scaling stat added to base healing.
        scaling_ratio: Decimal,
    },
    /// Temporary stat change; negative `amount` is a debuff.
    StatModifier {
        /// Affected attribute.
        stat: Stat,
        /// Signed delta while active.
        amount: i32,
        /// Turns the modifier persists.
        duration: u32,
    },
    /// Damage applied at the start of each of the target's turns.
    DamageOverTime {
        /// Damage per turn before scaling.
        per_turn: u32,
        /// Mitigation formula applied each tick.
        damage_type: DamageType,
        /// Number of ticks.
        duration: u32,
    },
    /// Healing applied at the start of each turn.
    HealOverTime {
        /// Healing per turn before scaling.
        per_turn: u32,
        /// Number of ticks.
        duration: u32,
    },
    /// Absorbs damage before HP is touched.
    Shield {
        /// Shield capacity before scaling.
        amount: u32,
        /// Turns the shield persists if not broken.
        duration: u32,
    },
    /// Permanent stat aggregate while the (passive) skill is owned.
    PassiveStat {
        /// Affected attribute.
        stat: Stat,
        /// Flat bonus while owned.
        amount: u32,
    },
    /// Restore mana or energy.
    RestoreResource {
        /// `true` restores mana, `false` restores energy.
        mana: bool,
        /// Amount restored before scaling.
        amount: u32,
    },
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// How a skill entered the character sheet. Retained as a provenance chain:
/// evolution and fusion record what they consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AcquisitionSource {
    /// Granted when the class was chosen.
    ClassGrant {
        /// The class slug.
        class: String,
    },
    /// Learned through repeated action insight.
    ActionInsight {
        /// The action token that unlocked it.
        action_type: String,
        /// Repetitions at the moment of unlock.
        repetitions: u64,
    },
    /// Produced by evolving a max-level skill.
    Evolution {
        /// The consumed predecessor.
        from: SkillId,
    },
    /// Produced by fusing owned skills.
    Fusion {
        /// The consumed inputs.
        inputs: BTreeSet<SkillId>,
        /// The recipe that matched.
        recipe: RecipeId,
    },
    /// Reward for completing a quest.
    QuestReward {
        /// The awarding quest.
        quest: QuestId,
    },
    /// Bought from an NPC shop.
    Purchased {
        /// The selling NPC.
        npc: NpcId,
    },
}

// ---------------------------------------------------------------------------
// Evolution
// ---------------------------------------------------------------------------

/// Requirements gating one evolution path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EvolutionRequirements {
    /// Minimum base stat values.
    #[serde(default)]
    pub stat_minima: BTreeMap<Stat, u32>,
    /// Minimum player level.
    #[serde(default)]
    pub min_player_level: u32,
    /// Quests that must be completed.
    #[serde(default)]
    pub required_quests: BTreeSet<QuestId>,
}

/// One way a max-level skill can evolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionPath {
    /// The skill this path produces.
    pub target: SkillId,
    /// Display name of the path (`"Way of the Flame"`).
    pub name: String,
    /// Gates that must all pass.
    pub requirements: EvolutionRequirements,
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// A fusion recipe: an exact input set with per-input minimum levels and a
/// result skill. Matched against the owned skill set by
/// `fateloom-rules::skills::fusion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionRecipe {
    /// Recipe identifier.
    pub id: RecipeId,
    /// Required input skills mapped to their minimum levels.
    pub inputs: BTreeMap<SkillId, u32>,
    /// The skill produced.
    pub result: SkillId,
    /// Tags used for near-miss hint heuristics.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A skill owned by (or offered to) the character.
///
/// Invariants: `current_cooldown <= base_cooldown`; `level <= max_level`;
/// `xp` resets to 0 once `max_level` is reached (evolution readiness is
/// signalled by `level == max_level`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    /// Content identifier.
    pub id: SkillId,
    /// Display name.
    pub name: String,
    /// Player-facing description.
    pub description: String,
    /// Rarity tier.
    pub rarity: SkillRarity,
    /// Per-use resource costs.
    pub cost: SkillCost,
    /// Cooldown in combat turns after use.
    pub base_cooldown: u32,
    /// Turns remaining before the skill is ready again.
    pub current_cooldown: u32,
    /// Current skill level, starting at 1.
    pub level: u32,
    /// Level cap; reaching it enables evolution.
    pub max_level: u32,
    /// XP accumulated toward the next skill level.
    pub xp: u64,
    /// Ordered effects applied on execution.
    pub effects: Vec<SkillEffect>,
    /// `false` for active skills, `true` for passives.
    pub passive: bool,
    /// What the skill targets.
    pub target: TargetType,
    /// Evolution paths available at max level.
    #[serde(default)]
    pub evolution_paths: Vec<EvolutionPath>,
    /// Tags participating in fusion hint heuristics.
    #[serde(default)]
    pub fusion_tags: BTreeSet<String>,
    /// Provenance.
    pub source: AcquisitionSource,
    /// Menu grouping.
    pub category: SkillCategory,
}

impl Skill {
    /// Whether the cooldown has fully elapsed.
    pub const fn is_ready(&self) -> bool {
        self.current_cooldown == 0
    }

    /// Whether the skill sits at its level cap.
    pub const fn at_max_level(&self) -> bool {
        self.level >= self.max_level
    }

    /// XP required to advance this skill from its current level.
    ///
    /// Formula: `level * 50 * rarity_xp_multiplier`. Returns `None` at max
    /// level (no further advancement; evolution takes over).
    pub fn xp_to_next_level(&self) -> Option<u64> {
        if self.at_max_level() {
            return None;
        }
        u64::from(self.level)
            .checked_mul(50)?
            .checked_mul(self.rarity.xp_multiplier())
    }
}
