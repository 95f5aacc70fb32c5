//! Error types for all rule operations.

use fateloom_types::ids::{ItemId, NpcId, QuestId, SkillId};

/// Errors that can occur while applying gameplay rules.
///
/// These are player-visible failures: the orchestrator renders them as
/// `SystemNotification` events and leaves state untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// The referenced skill is not on the character sheet.
    #[error("skill not owned: {0}")]
    SkillNotOwned(SkillId),

    /// The skill is still cooling down.
    #[error("skill {skill} on cooldown for {remaining} more turns")]
    SkillOnCooldown {
        /// The skill.
        skill: SkillId,
        /// Turns remaining.
        remaining: u32,
    },

    /// The caster cannot pay the skill's resource costs.
    #[error("cannot afford skill {skill}: {reason}")]
    CannotAfford {
        /// The skill.
        skill: SkillId,
        /// Which resource fell short.
        reason: String,
    },

    /// A resource pool cannot cover a direct spend.
    #[error("not enough {resource}: need {needed}, have {held}")]
    ResourceShort {
        /// Which pool fell short (`"mana"`, `"energy"`, `"health"`).
        resource: &'static str,
        /// Amount required.
        needed: u32,
        /// Amount available.
        held: u32,
    },

    /// The skill has not reached max level, or the chosen path is unknown.
    #[error("skill {skill} cannot evolve: {reason}")]
    EvolutionUnavailable {
        /// The skill.
        skill: SkillId,
        /// Why evolution is blocked.
        reason: String,
    },

    /// No fusion recipe matches the given input set. The hint, when
    /// present, comes from the tag-compatibility near-miss heuristics.
    #[error("no fusion recipe matches the given skills")]
    NoFusionMatch {
        /// Near-miss hint from tag compatibility, if any.
        hint: Option<String>,
    },

    /// The inventory has no free slot for a new stack.
    #[error("inventory full ({used}/{max} slots)")]
    InventoryFull {
        /// Stacks used.
        used: u32,
        /// Stack cap.
        max: u32,
    },

    /// The item is not in the inventory (or not enough of it).
    #[error("item not available: {0}")]
    ItemNotAvailable(ItemId),

    /// The item cannot go in the requested slot.
    #[error("item {0} is not equippable in that slot")]
    NotEquippable(ItemId),

    /// Not enough gold.
    #[error("not enough gold: need {needed}, have {held}")]
    NotEnoughGold {
        /// Price.
        needed: u64,
        /// Carried gold.
        held: u64,
    },

    /// A shop purchase gate failed (stock, level, or affinity).
    #[error("cannot purchase from {npc}: {reason}")]
    PurchaseBlocked {
        /// The shopkeeper.
        npc: NpcId,
        /// Which gate failed.
        reason: String,
    },

    /// The quest's prerequisites are not complete.
    #[error("quest {0} prerequisites not met")]
    PrerequisitesNotMet(QuestId),

    /// The quest is in a terminal status.
    #[error("quest {0} is already finished")]
    QuestFinished(QuestId),

    /// Arithmetic overflow in a rules calculation.
    #[error("arithmetic overflow: {context}")]
    ArithmeticOverflow {
        /// What was being computed.
        context: String,
    },
}
