//! Character sheet value types: stats, resources, equipment, inventory,
//! status effects, and the action-insight tracker.
//!
//! The sheet is an immutable snapshot. All gameplay transitions (XP gain,
//! damage, equipping, skill execution) live in `fateloom-rules` and return
//! new snapshots; this module only defines the data and the small clamped
//! operations that keep individual fields inside their invariants.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::enums::{Grade, SkillCategory, Stat, WeaponType};
use crate::ids::{ItemId, QuestId, RecipeId, SkillId};
use crate::skill::Skill;

// ---------------------------------------------------------------------------
// Base stats
// ---------------------------------------------------------------------------

/// The seven base attributes of a character.
///
/// Base stats never go negative; modifiers from equipment and status
/// effects are applied on top when computing effective stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    /// Physical power.
    pub strength: u32,
    /// Agility and precision.
    pub dexterity: u32,
    /// Toughness.
    pub constitution: u32,
    /// Arcane aptitude.
    pub intelligence: u32,
    /// Willpower.
    pub wisdom: u32,
    /// Presence.
    pub charisma: u32,
    /// Flat physical mitigation.
    pub defense: u32,
}

impl BaseStats {
    /// Read one attribute by its [`Stat`] tag.
    pub const fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Strength => self.strength,
            Stat::Dexterity => self.dexterity,
            Stat::Constitution => self.constitution,
            Stat::Intelligence => self.intelligence,
            Stat::Wisdom => self.wisdom,
            Stat::Charisma => self.charisma,
            Stat::Defense => self.defense,
        }
    }

    /// Return a copy with one attribute raised by `amount` (saturating).
    #[must_use]
    pub const fn raised(mut self, stat: Stat, amount: u32) -> Self {
        match stat {
            Stat::Strength => self.strength = self.strength.saturating_add(amount),
            Stat::Dexterity => self.dexterity = self.dexterity.saturating_add(amount),
            Stat::Constitution => self.constitution = self.constitution.saturating_add(amount),
            Stat::Intelligence => self.intelligence = self.intelligence.saturating_add(amount),
            Stat::Wisdom => self.wisdom = self.wisdom.saturating_add(amount),
            Stat::Charisma => self.charisma = self.charisma.saturating_add(amount),
            Stat::Defense => self.defense = self.defense.saturating_add(amount),
        }
        self
    }
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
            defense: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource pools
// ---------------------------------------------------------------------------

/// A clamped current/max resource pair (HP, mana, energy).
///
/// `0 <= current <= max` always holds; every operation re-establishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Current value.
    pub current: u32,
    /// Ceiling for the current value.
    pub max: u32,
}

impl ResourcePool {
    /// Create a pool filled to its maximum.
    pub const fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Reduce the current value, flooring at 0.
    #[must_use]
    pub const fn drained(self, amount: u32) -> Self {
        Self {
            current: self.current.saturating_sub(amount),
            max: self.max,
        }
    }

    /// Raise the current value, capping at max.
    #[must_use]
    pub const fn restored(self, amount: u32) -> Self {
        let raised = self.current.saturating_add(amount);
        Self {
            current: if raised > self.max { self.max } else { raised },
            max: self.max,
        }
    }

    /// Raise the maximum by `amount` and refill to the new maximum.
    ///
    /// Used on level-up, where resources are fully restored.
    #[must_use]
    pub const fn grown(self, amount: u32) -> Self {
        let max = self.max.saturating_add(amount);
        Self { current: max, max }
    }

    /// Whether at least `amount` is available to spend.
    pub const fn can_afford(self, amount: u32) -> bool {
        self.current >= amount
    }

    /// Whether the pool is empty.
    pub const fn is_empty(self) -> bool {
        self.current == 0
    }
}

// ---------------------------------------------------------------------------
// Items, inventory, equipment
// ---------------------------------------------------------------------------

/// What kind of thing an item is, and therefore where it can go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Equippable in the weapon slot.
    Weapon(WeaponType),
    /// Equippable in the armor slot.
    Armor,
    /// Equippable in the accessory slot.
    Accessory,
    /// Consumed on use.
    Consumable,
    /// Quest-bound, cannot be sold.
    QuestItem,
    /// Crafting or trade material.
    Material,
}

/// An item stack in an inventory or shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Content identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Flavour and mechanics description.
    pub description: String,
    /// Classification.
    pub kind: ItemKind,
    /// Stat bonuses granted while equipped (may be negative for cursed gear).
    #[serde(default)]
    pub stat_bonuses: BTreeMap<Stat, i32>,
    /// Stack size; always at least 1 while the item exists.
    pub quantity: u32,
    /// Base gold value for shop pricing.
    #[serde(default)]
    pub value: u64,
}

/// The player's carried items, keyed by item id.
///
/// Invariants: every stack has `quantity >= 1`; the number of distinct
/// stacks never exceeds `max_slots`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    /// Item stacks keyed by item id.
    pub slots: BTreeMap<ItemId, Item>,
    /// Maximum number of distinct stacks.
    pub max_slots: u32,
    /// Carried gold.
    pub gold: u64,
}

impl Inventory {
    /// Create an empty inventory with the given slot cap.
    pub const fn new(max_slots: u32) -> Self {
        Self {
            slots: BTreeMap::new(),
            max_slots,
            gold: 0,
        }
    }

    /// Number of distinct stacks currently held.
    pub fn used_slots(&self) -> u32 {
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    /// Whether a new distinct stack can be added.
    pub fn has_free_slot(&self) -> bool {
        self.used_slots() < self.max_slots
    }

    /// Quantity held of one item, 0 if absent.
    pub fn quantity_of(&self, id: &ItemId) -> u32 {
        self.slots.get(id).map_or(0, |item| item.quantity)
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(30)
    }
}

/// The three equipment slots. Each holds the full item so its bonuses can
/// be read without an inventory lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Equipment {
    /// Main hand.
    pub weapon: Option<Item>,
    /// Body.
    pub armor: Option<Item>,
    /// Trinket.
    pub accessory: Option<Item>,
}

impl Equipment {
    /// The weapon family currently wielded, if any.
    pub fn weapon_type(&self) -> Option<WeaponType> {
        match self.weapon.as_ref().map(|w| w.kind) {
            Some(ItemKind::Weapon(wt)) => Some(wt),
            _ => None,
        }
    }

    /// Iterate over all equipped items.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.weapon
            .iter()
            .chain(self.armor.iter())
            .chain(self.accessory.iter())
    }
}

// ---------------------------------------------------------------------------
// Status effects
// ---------------------------------------------------------------------------

/// A temporary modifier applied to the character for a number of turns.
///
/// Covers buffs, debuffs, damage over time, and regeneration. Remaining
/// duration is always at least 1 while the effect is attached; the rules
/// crate removes effects whose duration reaches 0 on tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    /// Stable identifier for stacking rules (`"poisoned"`, `"iron_skin"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Per-stat modifiers while active; negative values are debuffs.
    #[serde(default)]
    pub modifiers: BTreeMap<Stat, i32>,
    /// HP change applied each turn: negative for damage over time,
    /// positive for regeneration, zero for pure stat effects.
    #[serde(default)]
    pub hp_per_turn: i64,
    /// Turns left, at least 1.
    pub remaining_turns: u32,
}

// ---------------------------------------------------------------------------
// Action insight
// ---------------------------------------------------------------------------

/// A partially revealed skill: the player has crossed the partial-unlock
/// threshold and sees a blind hint, but does not yet own the skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSkill {
    /// The skill that will eventually unlock.
    pub skill_id: SkillId,
    /// The action token driving the unlock (`"sword_slash"`).
    pub action_type: String,
    /// Obscured name shown to the player (`"??? (something sharp)"`).
    pub hint_name: String,
    /// Repetitions observed when the partial was revealed.
    pub reps_seen: u64,
}

/// Tracks repeated action tokens and the skills they have revealed or
/// granted. Skills are granted at most once across all pathways; the
/// `granted` set is the single source of truth for that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActionInsightTracker {
    /// Repetition count per action token. Counts only increase.
    pub counts: BTreeMap<String, u64>,
    /// Partial skills revealed but not yet granted.
    pub partials: Vec<PartialSkill>,
    /// Skill ids already granted through any pathway.
    pub granted: BTreeSet<SkillId>,
}

impl ActionInsightTracker {
    /// Repetition count for one action token, 0 if never performed.
    pub fn count(&self, action_type: &str) -> u64 {
        self.counts.get(action_type).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Evolution history
// ---------------------------------------------------------------------------

/// One entry in the character's skill evolution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    /// The skill that was consumed.
    pub from: SkillId,
    /// The skill that replaced it.
    pub to: SkillId,
    /// Player level at the time.
    pub at_level: u32,
}

// ---------------------------------------------------------------------------
// Character sheet
// ---------------------------------------------------------------------------

/// The full character snapshot.
///
/// Invariants (established by `fateloom-rules` transitions and checked by
/// [`GameState::validate`](crate::game::GameState::validate)):
///
/// - `grade == Grade::from_level(level)`
/// - skill ids are unique
/// - `hp.current == 0` iff the dead flag is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSheet {
    /// Current level, at least 1.
    pub level: u32,
    /// Cumulative experience across the whole career.
    pub xp: u64,
    /// The seven base attributes.
    pub base_stats: BaseStats,
    /// Hit points.
    pub hp: ResourcePool,
    /// Mana.
    pub mana: ResourcePool,
    /// Energy.
    pub energy: ResourcePool,
    /// Owned skills; ids unique.
    pub skills: Vec<Skill>,
    /// Equipped gear.
    pub equipment: Equipment,
    /// Carried items and gold.
    pub inventory: Inventory,
    /// Active temporary effects.
    pub status_effects: Vec<StatusEffect>,
    /// Progression tier, always derived from level.
    pub grade: Grade,
    /// Chosen class slug, if a class has been selected.
    pub class: Option<String>,
    /// History of skill evolutions.
    pub evolution_history: Vec<EvolutionRecord>,
    /// Stat points awarded on grade promotion, not yet spent.
    pub unspent_stat_points: u32,
    /// Repeated-action tracking for insight skill acquisition.
    pub insight: ActionInsightTracker,
    /// Fusion recipes the player has discovered.
    pub known_recipes: BTreeSet<RecipeId>,
    /// Quests completed across the career (mirrors game state for
    /// evolution requirement checks).
    pub completed_quests: BTreeSet<QuestId>,
    /// Set when HP reaches 0; cleared on respawn.
    pub dead: bool,
}

impl CharacterSheet {
    /// A fresh level-1 sheet with default stats and full resources.
    pub fn new_level_one() -> Self {
        Self {
            level: 1,
            xp: 0,
            base_stats: BaseStats::default(),
            hp: ResourcePool::full(100),
            mana: ResourcePool::full(50),
            energy: ResourcePool::full(100),
            skills: Vec::new(),
            equipment: Equipment::default(),
            inventory: Inventory::default(),
            status_effects: Vec::new(),
            grade: Grade::E,
            class: None,
            evolution_history: Vec::new(),
            unspent_stat_points: 0,
            insight: ActionInsightTracker::default(),
            known_recipes: BTreeSet::new(),
            completed_quests: BTreeSet::new(),
            dead: false,
        }
    }

    /// Find an owned skill by id.
    pub fn skill(&self, id: &SkillId) -> Option<&Skill> {
        self.skills.iter().find(|s| &s.id == id)
    }

    /// Whether a skill with this id is owned.
    pub fn has_skill(&self, id: &SkillId) -> bool {
        self.skill(id).is_some()
    }

    /// Owned skills of one category.
    pub fn skills_in_category(&self, category: SkillCategory) -> impl Iterator<Item = &Skill> {
        self.skills.iter().filter(move |s| s.category == category)
    }
}
