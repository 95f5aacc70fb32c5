//! Character sheet transitions: effective stats, damage and healing,
//! resource spending, equipment, inventory, and status-effect ticks.
//!
//! All functions are pure. Resource values are clamped to `[0, max]` on
//! every path; effective stats floor at 0 after negative modifiers.

use std::collections::BTreeMap;

use fateloom_types::character::{CharacterSheet, Item, ItemKind, StatusEffect};
use fateloom_types::enums::Stat;
use fateloom_types::ids::ItemId;

use crate::error::RulesError;

// ---------------------------------------------------------------------------
// Effective stats
// ---------------------------------------------------------------------------

/// The character's attributes after equipment bonuses and active status
/// effect modifiers. Values floor at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveStats {
    /// Effective strength.
    pub strength: u32,
    /// Effective dexterity.
    pub dexterity: u32,
    /// Effective constitution.
    pub constitution: u32,
    /// Effective intelligence.
    pub intelligence: u32,
    /// Effective wisdom.
    pub wisdom: u32,
    /// Effective charisma.
    pub charisma: u32,
    /// Effective defense.
    pub defense: u32,
}

impl EffectiveStats {
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
}

/// Compute effective stats: base + equipment bonuses + status-effect
/// modifiers + passive skill aggregates, floored at 0 per attribute.
pub fn effective_stats(sheet: &CharacterSheet) -> EffectiveStats {
    let mut totals: BTreeMap<Stat, i64> = Stat::ALL
        .iter()
        .map(|&stat| (stat, i64::from(sheet.base_stats.get(stat))))
        .collect();

    for item in sheet.equipment.iter() {
        for (&stat, &bonus) in &item.stat_bonuses {
            if let Some(total) = totals.get_mut(&stat) {
                *total = total.saturating_add(i64::from(bonus));
            }
        }
    }

    for effect in &sheet.status_effects {
        for (&stat, &modifier) in &effect.modifiers {
            if let Some(total) = totals.get_mut(&stat) {
                *total = total.saturating_add(i64::from(modifier));
            }
        }
    }

    for skill in &sheet.skills {
        if !skill.passive {
            continue;
        }
        for effect in &skill.effects {
            if let fateloom_types::skill::SkillEffect::PassiveStat { stat, amount } = effect
                && let Some(total) = totals.get_mut(stat)
            {
                *total = total.saturating_add(i64::from(*amount));
            }
        }
    }

    let clamped = |stat: Stat| -> u32 {
        totals
            .get(&stat)
            .copied()
            .unwrap_or(0)
            .clamp(0, i64::from(u32::MAX))
            .try_into()
            .unwrap_or(0)
    };

    EffectiveStats {
        strength: clamped(Stat::Strength),
        dexterity: clamped(Stat::Dexterity),
        constitution: clamped(Stat::Constitution),
        intelligence: clamped(Stat::Intelligence),
        wisdom: clamped(Stat::Wisdom),
        charisma: clamped(Stat::Charisma),
        defense: clamped(Stat::Defense),
    }
}

// ---------------------------------------------------------------------------
// Damage, healing, resources
// ---------------------------------------------------------------------------

/// Apply damage to the character, clamping HP at 0 and setting the dead
/// flag when it empties.
#[must_use]
pub fn take_damage(sheet: &CharacterSheet, amount: u32) -> CharacterSheet {
    let mut next = sheet.clone();
    next.hp = next.hp.drained(amount);
    if next.hp.is_empty() {
        next.dead = true;
    }
    next
}

/// Heal the character, capping at max HP. Healing never revives: a dead
/// character stays dead until respawn clears the flag.
#[must_use]
pub fn heal(sheet: &CharacterSheet, amount: u32) -> CharacterSheet {
    let mut next = sheet.clone();
    if !next.dead {
        next.hp = next.hp.restored(amount);
    }
    next
}

/// Spend mana if affordable.
pub fn spend_mana(sheet: &CharacterSheet, amount: u32) -> Result<CharacterSheet, RulesError> {
    if !sheet.mana.can_afford(amount) {
        return Err(RulesError::ResourceShort {
            resource: "mana",
            needed: amount,
            held: sheet.mana.current,
        });
    }
    let mut next = sheet.clone();
    next.mana = next.mana.drained(amount);
    Ok(next)
}

/// Spend energy if affordable.
pub fn spend_energy(sheet: &CharacterSheet, amount: u32) -> Result<CharacterSheet, RulesError> {
    if !sheet.energy.can_afford(amount) {
        return Err(RulesError::ResourceShort {
            resource: "energy",
            needed: amount,
            held: sheet.energy.current,
        });
    }
    let mut next = sheet.clone();
    next.energy = next.energy.drained(amount);
    Ok(next)
}

/// Respawn a dead character at full resources, incrementing nothing --
/// the death counter lives on the game state and is advanced by the
/// orchestrator.
#[must_use]
pub fn respawn(sheet: &CharacterSheet) -> CharacterSheet {
    let mut next = sheet.clone();
    next.dead = false;
    next.hp = next.hp.restored(next.hp.max);
    next.mana = next.mana.restored(next.mana.max);
    next.energy = next.energy.restored(next.energy.max);
    next.status_effects.clear();
    next
}

// ---------------------------------------------------------------------------
// Status effect ticks
// ---------------------------------------------------------------------------

/// The result of one status-effect tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTickOutcome {
    /// The new snapshot.
    pub sheet: CharacterSheet,
    /// Net HP change applied this tick (negative for damage).
    pub hp_delta: i64,
    /// Effects that expired this tick.
    pub expired: Vec<StatusEffect>,
}

/// Advance all status effects by one turn: apply per-turn HP changes,
/// decrement durations, and drop expired effects.
#[must_use]
pub fn tick_status_effects(sheet: &CharacterSheet) -> StatusTickOutcome {
    let mut next = sheet.clone();
    let mut hp_delta: i64 = 0;

    for effect in &next.status_effects {
        hp_delta = hp_delta.saturating_add(effect.hp_per_turn);
    }

    if hp_delta < 0 {
        let loss = u32::try_from(hp_delta.unsigned_abs().min(u64::from(u32::MAX))).unwrap_or(0);
        next.hp = next.hp.drained(loss);
        if next.hp.is_empty() {
            next.dead = true;
        }
    } else if hp_delta > 0 && !next.dead {
        let gain = u32::try_from(hp_delta.unsigned_abs().min(u64::from(u32::MAX))).unwrap_or(0);
        next.hp = next.hp.restored(gain);
    }

    let mut remaining = Vec::with_capacity(next.status_effects.len());
    let mut expired = Vec::new();
    for mut effect in next.status_effects.drain(..) {
        effect.remaining_turns = effect.remaining_turns.saturating_sub(1);
        if effect.remaining_turns == 0 {
            expired.push(effect);
        } else {
            remaining.push(effect);
        }
    }
    next.status_effects = remaining;

    StatusTickOutcome {
        sheet: next,
        hp_delta,
        expired,
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Add an item stack to the inventory, merging with an existing stack of
/// the same id.
pub fn add_item(sheet: &CharacterSheet, item: Item) -> Result<CharacterSheet, RulesError> {
    let mut next = sheet.clone();
    if let Some(existing) = next.inventory.slots.get_mut(&item.id) {
        existing.quantity = existing.quantity.saturating_add(item.quantity.max(1));
    } else {
        if !next.inventory.has_free_slot() {
            return Err(RulesError::InventoryFull {
                used: next.inventory.used_slots(),
                max: next.inventory.max_slots,
            });
        }
        let mut item = item;
        item.quantity = item.quantity.max(1);
        next.inventory.slots.insert(item.id.clone(), item);
    }
    Ok(next)
}

/// Remove `quantity` of an item, deleting the stack when it empties.
pub fn remove_item(
    sheet: &CharacterSheet,
    id: &ItemId,
    quantity: u32,
) -> Result<CharacterSheet, RulesError> {
    let mut next = sheet.clone();
    let Some(existing) = next.inventory.slots.get_mut(id) else {
        return Err(RulesError::ItemNotAvailable(id.clone()));
    };
    if existing.quantity < quantity {
        return Err(RulesError::ItemNotAvailable(id.clone()));
    }
    existing.quantity = existing.quantity.saturating_sub(quantity);
    if existing.quantity == 0 {
        next.inventory.slots.remove(id);
    }
    Ok(next)
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

/// Equip an item from the inventory into its natural slot, returning any
/// displaced item to the inventory.
pub fn equip_item(sheet: &CharacterSheet, id: &ItemId) -> Result<CharacterSheet, RulesError> {
    let Some(stack) = sheet.inventory.slots.get(id) else {
        return Err(RulesError::ItemNotAvailable(id.clone()));
    };
    let slot_of = |kind: ItemKind| -> Option<u8> {
        match kind {
            ItemKind::Weapon(_) => Some(0),
            ItemKind::Armor => Some(1),
            ItemKind::Accessory => Some(2),
            ItemKind::Consumable | ItemKind::QuestItem | ItemKind::Material => None,
        }
    };
    let Some(slot) = slot_of(stack.kind) else {
        return Err(RulesError::NotEquippable(id.clone()));
    };

    // Take one unit out of the stack.
    let mut next = remove_item(sheet, id, 1)?;
    let mut unit = stack.clone();
    unit.quantity = 1;

    let displaced = match slot {
        0 => next.equipment.weapon.replace(unit),
        1 => next.equipment.armor.replace(unit),
        _ => next.equipment.accessory.replace(unit),
    };

    if let Some(old) = displaced {
        next = add_item(&next, old)?;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fateloom_types::enums::WeaponType;

    fn sword() -> Item {
        Item {
            id: ItemId::from("iron-sword"),
            name: String::from("Iron Sword"),
            description: String::new(),
            kind: ItemKind::Weapon(WeaponType::Sword),
            stat_bonuses: [(Stat::Strength, 3)].into_iter().collect(),
            quantity: 1,
            value: 50,
        }
    }

    #[test]
    fn effective_stats_with_no_modifiers_equal_base() {
        let sheet = CharacterSheet::new_level_one();
        let stats = effective_stats(&sheet);
        assert_eq!(stats.strength, sheet.base_stats.strength);
        assert_eq!(stats.defense, sheet.base_stats.defense);
    }

    #[test]
    fn equipment_bonus_applies() {
        let sheet = CharacterSheet::new_level_one();
        let sheet = add_item(&sheet, sword()).unwrap_or_else(|_| sheet.clone());
        let sheet = equip_item(&sheet, &ItemId::from("iron-sword"))
            .unwrap_or_else(|_| sheet.clone());
        let stats = effective_stats(&sheet);
        assert_eq!(stats.strength, 13);
    }

    #[test]
    fn negative_modifier_floors_at_zero() {
        let mut sheet = CharacterSheet::new_level_one();
        sheet.status_effects.push(StatusEffect {
            id: String::from("withered"),
            name: String::from("Withered"),
            modifiers: [(Stat::Strength, -999)].into_iter().collect(),
            hp_per_turn: 0,
            remaining_turns: 3,
        });
        let stats = effective_stats(&sheet);
        assert_eq!(stats.strength, 0);
    }

    #[test]
    fn lethal_damage_sets_dead_flag() {
        let sheet = CharacterSheet::new_level_one();
        let hurt = take_damage(&sheet, 99);
        assert!(!hurt.dead);
        let dead = take_damage(&hurt, 1);
        assert!(dead.dead);
        assert_eq!(dead.hp.current, 0);
    }

    #[test]
    fn heal_caps_at_max_and_never_revives() {
        let sheet = CharacterSheet::new_level_one();
        let hurt = take_damage(&sheet, 50);
        let healed = heal(&hurt, 500);
        assert_eq!(healed.hp.current, healed.hp.max);

        let dead = take_damage(&sheet, 1000);
        let still_dead = heal(&dead, 1000);
        assert!(still_dead.dead);
        assert_eq!(still_dead.hp.current, 0);
    }

    #[test]
    fn resource_spends_check_affordability() {
        let sheet = CharacterSheet::new_level_one();
        let spent = spend_mana(&sheet, 30).ok();
        assert_eq!(spent.map(|s| s.mana.current), Some(20));
        assert!(matches!(
            spend_mana(&sheet, 51),
            Err(RulesError::ResourceShort { resource: "mana", .. })
        ));

        let spent = spend_energy(&sheet, 100).ok();
        assert_eq!(spent.map(|s| s.energy.current), Some(0));
        assert!(matches!(
            spend_energy(&sheet, 101),
            Err(RulesError::ResourceShort { resource: "energy", .. })
        ));
    }

    #[test]
    fn respawn_restores_everything() {
        let sheet = CharacterSheet::new_level_one();
        let dead = take_damage(&sheet, 1000);
        let alive = respawn(&dead);
        assert!(!alive.dead);
        assert_eq!(alive.hp.current, alive.hp.max);
        assert_eq!(alive.mana.current, alive.mana.max);
    }

    #[test]
    fn dot_ticks_damage_and_expires() {
        let mut sheet = CharacterSheet::new_level_one();
        sheet.status_effects.push(StatusEffect {
            id: String::from("poisoned"),
            name: String::from("Poisoned"),
            modifiers: BTreeMap::new(),
            hp_per_turn: -5,
            remaining_turns: 2,
        });

        let tick1 = tick_status_effects(&sheet);
        assert_eq!(tick1.hp_delta, -5);
        assert_eq!(tick1.sheet.hp.current, 95);
        assert_eq!(tick1.sheet.status_effects.len(), 1);
        assert!(tick1.expired.is_empty());

        let tick2 = tick_status_effects(&tick1.sheet);
        assert_eq!(tick2.sheet.hp.current, 90);
        assert!(tick2.sheet.status_effects.is_empty());
        assert_eq!(tick2.expired.len(), 1);
    }

    #[test]
    fn inventory_merge_and_slot_limit() {
        let mut sheet = CharacterSheet::new_level_one();
        sheet.inventory.max_slots = 1;
        let sheet = add_item(&sheet, sword()).unwrap_or_else(|_| sheet.clone());
        // Same id merges instead of taking a new slot.
        let sheet = add_item(&sheet, sword()).unwrap_or_else(|_| sheet.clone());
        assert_eq!(sheet.inventory.quantity_of(&ItemId::from("iron-sword")), 2);

        let other = Item {
            id: ItemId::from("potion"),
            ..sword()
        };
        let result = add_item(&sheet, other);
        assert!(matches!(result, Err(RulesError::InventoryFull { .. })));
    }

    #[test]
    fn equip_displaces_previous_weapon() {
        let sheet = CharacterSheet::new_level_one();
        let sheet = add_item(&sheet, sword()).unwrap_or_else(|_| sheet.clone());
        let mut dagger = sword();
        dagger.id = ItemId::from("bone-dagger");
        dagger.kind = ItemKind::Weapon(WeaponType::Dagger);
        let sheet = add_item(&sheet, dagger).unwrap_or_else(|_| sheet.clone());

        let sheet = equip_item(&sheet, &ItemId::from("iron-sword"))
            .unwrap_or_else(|_| sheet.clone());
        assert_eq!(sheet.equipment.weapon_type(), Some(WeaponType::Sword));
        assert_eq!(sheet.inventory.quantity_of(&ItemId::from("iron-sword")), 0);

        let sheet = equip_item(&sheet, &ItemId::from("bone-dagger"))
            .unwrap_or_else(|_| sheet.clone());
        assert_eq!(sheet.equipment.weapon_type(), Some(WeaponType::Dagger));
        // The sword went back into the inventory.
        assert_eq!(sheet.inventory.quantity_of(&ItemId::from("iron-sword")), 1);
    }

    #[test]
    fn remove_more_than_held_fails() {
        let sheet = CharacterSheet::new_level_one();
        let sheet = add_item(&sheet, sword()).unwrap_or_else(|_| sheet.clone());
        let result = remove_item(&sheet, &ItemId::from("iron-sword"), 5);
        assert!(matches!(result, Err(RulesError::ItemNotAvailable(_))));
    }
}
