//! Skill execution: validation, effect application, XP award, cooldown
//! start.
//!
//! # Scaling
//!
//! Every numeric effect scales the same way:
//!
//! ```text
//! scaled = (base * rarity_power + scaling_stat * ratio) * (1 + 0.1 * skill_level)
//! ```
//!
//! Damage is then reduced by the target's type-specific mitigation
//! (see [`crate::combat::mitigation_fraction`]). Self-effects (heals,
//! buffs, shields, regeneration, resource restoration) attach to the
//! caster's sheet; target-bound damage and damage-over-time are reported
//! in the outcome for the orchestrator to narrate and apply.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use fateloom_types::character::{CharacterSheet, StatusEffect};
use fateloom_types::ids::SkillId;
use fateloom_types::skill::SkillEffect;

use crate::combat::mitigated_damage;
use crate::error::RulesError;
use crate::sheet::effective_stats;
use crate::skills::cooldown::can_use_skill;

/// Flat XP awarded per skill use before the rarity multiplier.
const XP_PER_USE: u64 = 10;

/// A damage-over-time application the orchestrator should track against
/// the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotApplication {
    /// Mitigated damage per turn.
    pub per_turn: u32,
    /// Number of turns.
    pub duration: u32,
}

/// The outcome of executing one skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// The caster's new snapshot: costs paid, self-effects attached,
    /// cooldown started, XP awarded.
    pub sheet: CharacterSheet,
    /// Total direct damage to the target after mitigation.
    pub damage_to_target: u32,
    /// Damage-over-time applications for the target.
    pub dots: Vec<DotApplication>,
    /// Healing applied to the caster.
    pub healing: u32,
    /// Skill XP awarded.
    pub xp_awarded: u64,
    /// The skill's level after the XP award, with a flag for level-up.
    pub skill_level: u32,
    /// Whether the skill levelled up from this use.
    pub leveled_up: bool,
}

/// Execute an owned skill against a target with the given mitigation
/// stats.
///
/// Validates readiness and affordability, pays costs, applies every
/// effect in declaration order, awards XP, and starts the cooldown.
///
/// # Errors
///
/// Returns the blocking [`RulesError`] without touching the sheet if the
/// skill is missing, passive, cooling down, or unaffordable.
pub fn execute_skill(
    sheet: &CharacterSheet,
    skill_id: &SkillId,
    target_defense: u32,
    target_wisdom: u32,
) -> Result<ExecutionOutcome, RulesError> {
    can_use_skill(sheet, skill_id)?;
    let Some(skill) = sheet.skill(skill_id).cloned() else {
        return Err(RulesError::SkillNotOwned(skill_id.clone()));
    };
    if skill.passive {
        return Err(RulesError::CannotAfford {
            skill: skill_id.clone(),
            reason: String::from("passive skills cannot be executed"),
        });
    }

    let mut next = sheet.clone();
    next.mana = next.mana.drained(skill.cost.mana);
    next.energy = next.energy.drained(skill.cost.energy);
    next.hp = next.hp.drained(skill.cost.health);

    let stats = effective_stats(sheet);
    let level_multiplier = level_multiplier(skill.level);
    let power = skill.rarity.power_multiplier();

    let mut damage_to_target: u32 = 0;
    let mut dots = Vec::new();
    let mut healing: u32 = 0;

    for effect in &skill.effects {
        match effect {
            SkillEffect::Damage {
                base,
                damage_type,
                scaling_stat,
                scaling_ratio,
            } => {
                let raw = scaled_magnitude(
                    *base,
                    power,
                    stats.get(*scaling_stat),
                    *scaling_ratio,
                    level_multiplier,
                );
                let dealt = mitigated_damage(raw, *damage_type, target_defense, target_wisdom);
                damage_to_target = damage_to_target.saturating_add(dealt);
            }
            SkillEffect::Heal {
                base,
                scaling_stat,
                scaling_ratio,
            } => {
                let raw = scaled_magnitude(
                    *base,
                    power,
                    stats.get(*scaling_stat),
                    *scaling_ratio,
                    level_multiplier,
                );
                let amount = raw.trunc().to_u32().unwrap_or(0);
                next.hp = next.hp.restored(amount);
                healing = healing.saturating_add(amount);
            }
            SkillEffect::StatModifier {
                stat,
                amount,
                duration,
            } => {
                let scaled = scale_signed(*amount, level_multiplier);
                next.status_effects.push(StatusEffect {
                    id: format!("{}:{:?}", skill.id, stat),
                    name: skill.name.clone(),
                    modifiers: [(*stat, scaled)].into_iter().collect(),
                    hp_per_turn: 0,
                    remaining_turns: (*duration).max(1),
                });
            }
            SkillEffect::DamageOverTime {
                per_turn,
                damage_type,
                duration,
            } => {
                let raw = scaled_magnitude(
                    *per_turn,
                    power,
                    0,
                    Decimal::ZERO,
                    level_multiplier,
                );
                let tick = mitigated_damage(raw, *damage_type, target_defense, target_wisdom);
                dots.push(DotApplication {
                    per_turn: tick,
                    duration: (*duration).max(1),
                });
            }
            SkillEffect::HealOverTime { per_turn, duration } => {
                let raw = scaled_magnitude(*per_turn, power, 0, Decimal::ZERO, level_multiplier);
                let tick = raw.trunc().to_i64().unwrap_or(0);
                next.status_effects.push(StatusEffect {
                    id: format!("{}:regen", skill.id),
                    name: skill.name.clone(),
                    modifiers: std::collections::BTreeMap::new(),
                    hp_per_turn: tick,
                    remaining_turns: (*duration).max(1),
                });
            }
            SkillEffect::Shield { amount, duration } => {
                // Shields manifest as temporary defense while active.
                let scaled = scale_signed(
                    i32::try_from(*amount).unwrap_or(i32::MAX),
                    level_multiplier,
                );
                next.status_effects.push(StatusEffect {
                    id: format!("{}:shield", skill.id),
                    name: skill.name.clone(),
                    modifiers: [(fateloom_types::enums::Stat::Defense, scaled)]
                        .into_iter()
                        .collect(),
                    hp_per_turn: 0,
                    remaining_turns: (*duration).max(1),
                });
            }
            SkillEffect::PassiveStat { .. } => {
                // Passive aggregates apply in effective_stats, not here.
            }
            SkillEffect::RestoreResource { mana, amount } => {
                let raw = scaled_magnitude(*amount, power, 0, Decimal::ZERO, level_multiplier);
                let restored = raw.trunc().to_u32().unwrap_or(0);
                if *mana {
                    next.mana = next.mana.restored(restored);
                } else {
                    next.energy = next.energy.restored(restored);
                }
            }
        }
    }

    // Award XP and resolve skill level-ups, then start the cooldown.
    let xp_awarded = XP_PER_USE.saturating_mul(skill.rarity.xp_multiplier());
    let mut skill_level = skill.level;
    let mut leveled_up = false;
    if let Some(owned) = next.skills.iter_mut().find(|s| s.id == skill.id) {
        if !owned.at_max_level() {
            owned.xp = owned.xp.saturating_add(xp_awarded);
            while let Some(threshold) = owned.xp_to_next_level() {
                if owned.xp < threshold {
                    break;
                }
                owned.xp = owned.xp.saturating_sub(threshold);
                owned.level = owned.level.saturating_add(1);
                leveled_up = true;
                if owned.at_max_level() {
                    // XP resets at the cap; evolution takes over from here.
                    owned.xp = 0;
                    break;
                }
            }
        }
        owned.current_cooldown = owned.base_cooldown;
        skill_level = owned.level;
    }

    Ok(ExecutionOutcome {
        sheet: next,
        damage_to_target,
        dots,
        healing,
        xp_awarded,
        skill_level,
        leveled_up,
    })
}

/// `1 + 0.1 * skill_level` as a [`Decimal`].
fn level_multiplier(level: u32) -> Decimal {
    Decimal::ONE.saturating_add(
        Decimal::from(level)
            .checked_mul(Decimal::new(1, 1))
            .unwrap_or(Decimal::ZERO),
    )
}

/// `(base * power + stat * ratio) * level_multiplier`.
fn scaled_magnitude(
    base: u32,
    power: Decimal,
    stat: u32,
    ratio: Decimal,
    level_multiplier: Decimal,
) -> Decimal {
    let from_base = Decimal::from(base).checked_mul(power).unwrap_or(Decimal::ZERO);
    let from_stat = Decimal::from(stat).checked_mul(ratio).unwrap_or(Decimal::ZERO);
    from_base
        .saturating_add(from_stat)
        .checked_mul(level_multiplier)
        .unwrap_or(Decimal::ZERO)
}

/// Scale a signed magnitude by the level multiplier, truncating toward
/// zero.
fn scale_signed(amount: i32, level_multiplier: Decimal) -> i32 {
    Decimal::from(amount)
        .checked_mul(level_multiplier)
        .unwrap_or(Decimal::ZERO)
        .trunc()
        .to_i32()
        .unwrap_or(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::catalog;

    fn sheet_with(id: &str) -> CharacterSheet {
        let mut sheet = CharacterSheet::new_level_one();
        if let Some(skill) = catalog::skill_definition(&SkillId::from(id)) {
            sheet.skills.push(skill);
        }
        sheet
    }

    #[test]
    fn power_strike_damage_formula() {
        // Level-1 common skill, str 10: (20 * 1.0 + 10 * 0.5) * 1.1 = 27.5
        // Against an unarmored target: floor(27.5) = 27.
        let sheet = sheet_with("power_strike");
        let outcome = execute_skill(&sheet, &SkillId::from("power_strike"), 0, 0).ok();
        assert_eq!(outcome.as_ref().map(|o| o.damage_to_target), Some(27));
    }

    #[test]
    fn damage_respects_target_defense() {
        // Same raw 27.5; defense 10 -> 20% mitigation: 27.5 * 0.8 = 22.
        let sheet = sheet_with("power_strike");
        let outcome = execute_skill(&sheet, &SkillId::from("power_strike"), 10, 0).ok();
        assert_eq!(outcome.as_ref().map(|o| o.damage_to_target), Some(22));
    }

    #[test]
    fn execution_pays_costs_and_starts_cooldown() {
        let sheet = sheet_with("power_strike");
        let outcome = execute_skill(&sheet, &SkillId::from("power_strike"), 0, 0).ok();
        let Some(outcome) = outcome else {
            assert!(false, "execution failed");
            return;
        };
        assert_eq!(outcome.sheet.energy.current, sheet.energy.current - 10);
        assert_eq!(
            outcome
                .sheet
                .skill(&SkillId::from("power_strike"))
                .map(|s| s.current_cooldown),
            Some(2)
        );
        // Immediately using it again is blocked by the cooldown.
        let again = execute_skill(&outcome.sheet, &SkillId::from("power_strike"), 0, 0);
        assert!(matches!(again, Err(RulesError::SkillOnCooldown { .. })));
    }

    #[test]
    fn xp_award_follows_rarity() {
        let sheet = sheet_with("power_strike");
        let outcome = execute_skill(&sheet, &SkillId::from("power_strike"), 0, 0).ok();
        // Common rarity: 10 * 1.
        assert_eq!(outcome.as_ref().map(|o| o.xp_awarded), Some(10));

        let sheet = sheet_with("fireball");
        let outcome = execute_skill(&sheet, &SkillId::from("fireball"), 0, 0).ok();
        // Uncommon rarity: 10 * 2.
        assert_eq!(outcome.as_ref().map(|o| o.xp_awarded), Some(20));
    }

    #[test]
    fn skill_levels_up_after_enough_uses() {
        // Common skill at level 1 needs 50 XP; each use gives 10.
        let mut sheet = sheet_with("power_strike");
        let mut leveled = false;
        for _use in 0..5 {
            if let Some(skill) = sheet.skills.first_mut() {
                skill.current_cooldown = 0;
            }
            sheet.energy = sheet.energy.restored(1000);
            let outcome = execute_skill(&sheet, &SkillId::from("power_strike"), 0, 0).ok();
            let Some(outcome) = outcome else {
                assert!(false, "execution failed");
                return;
            };
            leveled = outcome.leveled_up;
            sheet = outcome.sheet;
        }
        assert!(leveled);
        assert_eq!(
            sheet.skill(&SkillId::from("power_strike")).map(|s| s.level),
            Some(2)
        );
        assert_eq!(sheet.skill(&SkillId::from("power_strike")).map(|s| s.xp), Some(0));
    }

    #[test]
    fn buff_attaches_status_effect() {
        let sheet = sheet_with("iron_guard");
        let outcome = execute_skill(&sheet, &SkillId::from("iron_guard"), 0, 0).ok();
        let Some(outcome) = outcome else {
            assert!(false, "execution failed");
            return;
        };
        assert_eq!(outcome.sheet.status_effects.len(), 1);
        let effect = outcome.sheet.status_effects.first();
        // +5 defense scaled by 1.1 = 5.5, truncated to 5.
        assert_eq!(
            effect.and_then(|e| e.modifiers.get(&fateloom_types::enums::Stat::Defense)),
            Some(&5)
        );
        assert_eq!(effect.map(|e| e.remaining_turns), Some(3));
    }

    #[test]
    fn fireball_reports_dot_for_target() {
        let sheet = sheet_with("fireball");
        let outcome = execute_skill(&sheet, &SkillId::from("fireball"), 0, 0).ok();
        let Some(outcome) = outcome else {
            assert!(false, "execution failed");
            return;
        };
        assert_eq!(outcome.dots.len(), 1);
        assert_eq!(outcome.dots.first().map(|d| d.duration), Some(2));
        // The DoT targets the enemy, not the caster.
        assert!(outcome.sheet.status_effects.is_empty());
    }
}
