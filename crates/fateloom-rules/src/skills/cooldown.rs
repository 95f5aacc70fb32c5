//! Cooldown ticking and readiness checks.
//!
//! The orchestrator calls [`tick_skill_cooldowns`] once per combat turn;
//! each tick decrements every skill's current cooldown by one, flooring at
//! zero. After `base_cooldown` ticks a freshly used skill is ready again.

use fateloom_types::character::CharacterSheet;
use fateloom_types::ids::SkillId;

use crate::error::RulesError;

/// Decrement every skill's current cooldown by one turn, flooring at 0.
#[must_use]
pub fn tick_skill_cooldowns(sheet: &CharacterSheet) -> CharacterSheet {
    let mut next = sheet.clone();
    for skill in &mut next.skills {
        skill.current_cooldown = skill.current_cooldown.saturating_sub(1);
    }
    next
}

/// Check whether a skill is ready and affordable right now.
///
/// Ready means the cooldown has elapsed; affordable means every resource
/// cost can be paid, with the health cost required to leave at least 1 HP.
///
/// # Errors
///
/// Returns the specific [`RulesError`] that blocks use, so the caller can
/// surface it to the player verbatim.
pub fn can_use_skill(sheet: &CharacterSheet, skill_id: &SkillId) -> Result<(), RulesError> {
    let Some(skill) = sheet.skill(skill_id) else {
        return Err(RulesError::SkillNotOwned(skill_id.clone()));
    };
    if !skill.is_ready() {
        return Err(RulesError::SkillOnCooldown {
            skill: skill_id.clone(),
            remaining: skill.current_cooldown,
        });
    }
    if !sheet.mana.can_afford(skill.cost.mana) {
        return Err(RulesError::CannotAfford {
            skill: skill_id.clone(),
            reason: format!("mana {}/{}", sheet.mana.current, skill.cost.mana),
        });
    }
    if !sheet.energy.can_afford(skill.cost.energy) {
        return Err(RulesError::CannotAfford {
            skill: skill_id.clone(),
            reason: format!("energy {}/{}", sheet.energy.current, skill.cost.energy),
        });
    }
    // A health cost may never be the direct cause of death: at least 1 HP
    // must remain after paying it.
    if skill.cost.health > 0 && sheet.hp.current <= skill.cost.health {
        return Err(RulesError::CannotAfford {
            skill: skill_id.clone(),
            reason: format!(
                "health cost {} would leave no hit points ({} current)",
                skill.cost.health, sheet.hp.current
            ),
        });
    }
    Ok(())
}
