//! Skill fusion: consuming a set of owned skills to produce a new one.
//!
//! Recipes are keyed by their exact input set. A successful fusion removes
//! every input from the sheet and adds the result with
//! `AcquisitionSource::Fusion`. Near misses (one input missing, or input
//! levels too low) surface hint messages derived from tag compatibility so
//! the player can tell they are close.

use std::collections::{BTreeMap, BTreeSet};

use fateloom_types::character::CharacterSheet;
use fateloom_types::ids::{RecipeId, SkillId};
use fateloom_types::skill::{AcquisitionSource, FusionRecipe, Skill};

use crate::error::RulesError;
use crate::skills::catalog;

/// The static fusion recipe table.
///
/// Each row: recipe id, `(input skill, minimum level)` pairs, result
/// skill, and shared tags for the hint heuristics.
fn recipe_table() -> Vec<FusionRecipe> {
    let recipe = |id: &str, inputs: &[(&str, u32)], result: &str, tags: &[&str]| FusionRecipe {
        id: RecipeId::from(id),
        inputs: inputs
            .iter()
            .map(|&(skill, level)| (SkillId::from(skill), level))
            .collect(),
        result: SkillId::from(result),
        tags: tags.iter().map(|t| String::from(*t)).collect(),
    };
    vec![
        recipe(
            "fusion_flame_blade",
            &[("fireball", 5), ("power_strike", 5)],
            "flame_blade",
            &["flame", "blade"],
        ),
        recipe(
            "fusion_frost_nova",
            &[("ice_shard", 3), ("mana_bolt", 3)],
            "frost_nova",
            &["frost", "arcane"],
        ),
        recipe(
            "fusion_storm_step",
            &[("shadow_step", 4), ("fleet_foot", 4)],
            "storm_step",
            &["shadow", "swift"],
        ),
    ]
}

/// The result of a successful fusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionOutcome {
    /// The new snapshot: inputs removed, result added, recipe recorded.
    pub sheet: CharacterSheet,
    /// The produced skill.
    pub result: Skill,
    /// The matched recipe.
    pub recipe: RecipeId,
    /// The consumed input ids.
    pub consumed: BTreeSet<SkillId>,
    /// Whether this recipe had never been discovered in this game.
    pub was_new_discovery: bool,
}

/// Fuse an exact set of owned skills.
///
/// The input set must exactly match a recipe's input set and every input
/// must meet its minimum level.
///
/// # Errors
///
/// - [`RulesError::SkillNotOwned`] if any named input is missing from the
///   sheet
/// - [`RulesError::NoFusionMatch`] with a near-miss hint when no recipe
///   matches exactly
pub fn fuse_skills(
    sheet: &CharacterSheet,
    input_ids: &BTreeSet<SkillId>,
) -> Result<FusionOutcome, RulesError> {
    for id in input_ids {
        if !sheet.has_skill(id) {
            return Err(RulesError::SkillNotOwned(id.clone()));
        }
    }

    let recipes = recipe_table();
    let input_set: BTreeSet<&SkillId> = input_ids.iter().collect();

    let exact = recipes.iter().find(|recipe| {
        let recipe_set: BTreeSet<&SkillId> = recipe.inputs.keys().collect();
        recipe_set == input_set
    });

    let Some(recipe) = exact else {
        return Err(RulesError::NoFusionMatch {
            hint: near_miss_hint(sheet, input_ids, &recipes),
        });
    };

    // Exact set match; now verify levels.
    if let Some(shortfall) = level_shortfall(sheet, &recipe.inputs) {
        return Err(RulesError::NoFusionMatch {
            hint: Some(shortfall),
        });
    }

    let Some(mut result) = catalog::skill_definition(&recipe.result) else {
        // A recipe pointing outside the catalog is a content bug; treat it
        // as no match rather than crashing the turn.
        tracing::warn!(recipe = %recipe.id, result = %recipe.result, "fusion recipe references unknown result skill");
        return Err(RulesError::NoFusionMatch { hint: None });
    };
    result.source = AcquisitionSource::Fusion {
        inputs: input_ids.clone(),
        recipe: recipe.id.clone(),
    };

    let mut next = sheet.clone();
    next.skills.retain(|s| !input_ids.contains(&s.id));
    next.skills.push(result.clone());
    let was_new_discovery = next.known_recipes.insert(recipe.id.clone());

    tracing::info!(
        recipe = %recipe.id,
        result = %recipe.result,
        new_discovery = was_new_discovery,
        "skills fused"
    );

    Ok(FusionOutcome {
        sheet: next,
        result,
        recipe: recipe.id.clone(),
        consumed: input_ids.clone(),
        was_new_discovery,
    })
}

/// Check per-input minimum levels, describing the first shortfall.
fn level_shortfall(sheet: &CharacterSheet, inputs: &BTreeMap<SkillId, u32>) -> Option<String> {
    for (id, &minimum) in inputs {
        let level = sheet.skill(id).map_or(0, |s| s.level);
        if level < minimum {
            return Some(format!(
                "{id} is level {level}; the fusion needs it honed to {minimum}"
            ));
        }
    }
    None
}

/// Build a near-miss hint from tag compatibility: find the recipe sharing
/// the most inputs with the attempt and describe what is missing.
fn near_miss_hint(
    sheet: &CharacterSheet,
    input_ids: &BTreeSet<SkillId>,
    recipes: &[FusionRecipe],
) -> Option<String> {
    let mut best: Option<(usize, &FusionRecipe)> = None;
    for recipe in recipes {
        let overlap = recipe
            .inputs
            .keys()
            .filter(|id| input_ids.contains(*id))
            .count();
        if overlap == 0 {
            continue;
        }
        if best.is_none_or(|(b, _)| overlap > b) {
            best = Some((overlap, recipe));
        }
    }

    let (overlap, recipe) = best?;
    if overlap == recipe.inputs.len() {
        // Exact inputs but extra skills were offered alongside.
        return Some(String::from(
            "the resonance fades -- offer exactly the skills that belong together",
        ));
    }

    // Use tags to stay blind: reveal the flavour, not the skill id.
    let missing_tags: BTreeSet<&str> = recipe
        .inputs
        .keys()
        .filter(|id| !input_ids.contains(*id))
        .filter_map(|id| sheet.skill(id).map(|s| &s.fusion_tags))
        .flat_map(|tags| tags.iter().map(String::as_str))
        .collect();
    let flavour = if missing_tags.is_empty() {
        recipe
            .tags
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        missing_tags.into_iter().collect::<Vec<_>>().join(", ")
    };
    Some(format!(
        "something with an affinity for {flavour} is missing from the weave"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with_leveled(ids: &[(&str, u32)]) -> CharacterSheet {
        let mut sheet = CharacterSheet::new_level_one();
        for &(id, level) in ids {
            if let Some(mut skill) = catalog::skill_definition(&SkillId::from(id)) {
                skill.level = level;
                sheet.skills.push(skill);
            }
        }
        sheet
    }

    fn set(ids: &[&str]) -> BTreeSet<SkillId> {
        ids.iter().map(|&id| SkillId::from(id)).collect()
    }

    #[test]
    fn flame_blade_happy_path() {
        let sheet = sheet_with_leveled(&[("fireball", 5), ("power_strike", 5)]);
        let outcome = fuse_skills(&sheet, &set(&["fireball", "power_strike"])).ok();
        let Some(outcome) = outcome else {
            assert!(false, "fusion failed");
            return;
        };
        assert_eq!(outcome.result.id, SkillId::from("flame_blade"));
        assert_eq!(outcome.recipe, RecipeId::from("fusion_flame_blade"));
        assert!(outcome.was_new_discovery);
        assert!(outcome.sheet.has_skill(&SkillId::from("flame_blade")));
        assert!(!outcome.sheet.has_skill(&SkillId::from("fireball")));
        assert!(!outcome.sheet.has_skill(&SkillId::from("power_strike")));
        assert!(matches!(
            outcome.result.source,
            AcquisitionSource::Fusion { .. }
        ));
    }

    #[test]
    fn second_fusion_of_same_recipe_is_not_a_discovery() {
        let sheet = sheet_with_leveled(&[("fireball", 5), ("power_strike", 5)]);
        let first = fuse_skills(&sheet, &set(&["fireball", "power_strike"])).ok();
        let Some(first) = first else {
            assert!(false, "fusion failed");
            return;
        };
        // Re-acquire the inputs and fuse again.
        let sheet = sheet_with_leveled(&[("fireball", 5), ("power_strike", 5)]);
        let mut sheet = sheet;
        sheet.known_recipes = first.sheet.known_recipes;
        let second = fuse_skills(&sheet, &set(&["fireball", "power_strike"])).ok();
        assert_eq!(second.map(|o| o.was_new_discovery), Some(false));
    }

    #[test]
    fn low_level_inputs_hint_at_honing() {
        let sheet = sheet_with_leveled(&[("fireball", 2), ("power_strike", 5)]);
        let result = fuse_skills(&sheet, &set(&["fireball", "power_strike"]));
        match result {
            Err(RulesError::NoFusionMatch { hint: Some(hint) }) => {
                assert!(hint.contains("fireball"));
                assert!(hint.contains("honed"));
            }
            other => assert!(false, "expected level hint, got {other:?}"),
        }
    }

    #[test]
    fn missing_input_hints_by_tag() {
        let sheet = sheet_with_leveled(&[("fireball", 5)]);
        let result = fuse_skills(&sheet, &set(&["fireball"]));
        match result {
            Err(RulesError::NoFusionMatch { hint: Some(hint) }) => {
                assert!(hint.contains("missing"));
            }
            other => assert!(false, "expected near-miss hint, got {other:?}"),
        }
    }

    #[test]
    fn unowned_input_is_rejected() {
        let sheet = sheet_with_leveled(&[("fireball", 5)]);
        let result = fuse_skills(&sheet, &set(&["fireball", "power_strike"]));
        assert!(matches!(result, Err(RulesError::SkillNotOwned(_))));
    }

    #[test]
    fn unrelated_set_gets_no_hint() {
        let sheet = sheet_with_leveled(&[("iron_guard", 5), ("sneaky", 1)]);
        let result = fuse_skills(&sheet, &set(&["iron_guard"]));
        assert!(matches!(
            result,
            Err(RulesError::NoFusionMatch { hint: None })
        ));
    }
}
