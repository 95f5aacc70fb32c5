//! Built-in skill definitions.
//!
//! These are the skills the engine itself can grant: insight unlocks,
//! fusion results, and evolution targets. LLM-generated skills (quest
//! rewards, shop stock) arrive through the generator agents instead and
//! never pass through this table.
//!
//! Sources on catalog skills are placeholders; the granting pathway
//! overwrites `source` with the actual provenance before attaching the
//! skill to a sheet.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

use fateloom_types::enums::{DamageType, SkillCategory, SkillRarity, Stat, TargetType};
use fateloom_types::ids::SkillId;
use fateloom_types::skill::{
    AcquisitionSource, EvolutionPath, EvolutionRequirements, Skill, SkillCost, SkillEffect,
};

/// Construct a catalog skill by id. Returns `None` for ids the engine does
/// not define (LLM-generated skills live outside this table).
pub fn skill_definition(id: &SkillId) -> Option<Skill> {
    let skill = match id.as_str() {
        "power_strike" => build(
            "power_strike",
            "Power Strike",
            "A focused heavy blow that rewards raw strength.",
            SkillRarity::Common,
            SkillCost {
                mana: 0,
                energy: 10,
                health: 0,
            },
            2,
            vec![SkillEffect::Damage {
                base: 20,
                damage_type: DamageType::Physical,
                scaling_stat: Stat::Strength,
                scaling_ratio: Decimal::new(5, 1),
            }],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["blade", "force"],
            vec![EvolutionPath {
                target: SkillId::from("crushing_blow"),
                name: String::from("Way of the Mountain"),
                requirements: EvolutionRequirements {
                    stat_minima: [(Stat::Strength, 30)].into_iter().collect(),
                    min_player_level: 20,
                    required_quests: BTreeSet::new(),
                },
            }],
        ),
        "crushing_blow" => build(
            "crushing_blow",
            "Crushing Blow",
            "A strike that shatters guard and bone alike.",
            SkillRarity::Rare,
            SkillCost {
                mana: 0,
                energy: 25,
                health: 0,
            },
            3,
            vec![SkillEffect::Damage {
                base: 55,
                damage_type: DamageType::Physical,
                scaling_stat: Stat::Strength,
                scaling_ratio: Decimal::ONE,
            }],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["blade", "force"],
            Vec::new(),
        ),
        "iron_guard" => build(
            "iron_guard",
            "Iron Guard",
            "A practiced stance that hardens the body.",
            SkillRarity::Common,
            SkillCost {
                mana: 0,
                energy: 8,
                health: 0,
            },
            3,
            vec![SkillEffect::StatModifier {
                stat: Stat::Defense,
                amount: 5,
                duration: 3,
            }],
            TargetType::Caster,
            SkillCategory::Defense,
            &["guard"],
            Vec::new(),
        ),
        "shadow_step" => build(
            "shadow_step",
            "Shadow Step",
            "Slip out of an enemy's line in a blink.",
            SkillRarity::Uncommon,
            SkillCost {
                mana: 5,
                energy: 10,
                health: 0,
            },
            2,
            vec![SkillEffect::StatModifier {
                stat: Stat::Dexterity,
                amount: 8,
                duration: 2,
            }],
            TargetType::Caster,
            SkillCategory::Movement,
            &["shadow", "swift"],
            Vec::new(),
        ),
        "mana_bolt" => build(
            "mana_bolt",
            "Mana Bolt",
            "Raw mana shaped into a dart.",
            SkillRarity::Common,
            SkillCost {
                mana: 8,
                energy: 0,
                health: 0,
            },
            1,
            vec![SkillEffect::Damage {
                base: 15,
                damage_type: DamageType::Magical,
                scaling_stat: Stat::Intelligence,
                scaling_ratio: Decimal::new(6, 1),
            }],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["arcane"],
            Vec::new(),
        ),
        "fireball" => build(
            "fireball",
            "Fireball",
            "A roaring sphere of flame.",
            SkillRarity::Uncommon,
            SkillCost {
                mana: 15,
                energy: 0,
                health: 0,
            },
            3,
            vec![
                SkillEffect::Damage {
                    base: 30,
                    damage_type: DamageType::Elemental,
                    scaling_stat: Stat::Intelligence,
                    scaling_ratio: Decimal::new(8, 1),
                },
                SkillEffect::DamageOverTime {
                    per_turn: 4,
                    damage_type: DamageType::Elemental,
                    duration: 2,
                },
            ],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["flame", "arcane"],
            Vec::new(),
        ),
        "ice_shard" => build(
            "ice_shard",
            "Ice Shard",
            "A frozen splinter hurled at speed.",
            SkillRarity::Common,
            SkillCost {
                mana: 10,
                energy: 0,
                health: 0,
            },
            2,
            vec![SkillEffect::Damage {
                base: 18,
                damage_type: DamageType::Elemental,
                scaling_stat: Stat::Intelligence,
                scaling_ratio: Decimal::new(5, 1),
            }],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["frost", "arcane"],
            Vec::new(),
        ),
        "iron_fist" => build(
            "iron_fist",
            "Iron Fist",
            "Knuckles conditioned into weapons.",
            SkillRarity::Common,
            SkillCost {
                mana: 0,
                energy: 8,
                health: 0,
            },
            1,
            vec![SkillEffect::Damage {
                base: 15,
                damage_type: DamageType::Physical,
                scaling_stat: Stat::Strength,
                scaling_ratio: Decimal::new(4, 1),
            }],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["fist", "force"],
            Vec::new(),
        ),
        "fleet_foot" => build(
            "fleet_foot",
            "Fleet Foot",
            "Footwork drilled until it becomes instinct.",
            SkillRarity::Common,
            SkillCost {
                mana: 0,
                energy: 5,
                health: 0,
            },
            2,
            vec![SkillEffect::StatModifier {
                stat: Stat::Dexterity,
                amount: 5,
                duration: 3,
            }],
            TargetType::Caster,
            SkillCategory::Movement,
            &["swift"],
            Vec::new(),
        ),
        "piercing_shot" => build(
            "piercing_shot",
            "Piercing Shot",
            "An arrow loosed through armor seams.",
            SkillRarity::Uncommon,
            SkillCost {
                mana: 0,
                energy: 12,
                health: 0,
            },
            2,
            vec![SkillEffect::Damage {
                base: 25,
                damage_type: DamageType::Physical,
                scaling_stat: Stat::Dexterity,
                scaling_ratio: Decimal::new(7, 1),
            }],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["bow", "swift"],
            Vec::new(),
        ),
        "flame_blade" => build(
            "flame_blade",
            "Flame Blade",
            "Steel wreathed in living fire.",
            SkillRarity::Rare,
            SkillCost {
                mana: 12,
                energy: 12,
                health: 0,
            },
            3,
            vec![
                SkillEffect::Damage {
                    base: 45,
                    damage_type: DamageType::Elemental,
                    scaling_stat: Stat::Strength,
                    scaling_ratio: Decimal::new(7, 1),
                },
                SkillEffect::DamageOverTime {
                    per_turn: 6,
                    damage_type: DamageType::Elemental,
                    duration: 2,
                },
            ],
            TargetType::SingleEnemy,
            SkillCategory::Offense,
            &["flame", "blade"],
            Vec::new(),
        ),
        "frost_nova" => build(
            "frost_nova",
            "Frost Nova",
            "A burst of cold that grips everything nearby.",
            SkillRarity::Rare,
            SkillCost {
                mana: 25,
                energy: 0,
                health: 0,
            },
            4,
            vec![
                SkillEffect::Damage {
                    base: 35,
                    damage_type: DamageType::Elemental,
                    scaling_stat: Stat::Intelligence,
                    scaling_ratio: Decimal::new(6, 1),
                },
                SkillEffect::StatModifier {
                    stat: Stat::Dexterity,
                    amount: -5,
                    duration: 2,
                },
            ],
            TargetType::AllEnemies,
            SkillCategory::Offense,
            &["frost", "arcane"],
            Vec::new(),
        ),
        "storm_step" => build(
            "storm_step",
            "Storm Step",
            "Movement so fast it leaves thunder behind.",
            SkillRarity::Rare,
            SkillCost {
                mana: 10,
                energy: 15,
                health: 0,
            },
            3,
            vec![
                SkillEffect::StatModifier {
                    stat: Stat::Dexterity,
                    amount: 12,
                    duration: 3,
                },
                SkillEffect::StatModifier {
                    stat: Stat::Strength,
                    amount: 4,
                    duration: 3,
                },
            ],
            TargetType::Caster,
            SkillCategory::Movement,
            &["shadow", "swift", "storm"],
            Vec::new(),
        ),
        _ => return None,
    };
    Some(skill)
}

/// Shared constructor keeping the catalog rows compact.
#[allow(clippy::too_many_arguments)]
fn build(
    id: &str,
    name: &str,
    description: &str,
    rarity: SkillRarity,
    cost: SkillCost,
    base_cooldown: u32,
    effects: Vec<SkillEffect>,
    target: TargetType,
    category: SkillCategory,
    tags: &[&str],
    evolution_paths: Vec<EvolutionPath>,
) -> Skill {
    Skill {
        id: SkillId::from(id),
        name: String::from(name),
        description: String::from(description),
        rarity,
        cost,
        base_cooldown,
        current_cooldown: 0,
        level: 1,
        max_level: 10,
        xp: 0,
        effects,
        passive: false,
        target,
        evolution_paths,
        fusion_tags: tags.iter().map(|t| String::from(*t)).collect(),
        source: AcquisitionSource::ClassGrant {
            class: String::from("catalog"),
        },
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ids_resolve() {
        for id in [
            "power_strike",
            "iron_guard",
            "shadow_step",
            "mana_bolt",
            "fireball",
            "flame_blade",
            "frost_nova",
        ] {
            let skill = skill_definition(&SkillId::from(id));
            assert!(skill.is_some(), "{id}");
            assert_eq!(skill.map(|s| s.id.into_inner()), Some(String::from(id)));
        }
    }

    #[test]
    fn unknown_id_is_none() {
        assert!(skill_definition(&SkillId::from("made_up")).is_none());
    }

    #[test]
    fn power_strike_has_evolution_path() {
        let skill = skill_definition(&SkillId::from("power_strike"));
        let paths = skill.map(|s| s.evolution_paths).unwrap_or_default();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths.first().map(|p| p.target.as_str().to_owned()),
            Some(String::from("crushing_blow"))
        );
    }
}
