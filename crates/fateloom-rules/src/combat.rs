//! Combat resolution: deterministic outcomes from a seeded PRNG.
//!
//! ## Combat flow
//!
//! 1. Derive an [`EnemyProfile`] for the named target, scaled to the
//!    player's level
//! 2. Compute the player's strike from effective strength with a bounded
//!    variance roll, mitigated by the enemy's defense
//! 3. If the strike defeats the enemy, award XP, roll gold and loot
//! 4. Otherwise apply the enemy's counter-strike through the player's
//!    mitigation
//!
//! All randomness comes from the caller-supplied [`StdRng`]; replaying the
//! same seed and inputs reproduces the same outcome exactly.

use rand::Rng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use fateloom_types::character::{CharacterSheet, Item, ItemKind};
use fateloom_types::enums::{DamageType, Difficulty};
use fateloom_types::ids::ItemId;

use crate::error::RulesError;
use crate::progression::{GainXpOutcome, gain_xp};
use crate::sheet::{effective_stats, take_damage};

// ---------------------------------------------------------------------------
// Mitigation formulas
// ---------------------------------------------------------------------------

/// Fraction of incoming damage absorbed by the defender, by damage type.
///
/// - Physical: `min(0.75, defense * 0.02)`
/// - Magical / elemental: `min(0.60, wisdom * 0.015)`
/// - Poison: `min(0.50, defense * 0.01)`
/// - True: `0` (ignores mitigation)
pub fn mitigation_fraction(damage_type: DamageType, defense: u32, wisdom: u32) -> Decimal {
    match damage_type {
        DamageType::Physical => {
            let frac = Decimal::from(defense)
                .checked_mul(Decimal::new(2, 2))
                .unwrap_or(Decimal::ZERO);
            frac.min(Decimal::new(75, 2))
        }
        DamageType::Magical | DamageType::Elemental => {
            let frac = Decimal::from(wisdom)
                .checked_mul(Decimal::new(15, 3))
                .unwrap_or(Decimal::ZERO);
            frac.min(Decimal::new(60, 2))
        }
        DamageType::Poison => {
            let frac = Decimal::from(defense)
                .checked_mul(Decimal::new(1, 2))
                .unwrap_or(Decimal::ZERO);
            frac.min(Decimal::new(50, 2))
        }
        DamageType::True => Decimal::ZERO,
    }
}

/// Apply mitigation to a raw damage value and floor to a whole number.
pub fn mitigated_damage(raw: Decimal, damage_type: DamageType, defense: u32, wisdom: u32) -> u32 {
    let fraction = mitigation_fraction(damage_type, defense, wisdom);
    let kept = Decimal::ONE.saturating_sub(fraction);
    raw.checked_mul(kept)
        .unwrap_or(Decimal::ZERO)
        .trunc()
        .to_u32()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Enemy profiles
// ---------------------------------------------------------------------------

/// One entry in an enemy's loot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LootEntry {
    /// The dropped item.
    pub item: Item,
    /// Drop chance in whole percent.
    pub chance_pct: u32,
}

/// A combat-ready description of the thing being fought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyProfile {
    /// Display name as the player referred to it.
    pub name: String,
    /// Enemy level, scaled to the player.
    pub level: u32,
    /// Hit points.
    pub hp: u32,
    /// Raw attack power.
    pub attack: u32,
    /// Physical mitigation stat.
    pub defense: u32,
    /// Magical mitigation stat.
    pub wisdom: u32,
    /// Base XP awarded on defeat, before level scaling.
    pub xp_reward: u64,
    /// Gold range rolled on defeat.
    pub gold_range: (u64, u64),
    /// Possible drops.
    pub loot: Vec<LootEntry>,
}

/// Base stat rows for well-known enemy names. Anything not listed falls
/// back to a generic profile scaled from the player's level.
const KNOWN_ENEMIES: &[(&str, u32, u32, u32, u32, u64, (u64, u64))] = &[
    // (name, hp, attack, defense, wisdom, xp, (gold_min, gold_max))
    ("goblin", 30, 8, 2, 1, 120, (2, 8)),
    ("cave rat", 15, 4, 0, 0, 40, (0, 2)),
    ("wolf", 40, 12, 3, 2, 150, (0, 3)),
    ("skeleton", 50, 10, 6, 0, 180, (3, 10)),
    ("bandit", 60, 14, 5, 4, 220, (10, 30)),
    ("slime", 25, 5, 1, 8, 80, (1, 4)),
];

/// Build the enemy profile for a named target at the player's level.
///
/// Known names use their table row; unknown names get a generic profile.
/// All values scale linearly with player level so early-game enemies stay
/// threatening in replays at higher levels.
pub fn enemy_profile_for(target: &str, player_level: u32) -> EnemyProfile {
    let normalized = target.trim().to_lowercase();
    let scale = |base: u32| -> u32 {
        base.saturating_add(base.saturating_mul(player_level.saturating_sub(1)) / 4)
    };

    let row = KNOWN_ENEMIES
        .iter()
        .find(|(name, ..)| normalized.contains(name));

    match row {
        Some(&(name, hp, attack, defense, wisdom, xp, (gold_min, gold_max))) => EnemyProfile {
            name: String::from(name),
            level: player_level,
            hp: scale(hp),
            attack: scale(attack),
            defense,
            wisdom,
            xp_reward: xp.saturating_add(u64::from(player_level.saturating_sub(1)).saturating_mul(10)),
            gold_range: (gold_min, gold_max.max(gold_min)),
            loot: default_loot_for(name),
        },
        None => EnemyProfile {
            name: if normalized.is_empty() {
                String::from("unknown foe")
            } else {
                normalized
            },
            level: player_level,
            hp: scale(35),
            attack: scale(10),
            defense: player_level / 10,
            wisdom: player_level / 10,
            xp_reward: 100_u64.saturating_add(u64::from(player_level).saturating_mul(10)),
            gold_range: (1, 10),
            loot: Vec::new(),
        },
    }
}

/// Small built-in loot tables for the known enemies.
fn default_loot_for(name: &str) -> Vec<LootEntry> {
    let material = |id: &str, display: &str, value: u64, chance_pct: u32| LootEntry {
        item: Item {
            id: ItemId::from(id),
            name: String::from(display),
            description: String::new(),
            kind: ItemKind::Material,
            stat_bonuses: std::collections::BTreeMap::new(),
            quantity: 1,
            value,
        },
        chance_pct,
    };
    match name {
        "goblin" => vec![material("goblin-ear", "Goblin Ear", 3, 50)],
        "wolf" => vec![material("wolf-pelt", "Wolf Pelt", 8, 40)],
        "skeleton" => vec![material("bone-shard", "Bone Shard", 5, 60)],
        "bandit" => vec![material("lockpick", "Worn Lockpick", 12, 25)],
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The outcome of one combat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatOutcome {
    /// The new character snapshot after damage, XP, and loot.
    pub sheet: CharacterSheet,
    /// What was fought.
    pub enemy: EnemyProfile,
    /// Damage dealt to the enemy.
    pub damage_dealt: u32,
    /// Damage taken in return (0 when the enemy was defeated outright).
    pub damage_taken: u32,
    /// Whether the enemy was defeated this exchange.
    pub defeated: bool,
    /// XP awarded (0 unless defeated).
    pub xp_gained: u64,
    /// Gold looted.
    pub gold: u64,
    /// Items dropped.
    pub loot: Vec<Item>,
    /// Player level after the exchange.
    pub resulting_level: u32,
    /// Grade promotion, if the XP crossed a boundary.
    pub promoted_to: Option<fateloom_types::enums::Grade>,
}

/// Difficulty multiplier applied to enemy counter-damage, in percent.
const fn enemy_damage_pct(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Story => 50,
        Difficulty::Balanced => 100,
        Difficulty::Brutal => 150,
    }
}

/// Hard cap on combat rounds; no encounter grinds forever.
const MAX_ROUNDS: u32 = 100;

/// Resolve a full combat encounter against a named target.
///
/// Rounds alternate player strike and enemy counter until the enemy's HP
/// empties, the player dies, or [`MAX_ROUNDS`] passes (a stalemate counts
/// as a survived, unrewarded exchange). Deterministic given the sheet,
/// target, difficulty, and RNG state: the orchestrator seeds the RNG from
/// the per-game seed and turn counter so saves replay identically.
///
/// # Errors
///
/// Returns [`RulesError::ArithmeticOverflow`] only if XP accounting
/// overflows, which the level cap makes unreachable in practice.
pub fn resolve_combat(
    sheet: &CharacterSheet,
    target: &str,
    difficulty: Difficulty,
    rng: &mut StdRng,
) -> Result<CombatOutcome, RulesError> {
    let enemy = enemy_profile_for(target, sheet.level);
    let stats = effective_stats(sheet);

    let mut enemy_hp = enemy.hp;
    let mut player_hp = sheet.hp.current;
    let mut damage_dealt: u32 = 0;
    let mut damage_taken: u32 = 0;
    let mut defeated = false;

    for _round in 0..MAX_ROUNDS {
        // Player strike: strength * 2 with a 90--110% variance roll.
        let variance: u32 = rng.random_range(90..=110);
        let raw = Decimal::from(stats.strength)
            .checked_mul(Decimal::TWO)
            .and_then(|d| d.checked_mul(Decimal::from(variance)))
            .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);
        let strike = mitigated_damage(raw, DamageType::Physical, enemy.defense, enemy.wisdom)
            .max(1);
        damage_dealt = damage_dealt.saturating_add(strike.min(enemy_hp));
        enemy_hp = enemy_hp.saturating_sub(strike);
        if enemy_hp == 0 {
            defeated = true;
            break;
        }

        // Counter-strike through the player's mitigation, scaled by
        // difficulty.
        let counter_raw = Decimal::from(enemy.attack)
            .checked_mul(Decimal::from(enemy_damage_pct(difficulty)))
            .and_then(|d| d.checked_div(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);
        let counter =
            mitigated_damage(counter_raw, DamageType::Physical, stats.defense, stats.wisdom)
                .max(1);
        damage_taken = damage_taken.saturating_add(counter.min(player_hp));
        player_hp = player_hp.saturating_sub(counter);
        if player_hp == 0 {
            break;
        }
    }

    let (xp_gained, gold, loot) = if defeated {
        let gold = if enemy.gold_range.1 > enemy.gold_range.0 {
            rng.random_range(enemy.gold_range.0..=enemy.gold_range.1)
        } else {
            enemy.gold_range.0
        };
        let loot: Vec<Item> = enemy
            .loot
            .iter()
            .filter(|entry| rng.random_range(0..100) < entry.chance_pct)
            .map(|entry| entry.item.clone())
            .collect();
        (enemy.xp_reward, gold, loot)
    } else {
        (0, 0, Vec::new())
    };

    let mut next = sheet.clone();
    if damage_taken > 0 {
        next = take_damage(&next, damage_taken);
    }
    next.inventory.gold = next.inventory.gold.saturating_add(gold);
    for item in &loot {
        if let Ok(with_item) = crate::sheet::add_item(&next, item.clone()) {
            next = with_item;
        }
        // A full inventory silently drops the loot; the orchestrator
        // reports what was actually added.
    }

    let GainXpOutcome {
        sheet: next,
        promoted_to,
        ..
    } = gain_xp(&next, xp_gained)?;

    let resulting_level = next.level;
    Ok(CombatOutcome {
        sheet: next,
        enemy,
        damage_dealt,
        damage_taken,
        defeated,
        xp_gained,
        gold,
        loot,
        resulting_level,
        promoted_to,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn mitigation_formulas_match_spec() {
        // Physical: defense 10 -> 0.20
        assert_eq!(
            mitigation_fraction(DamageType::Physical, 10, 0),
            Decimal::new(20, 2)
        );
        // Physical caps at 0.75
        assert_eq!(
            mitigation_fraction(DamageType::Physical, 100, 0),
            Decimal::new(75, 2)
        );
        // Magical: wisdom 20 -> 0.30
        assert_eq!(
            mitigation_fraction(DamageType::Magical, 0, 20),
            Decimal::new(300, 3)
        );
        // Magical caps at 0.60
        assert_eq!(
            mitigation_fraction(DamageType::Magical, 0, 100),
            Decimal::new(60, 2)
        );
        // Poison: defense 30 -> 0.30, caps at 0.50
        assert_eq!(
            mitigation_fraction(DamageType::Poison, 30, 0),
            Decimal::new(30, 2)
        );
        assert_eq!(
            mitigation_fraction(DamageType::Poison, 90, 0),
            Decimal::new(50, 2)
        );
        // True damage ignores everything.
        assert_eq!(mitigation_fraction(DamageType::True, 500, 500), Decimal::ZERO);
    }

    #[test]
    fn mitigated_damage_floors() {
        // 100 raw physical vs defense 10: 100 * 0.8 = 80
        assert_eq!(mitigated_damage(Decimal::from(100), DamageType::Physical, 10, 0), 80);
        // True damage passes through.
        assert_eq!(mitigated_damage(Decimal::from(100), DamageType::True, 99, 99), 100);
    }

    #[test]
    fn known_enemy_lookup_is_substring() {
        let goblin = enemy_profile_for("the sneering goblin chief", 1);
        assert_eq!(goblin.name, "goblin");
        let generic = enemy_profile_for("voidspawn horror", 1);
        assert_eq!(generic.name, "voidspawn horror");
    }

    #[test]
    fn same_seed_same_outcome() {
        let sheet = CharacterSheet::new_level_one();
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = resolve_combat(&sheet, "goblin", Difficulty::Balanced, &mut rng_a);
        let b = resolve_combat(&sheet, "goblin", Difficulty::Balanced, &mut rng_b);
        assert_eq!(a.ok(), b.ok());
    }

    #[test]
    fn defeating_a_cave_rat_awards_xp() {
        // Level 1, strength 10: strike is ~20 against a 15 HP cave rat.
        let sheet = CharacterSheet::new_level_one();
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = resolve_combat(&sheet, "cave rat", Difficulty::Balanced, &mut rng)
            .unwrap_or_else(|_| CombatOutcome {
                sheet: sheet.clone(),
                enemy: enemy_profile_for("cave rat", 1),
                damage_dealt: 0,
                damage_taken: 0,
                defeated: false,
                xp_gained: 0,
                gold: 0,
                loot: Vec::new(),
                resulting_level: 1,
                promoted_to: None,
            });
        assert!(outcome.defeated);
        assert_eq!(outcome.xp_gained, 40);
        assert_eq!(outcome.sheet.xp, 40);
        assert_eq!(outcome.damage_taken, 0);
    }

    #[test]
    fn long_fight_accumulates_counter_damage() {
        let sheet = CharacterSheet::new_level_one();
        let mut rng = StdRng::seed_from_u64(3);
        // Bandit has 60 HP at level 1: several rounds, so counters land.
        let outcome = resolve_combat(&sheet, "bandit", Difficulty::Balanced, &mut rng).ok();
        let outcome = match outcome {
            Some(o) => o,
            None => return,
        };
        assert!(outcome.defeated);
        assert!(outcome.damage_taken > 0);
        assert!(outcome.sheet.hp.current < outcome.sheet.hp.max);
    }

    #[test]
    fn fatal_encounter_sets_dead_flag() {
        let mut sheet = CharacterSheet::new_level_one();
        // Walk in nearly dead: the bandit's first counter is lethal.
        sheet.hp = sheet.hp.drained(95);
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = resolve_combat(&sheet, "bandit", Difficulty::Brutal, &mut rng).ok();
        let outcome = match outcome {
            Some(o) => o,
            None => return,
        };
        assert!(!outcome.defeated);
        assert_eq!(outcome.xp_gained, 0);
        assert!(outcome.sheet.dead);
        assert_eq!(outcome.sheet.hp.current, 0);
    }

    #[test]
    fn story_difficulty_softens_counters() {
        let sheet = CharacterSheet::new_level_one();
        let mut rng_story = StdRng::seed_from_u64(3);
        let mut rng_brutal = StdRng::seed_from_u64(3);
        let story = resolve_combat(&sheet, "bandit", Difficulty::Story, &mut rng_story).ok();
        let brutal = resolve_combat(&sheet, "bandit", Difficulty::Brutal, &mut rng_brutal).ok();
        if let (Some(story), Some(brutal)) = (story, brutal) {
            assert!(story.damage_taken < brutal.damage_taken);
        }
    }

    #[test]
    fn grade_stays_e_after_one_goblin() {
        let sheet = CharacterSheet::new_level_one();
        let mut rng = StdRng::seed_from_u64(11);
        let outcome = resolve_combat(&sheet, "goblin", Difficulty::Balanced, &mut rng).ok();
        if let Some(outcome) = outcome {
            assert_eq!(
                outcome.sheet.grade,
                fateloom_types::enums::Grade::from_level(outcome.sheet.level)
            );
            assert_eq!(outcome.sheet.grade, fateloom_types::enums::Grade::E);
        }
    }
}
