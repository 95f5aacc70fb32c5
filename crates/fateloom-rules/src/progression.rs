//! Character progression: XP curves, level-ups, grade promotion, and
//! per-level stat growth.
//!
//! # Level-up formula
//!
//! Advancing from level N to N+1 costs `N * 100` XP, so the cumulative XP
//! required to hold level N is `sum(k * 100 for k in 1..N) = 50 * N * (N-1)`.
//! `gain_xp` accumulates into the career total and loops while the total
//! clears the next cumulative threshold, so one large award can produce
//! several level-ups.
//!
//! # Growth on level-up
//!
//! Each level gained adds +2 STR, +2 CON, +1 DEX/INT/WIS/CHA, grows the
//! resource maxima (+10 HP, +5 mana, +10 energy), and refills all pools.
//! When the new level crosses a grade boundary the character is promoted
//! and awarded that grade's unspent stat points.

use fateloom_types::character::CharacterSheet;
use fateloom_types::enums::{Grade, Stat};

use crate::error::RulesError;

/// Cumulative XP required to hold a level.
///
/// `cumulative_xp_for_level(1) == 0`: a fresh character holds level 1 with
/// no XP. Returns `None` on arithmetic overflow (unreachable for the
/// level-1000 cap, kept for totality).
pub fn cumulative_xp_for_level(level: u32) -> Option<u64> {
    let n = u64::from(level);
    // 50 * n * (n - 1), with n >= 1.
    n.checked_sub(1)?.checked_mul(n)?.checked_mul(50)
}

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_to_next_level(level: u32) -> u64 {
    u64::from(level).saturating_mul(100)
}

/// The result of one [`gain_xp`] application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GainXpOutcome {
    /// The new character snapshot.
    pub sheet: CharacterSheet,
    /// Levels gained by this award (0 if none).
    pub levels_gained: u32,
    /// The new grade, if the award crossed a grade boundary.
    pub promoted_to: Option<Grade>,
    /// Stat points awarded by grade promotion.
    pub stat_points_awarded: u32,
}

/// Accumulate XP and resolve any resulting level-ups and grade promotion.
///
/// Pure: returns a new snapshot, never mutates the input. The career XP
/// total is monotone (`outcome.sheet.xp == sheet.xp + amount`) and the
/// level never decreases.
///
/// # Errors
///
/// Returns [`RulesError::ArithmeticOverflow`] if the career XP total
/// overflows `u64`.
pub fn gain_xp(sheet: &CharacterSheet, amount: u64) -> Result<GainXpOutcome, RulesError> {
    let mut next = sheet.clone();
    next.xp = next
        .xp
        .checked_add(amount)
        .ok_or_else(|| RulesError::ArithmeticOverflow {
            context: String::from("career xp total"),
        })?;

    let starting_level = next.level;
    let starting_grade = next.grade;

    loop {
        let threshold = match cumulative_xp_for_level(next.level.saturating_add(1)) {
            Some(t) => t,
            None => break,
        };
        if next.xp < threshold {
            break;
        }
        next.level = next.level.saturating_add(1);
        apply_level_growth(&mut next);
    }

    let levels_gained = next.level.saturating_sub(starting_level);
    next.grade = Grade::from_level(next.level);

    let (promoted_to, stat_points_awarded) = if next.grade == starting_grade {
        (None, 0)
    } else {
        let award = next.grade.stat_point_award();
        next.unspent_stat_points = next.unspent_stat_points.saturating_add(award);
        (Some(next.grade), award)
    };

    if levels_gained > 0 {
        tracing::debug!(
            from = starting_level,
            to = next.level,
            promoted = ?promoted_to,
            "level up"
        );
    }

    Ok(GainXpOutcome {
        sheet: next,
        levels_gained,
        promoted_to,
        stat_points_awarded,
    })
}

/// Apply the fixed per-level growth deltas to a sheet in place.
fn apply_level_growth(sheet: &mut CharacterSheet) {
    sheet.base_stats = sheet
        .base_stats
        .raised(Stat::Strength, 2)
        .raised(Stat::Constitution, 2)
        .raised(Stat::Dexterity, 1)
        .raised(Stat::Intelligence, 1)
        .raised(Stat::Wisdom, 1)
        .raised(Stat::Charisma, 1);
    sheet.hp = sheet.hp.grown(10);
    sheet.mana = sheet.mana.grown(5);
    sheet.energy = sheet.energy.grown(10);
    // A level-up always leaves the character alive and refreshed.
    sheet.dead = false;
}
