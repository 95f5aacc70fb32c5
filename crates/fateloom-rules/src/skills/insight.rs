//! Action-insight learning: repeated free-text actions crystallise into
//! skills.
//!
//! A classifier maps natural-language verbs plus context (equipped weapon,
//! location tags, combat flag) to action tokens (`"slash"` with a sword
//! equipped becomes `sword_slash`). Each incremented token is checked
//! against a static threshold table: crossing the partial threshold
//! reveals a blind-named hint, crossing the full threshold grants the
//! skill. A skill is granted at most once across all pathways, and
//! progress updates fire at 25% boundaries of the full threshold.
//!
//! Threshold rows are evaluated in table order; the first matching row
//! that crosses its full threshold wins, and rows resolving to an
//! already-owned skill are skipped.

use std::collections::BTreeSet;

use fateloom_types::character::{CharacterSheet, PartialSkill};
use fateloom_types::enums::WeaponType;
use fateloom_types::ids::SkillId;
use fateloom_types::skill::{AcquisitionSource, Skill};

use crate::skills::catalog;

// ---------------------------------------------------------------------------
// Context and classification
// ---------------------------------------------------------------------------

/// The situational context an action happened in.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Currently equipped weapon family.
    pub weapon: Option<WeaponType>,
    /// Tags of the current location.
    pub location_tags: BTreeSet<String>,
    /// Whether the action happened mid-combat.
    pub in_combat: bool,
}

/// One classifier rule: any of the verbs, optional weapon and location
/// requirements, and the token produced.
struct ClassifierRule {
    verbs: &'static [&'static str],
    weapon: Option<WeaponType>,
    /// Location tag that must be present (`"water"` for swimming).
    requires_tag: Option<&'static str>,
    /// Rules that cannot fire mid-combat (meditation needs calm).
    blocked_in_combat: bool,
    token: &'static str,
}

/// The verb-to-token classification table. Order matters: the first
/// matching rule per verb family wins.
const CLASSIFIER_RULES: &[ClassifierRule] = &[
    ClassifierRule {
        verbs: &["slash", "cut", "swing", "slice"],
        weapon: Some(WeaponType::Sword),
        requires_tag: None,
        blocked_in_combat: false,
        token: "sword_slash",
    },
    ClassifierRule {
        verbs: &["stab", "thrust", "lunge"],
        weapon: Some(WeaponType::Dagger),
        requires_tag: None,
        blocked_in_combat: false,
        token: "dagger_thrust",
    },
    ClassifierRule {
        verbs: &["shoot", "loose", "aim", "fire"],
        weapon: Some(WeaponType::Bow),
        requires_tag: None,
        blocked_in_combat: false,
        token: "bow_shot",
    },
    ClassifierRule {
        verbs: &["punch", "strike", "jab"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: false,
        token: "fist_strike",
    },
    ClassifierRule {
        verbs: &["block", "parry", "guard", "brace"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: false,
        token: "guard",
    },
    ClassifierRule {
        verbs: &["dodge", "roll", "evade", "sidestep"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: false,
        token: "evade",
    },
    ClassifierRule {
        verbs: &["cast", "channel", "focus", "weave"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: false,
        token: "channel_mana",
    },
    ClassifierRule {
        verbs: &["sprint", "run", "dash"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: false,
        token: "sprint",
    },
    ClassifierRule {
        verbs: &["sneak", "creep", "skulk"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: false,
        token: "sneak",
    },
    ClassifierRule {
        verbs: &["meditate", "breathe", "center"],
        weapon: None,
        requires_tag: None,
        blocked_in_combat: true,
        token: "meditate",
    },
    ClassifierRule {
        verbs: &["swim", "dive", "wade"],
        weapon: None,
        requires_tag: Some("water"),
        blocked_in_combat: false,
        token: "swim",
    },
];

/// Classify a free-text action into zero or more action tokens.
///
/// Weapon-gated rules only fire when the matching weapon family is
/// equipped; bare-handed rules fire regardless. A single input can
/// produce several tokens (`"dodge and punch"`).
pub fn classify_action(input: &str, context: &ActionContext) -> Vec<String> {
    let lowered = input.to_lowercase();
    let mut tokens = Vec::new();
    for rule in CLASSIFIER_RULES {
        if !rule.verbs.iter().any(|verb| lowered.contains(verb)) {
            continue;
        }
        if let Some(required) = rule.weapon
            && context.weapon != Some(required)
        {
            continue;
        }
        if let Some(tag) = rule.requires_tag
            && !context.location_tags.contains(tag)
        {
            continue;
        }
        if rule.blocked_in_combat && context.in_combat {
            continue;
        }
        if !tokens.contains(&String::from(rule.token)) {
            tokens.push(String::from(rule.token));
        }
    }
    tokens
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// One threshold row: an action token, the skill it unlocks, and the
/// repetition counts for partial reveal and full grant.
struct InsightThreshold {
    action_type: &'static str,
    skill_id: &'static str,
    hint_name: &'static str,
    partial_unlock: u64,
    full_unlock: u64,
}

/// The static unlock table, in evaluation order.
const INSIGHT_THRESHOLDS: &[InsightThreshold] = &[
    InsightThreshold {
        action_type: "sword_slash",
        skill_id: "power_strike",
        hint_name: "??? (something heavy behind the blade)",
        partial_unlock: 25,
        full_unlock: 50,
    },
    InsightThreshold {
        action_type: "guard",
        skill_id: "iron_guard",
        hint_name: "??? (a stance taking shape)",
        partial_unlock: 15,
        full_unlock: 30,
    },
    InsightThreshold {
        action_type: "evade",
        skill_id: "shadow_step",
        hint_name: "??? (the space between footsteps)",
        partial_unlock: 20,
        full_unlock: 40,
    },
    InsightThreshold {
        action_type: "channel_mana",
        skill_id: "mana_bolt",
        hint_name: "??? (a spark that wants a shape)",
        partial_unlock: 15,
        full_unlock: 30,
    },
    InsightThreshold {
        action_type: "fist_strike",
        skill_id: "iron_fist",
        hint_name: "??? (knuckles remembering)",
        partial_unlock: 25,
        full_unlock: 50,
    },
    InsightThreshold {
        action_type: "sprint",
        skill_id: "fleet_foot",
        hint_name: "??? (the ground giving way)",
        partial_unlock: 25,
        full_unlock: 50,
    },
    InsightThreshold {
        action_type: "bow_shot",
        skill_id: "piercing_shot",
        hint_name: "??? (a gap in the armor)",
        partial_unlock: 20,
        full_unlock: 45,
    },
];

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// A progress notification fired at a 25% boundary of a full threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightProgress {
    /// The action token.
    pub action_type: String,
    /// Hint text for the player.
    pub hint: String,
    /// Which boundary was crossed (25, 50, 75, or 100).
    pub percent: u8,
}

/// The result of tracking one player action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightOutcome {
    /// The new snapshot with updated counts, partials, and grants.
    pub sheet: CharacterSheet,
    /// Tokens incremented by this action.
    pub tokens: Vec<String>,
    /// Partial skills revealed by this action.
    pub newly_partial: Vec<PartialSkill>,
    /// Skills granted by this action.
    pub newly_granted: Vec<Skill>,
    /// Progress boundaries crossed by this action.
    pub progress: Vec<InsightProgress>,
}

/// Track one free-text action: classify it, bump token counts, and apply
/// the threshold table.
///
/// Counts are monotone, a skill is granted at most once (the tracker's
/// `granted` set and the sheet's skill list are both consulted), and
/// progress events fire exactly when a 25% boundary of the full threshold
/// is crossed.
#[must_use]
pub fn track_action(
    sheet: &CharacterSheet,
    input: &str,
    context: &ActionContext,
) -> InsightOutcome {
    let tokens = classify_action(input, context);
    let mut next = sheet.clone();
    let mut newly_partial = Vec::new();
    let mut newly_granted = Vec::new();
    let mut progress = Vec::new();

    for token in &tokens {
        let before = next.insight.count(token);
        let after = before.saturating_add(1);
        next.insight.counts.insert(token.clone(), after);

        for row in INSIGHT_THRESHOLDS {
            if row.action_type != token.as_str() {
                continue;
            }
            let skill_id = SkillId::from(row.skill_id);

            // At most once across all pathways.
            if next.insight.granted.contains(&skill_id) || next.has_skill(&skill_id) {
                continue;
            }

            // Partial reveal.
            if before < row.partial_unlock && after >= row.partial_unlock {
                let partial = PartialSkill {
                    skill_id: skill_id.clone(),
                    action_type: token.clone(),
                    hint_name: String::from(row.hint_name),
                    reps_seen: after,
                };
                next.insight.partials.push(partial.clone());
                newly_partial.push(partial);
            }

            // 25% boundary progress.
            if let Some(percent) = crossed_quarter(before, after, row.full_unlock) {
                progress.push(InsightProgress {
                    action_type: token.clone(),
                    hint: String::from(row.hint_name),
                    percent,
                });
            }

            // Full grant.
            if after >= row.full_unlock {
                if let Some(mut skill) = catalog::skill_definition(&skill_id) {
                    skill.source = AcquisitionSource::ActionInsight {
                        action_type: token.clone(),
                        repetitions: after,
                    };
                    next.insight.granted.insert(skill_id.clone());
                    next.insight.partials.retain(|p| p.skill_id != skill_id);
                    next.skills.push(skill.clone());
                    newly_granted.push(skill);
                } else {
                    tracing::warn!(
                        skill = %skill_id,
                        "insight threshold references a skill missing from the catalog"
                    );
                }
            }
        }
    }

    InsightOutcome {
        sheet: next,
        tokens,
        newly_partial,
        newly_granted,
        progress,
    }
}

/// If moving from `before` to `after` crossed a 25% boundary of `full`,
/// return the boundary percentage.
fn crossed_quarter(before: u64, after: u64, full: u64) -> Option<u8> {
    if full == 0 {
        return None;
    }
    for (quarter, percent) in [(1_u64, 25_u8), (2, 50), (3, 75), (4, 100)] {
        let boundary = full.saturating_mul(quarter).checked_div(4)?;
        if boundary > 0 && before < boundary && after >= boundary {
            return Some(percent);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use fateloom_types::character::{Item, ItemKind};
    use fateloom_types::ids::ItemId;

    fn sword_context() -> ActionContext {
        ActionContext {
            weapon: Some(WeaponType::Sword),
            location_tags: BTreeSet::new(),
            in_combat: true,
        }
    }

    fn sheet_with_sword() -> CharacterSheet {
        let mut sheet = CharacterSheet::new_level_one();
        sheet.equipment.weapon = Some(Item {
            id: ItemId::from("iron-sword"),
            name: String::from("Iron Sword"),
            description: String::new(),
            kind: ItemKind::Weapon(WeaponType::Sword),
            stat_bonuses: std::collections::BTreeMap::new(),
            quantity: 1,
            value: 50,
        });
        sheet
    }

    #[test]
    fn slash_with_sword_classifies_as_sword_slash() {
        let tokens = classify_action("I slash at the goblin", &sword_context());
        assert_eq!(tokens, vec![String::from("sword_slash")]);
    }

    #[test]
    fn slash_without_sword_does_not_classify() {
        let context = ActionContext::default();
        let tokens = classify_action("slash wildly", &context);
        assert!(tokens.is_empty());
    }

    #[test]
    fn compound_input_produces_multiple_tokens() {
        let tokens = classify_action("dodge the blow and slash back", &sword_context());
        assert!(tokens.contains(&String::from("evade")));
        assert!(tokens.contains(&String::from("sword_slash")));
    }

    #[test]
    fn fifty_slashes_grant_power_strike_exactly_once() {
        let mut sheet = sheet_with_sword();
        let context = sword_context();
        let mut grant_count = 0;
        let mut grant_reps = 0;

        for _rep in 0..60 {
            let outcome = track_action(&sheet, "slash", &context);
            for skill in &outcome.newly_granted {
                if skill.id == SkillId::from("power_strike") {
                    grant_count += 1;
                    if let fateloom_types::skill::AcquisitionSource::ActionInsight {
                        repetitions,
                        ..
                    } = &skill.source
                    {
                        grant_reps = *repetitions;
                    }
                }
            }
            sheet = outcome.sheet;
        }

        assert_eq!(grant_count, 1);
        assert_eq!(grant_reps, 50);
        let owned = sheet
            .skills
            .iter()
            .filter(|s| s.id == SkillId::from("power_strike"))
            .count();
        assert_eq!(owned, 1);
        assert_eq!(sheet.insight.count("sword_slash"), 60);
    }

    #[test]
    fn partial_reveals_at_partial_threshold() {
        let mut sheet = sheet_with_sword();
        let context = sword_context();
        let mut revealed_at = None;
        for rep in 1..=30_u64 {
            let outcome = track_action(&sheet, "slash", &context);
            if !outcome.newly_partial.is_empty() && revealed_at.is_none() {
                revealed_at = Some(rep);
            }
            sheet = outcome.sheet;
        }
        assert_eq!(revealed_at, Some(25));
        assert_eq!(sheet.insight.partials.len(), 1);
    }

    #[test]
    fn progress_fires_at_quarter_boundaries() {
        let mut sheet = sheet_with_sword();
        let context = sword_context();
        let mut boundaries = Vec::new();
        for _rep in 0..50 {
            let outcome = track_action(&sheet, "slash", &context);
            for p in &outcome.progress {
                boundaries.push(p.percent);
            }
            sheet = outcome.sheet;
        }
        // Full threshold 50: boundaries at 12 (25%), 25 (50%), 37 (75%), 50 (100%).
        assert_eq!(boundaries, vec![25, 50, 75, 100]);
    }

    #[test]
    fn counts_monotonically_increase() {
        let mut sheet = sheet_with_sword();
        let context = sword_context();
        let mut last = 0;
        for _rep in 0..10 {
            let outcome = track_action(&sheet, "slash", &context);
            let count = outcome.sheet.insight.count("sword_slash");
            assert!(count > last);
            last = count;
            sheet = outcome.sheet;
        }
    }

    #[test]
    fn granted_partial_is_cleared() {
        let mut sheet = sheet_with_sword();
        let context = sword_context();
        for _rep in 0..50 {
            sheet = track_action(&sheet, "slash", &context).sheet;
        }
        assert!(sheet.has_skill(&SkillId::from("power_strike")));
        assert!(sheet.insight.partials.is_empty());
        assert!(sheet.insight.granted.contains(&SkillId::from("power_strike")));
    }

    #[test]
    fn already_owned_skill_is_never_regranted() {
        let mut sheet = sheet_with_sword();
        // Own power_strike through another pathway first.
        if let Some(skill) = catalog::skill_definition(&SkillId::from("power_strike")) {
            sheet.skills.push(skill);
        }
        let context = sword_context();
        for _rep in 0..60 {
            let outcome = track_action(&sheet, "slash", &context);
            assert!(outcome.newly_granted.is_empty());
            sheet = outcome.sheet;
        }
        let owned = sheet
            .skills
            .iter()
            .filter(|s| s.id == SkillId::from("power_strike"))
            .count();
        assert_eq!(owned, 1);
    }
}
