//! Quest rules: acceptance, objective progress, completion, and rewards.
//!
//! `Completed` and `Failed` are terminal; `Completed` holds iff every
//! objective has reached its target. Reward application is a separate
//! sheet transition so the orchestrator can emit item/XP events from it.

use fateloom_types::character::CharacterSheet;
use fateloom_types::enums::QuestStatus;
use fateloom_types::quest::Quest;

use crate::error::RulesError;
use crate::progression::{GainXpOutcome, gain_xp};
use crate::sheet::add_item;

/// Check prerequisites and mark a quest in progress.
///
/// # Errors
///
/// - [`RulesError::QuestFinished`] if the quest is terminal
/// - [`RulesError::PrerequisitesNotMet`] if any prerequisite quest is not
///   in the completed set
pub fn accept_quest(
    quest: &Quest,
    completed: &std::collections::BTreeSet<fateloom_types::ids::QuestId>,
) -> Result<Quest, RulesError> {
    if quest.status.is_terminal() {
        return Err(RulesError::QuestFinished(quest.id.clone()));
    }
    if !quest.prerequisites.iter().all(|p| completed.contains(p)) {
        return Err(RulesError::PrerequisitesNotMet(quest.id.clone()));
    }
    let mut next = quest.clone();
    next.status = QuestStatus::InProgress;
    Ok(next)
}

/// Advance one objective by `amount`, clamping at its target, and promote
/// the quest to `Completed` when every objective is done.
///
/// Returns the new quest and whether this call completed it.
///
/// # Errors
///
/// Returns [`RulesError::QuestFinished`] if the quest is terminal.
pub fn progress_objective(
    quest: &Quest,
    objective_index: usize,
    amount: u32,
) -> Result<(Quest, bool), RulesError> {
    if quest.status.is_terminal() {
        return Err(RulesError::QuestFinished(quest.id.clone()));
    }
    let mut next = quest.clone();
    if let Some(objective) = next.objectives.get_mut(objective_index) {
        objective.current_progress = objective
            .current_progress
            .saturating_add(amount)
            .min(objective.target_progress);
    }
    let completed_now = next.all_objectives_complete() && !next.objectives.is_empty();
    if completed_now {
        next.status = QuestStatus::Completed;
    }
    Ok((next, completed_now))
}

/// Mark a quest failed. Terminal; idempotent on already-failed quests.
///
/// # Errors
///
/// Returns [`RulesError::QuestFinished`] if the quest already completed.
pub fn fail_quest(quest: &Quest) -> Result<Quest, RulesError> {
    if quest.status == QuestStatus::Completed {
        return Err(RulesError::QuestFinished(quest.id.clone()));
    }
    let mut next = quest.clone();
    next.status = QuestStatus::Failed;
    Ok(next)
}

/// Apply a completed quest's rewards to the character sheet.
///
/// Items that no longer fit are dropped with a warning rather than
/// failing the completion; XP and gold always apply.
///
/// # Errors
///
/// Returns [`RulesError::ArithmeticOverflow`] if XP accounting overflows.
pub fn apply_rewards(
    sheet: &CharacterSheet,
    quest: &Quest,
) -> Result<GainXpOutcome, RulesError> {
    let mut next = sheet.clone();
    next.inventory.gold = next.inventory.gold.saturating_add(quest.rewards.gold);
    for item in &quest.rewards.items {
        match add_item(&next, item.clone()) {
            Ok(with_item) => next = with_item,
            Err(e) => {
                tracing::warn!(
                    quest = %quest.id,
                    item = %item.id,
                    error = %e,
                    "reward item dropped"
                );
            }
        }
    }
    next.completed_quests.insert(quest.id.clone());
    gain_xp(&next, quest.rewards.xp)
}
