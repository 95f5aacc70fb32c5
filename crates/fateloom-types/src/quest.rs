//! Quest value types: objectives, rewards, and status.
//!
//! Status transitions are enforced by `fateloom-rules::quest`; this module
//! defines the data plus the completion predicate (`Completed` iff every
//! objective is complete).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::character::Item;
use crate::enums::{QuestStatus, QuestType};
use crate::ids::{LocationId, NpcId, QuestId};

/// One step toward completing a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// What the player must do (`"Slay 5 cave rats"`).
    pub description: String,
    /// Progress so far, never above `target_progress`.
    pub current_progress: u32,
    /// Progress required for completion.
    pub target_progress: u32,
}

impl Objective {
    /// Whether the objective is finished.
    pub const fn is_complete(&self) -> bool {
        self.current_progress >= self.target_progress
    }
}

/// Everything granted when a quest completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuestRewards {
    /// Experience awarded.
    #[serde(default)]
    pub xp: u64,
    /// Items placed in the inventory.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Template locations revealed on the map.
    #[serde(default)]
    pub unlocked_locations: BTreeSet<LocationId>,
    /// Gold awarded.
    #[serde(default)]
    pub gold: u64,
}

/// A quest with ordered objectives and terminal statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Content identifier.
    pub id: QuestId,
    /// Display name.
    pub name: String,
    /// Narrative description.
    pub description: String,
    /// Classification.
    pub quest_type: QuestType,
    /// Ordered objectives; all must complete for the quest to complete.
    pub objectives: Vec<Objective>,
    /// Rewards on completion.
    pub rewards: QuestRewards,
    /// Quests that must be completed before this one can start.
    #[serde(default)]
    pub prerequisites: BTreeSet<QuestId>,
    /// The NPC who offers this quest, if any.
    #[serde(default)]
    pub giver: Option<NpcId>,
    /// Lifecycle status.
    pub status: QuestStatus,
}

impl Quest {
    /// Whether every objective has reached its target.
    pub fn all_objectives_complete(&self) -> bool {
        self.objectives.iter().all(Objective::is_complete)
    }
}
