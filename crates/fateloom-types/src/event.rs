//! Game event log entries.
//!
//! Every state change the player can perceive produces an immutable event
//! appended to the per-game log. Events carry a category, an importance,
//! a searchable text rendering, and denormalised foreign keys so the store
//! can index lookups without unpacking the body blob.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{EventCategory, EventImportance, QuestStatus};
use crate::ids::{GameId, ItemId, LocationId, NodeId, NpcId, QuestId, RecipeId, SkillId};

// ---------------------------------------------------------------------------
// Event body
// ---------------------------------------------------------------------------

/// The typed payload of one event log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventBody {
    /// A chunk-complete narrator passage.
    NarratorText {
        /// The full narrated text.
        text: String,
    },
    /// A line of NPC dialogue.
    NpcDialogue {
        /// The speaking NPC.
        npc_id: NpcId,
        /// What was said.
        text: String,
    },
    /// A system-interface notification (also used for validation failures).
    SystemNotification {
        /// The message shown to the player.
        message: String,
    },
    /// A resolved combat exchange.
    CombatLog {
        /// What was fought.
        target: String,
        /// Damage dealt to the target.
        damage: u32,
        /// XP gained.
        xp_gained: u64,
        /// Gold looted.
        gold: u64,
        /// Item ids looted.
        loot: Vec<ItemId>,
    },
    /// A base stat or resource change outside combat.
    StatChange {
        /// Human-readable description of the change.
        description: String,
    },
    /// An item entered the inventory.
    ItemGained {
        /// The item.
        item_id: ItemId,
        /// How many.
        quantity: u32,
    },
    /// A quest changed status or progressed.
    QuestUpdate {
        /// The quest.
        quest_id: QuestId,
        /// Status after the update.
        status: QuestStatus,
        /// Progress note.
        note: String,
    },
    /// The player levelled up.
    LevelUp {
        /// New level.
        new_level: u32,
        /// Grade label after the level-up.
        grade: String,
    },
    /// A skill was granted through repeated action insight.
    LearnedFromInsight {
        /// The granted skill.
        skill_id: SkillId,
        /// The action token that unlocked it.
        action_type: String,
        /// Repetitions at unlock.
        repetitions: u64,
    },
    /// A partial skill hint was revealed or progressed.
    InsightProgress {
        /// The action token.
        action_type: String,
        /// Obscured hint shown to the player.
        hint: String,
        /// Progress fraction in whole percent (25/50/75/100 boundaries).
        percent: u8,
    },
    /// Skills were fused into a new one.
    SkillFused {
        /// The produced skill.
        result: SkillId,
        /// The consumed inputs.
        inputs: BTreeSet<SkillId>,
        /// The matched recipe.
        recipe: RecipeId,
        /// Whether this recipe was newly discovered.
        was_new_discovery: bool,
    },
    /// A skill evolved into its successor.
    SkillEvolved {
        /// The consumed skill.
        from: SkillId,
        /// The produced skill.
        to: SkillId,
    },
    /// A new location was generated and connected.
    LocationDiscovered {
        /// The new location.
        location_id: LocationId,
        /// Its display name.
        name: String,
    },
    /// A plot node triggered.
    BeatTriggered {
        /// The node.
        node_id: NodeId,
        /// The beat title.
        title: String,
    },
    /// A raw LLM invocation record for diagnostics.
    AiCall {
        /// Which agent was invoked.
        agent: String,
        /// Wall-clock latency in milliseconds.
        latency_ms: u64,
        /// Whether the call succeeded.
        ok: bool,
    },
}

impl GameEventBody {
    /// The default category for this body kind.
    pub const fn default_category(&self) -> EventCategory {
        match self {
            Self::NarratorText { .. } => EventCategory::Narrative,
            Self::NpcDialogue { .. } => EventCategory::Dialogue,
            Self::CombatLog { .. } => EventCategory::Combat,
            Self::LocationDiscovered { .. } => EventCategory::Exploration,
            Self::BeatTriggered { .. } => EventCategory::Setup,
            Self::AiCall { .. } => EventCategory::AiCall,
            Self::SystemNotification { .. }
            | Self::StatChange { .. }
            | Self::ItemGained { .. }
            | Self::QuestUpdate { .. }
            | Self::LevelUp { .. }
            | Self::LearnedFromInsight { .. }
            | Self::InsightProgress { .. }
            | Self::SkillFused { .. }
            | Self::SkillEvolved { .. } => EventCategory::System,
        }
    }

    /// Render the searchable text for this body.
    pub fn searchable_text(&self) -> String {
        match self {
            Self::NarratorText { text } => text.clone(),
            Self::NpcDialogue { npc_id, text } => format!("{npc_id}: {text}"),
            Self::SystemNotification { message } => message.clone(),
            Self::CombatLog {
                target,
                damage,
                xp_gained,
                ..
            } => format!("fought {target}: {damage} damage, {xp_gained} xp"),
            Self::StatChange { description } => description.clone(),
            Self::ItemGained { item_id, quantity } => format!("gained {quantity}x {item_id}"),
            Self::QuestUpdate {
                quest_id, note, ..
            } => format!("quest {quest_id}: {note}"),
            Self::LevelUp { new_level, grade } => {
                format!("reached level {new_level} ({grade})")
            }
            Self::LearnedFromInsight {
                skill_id,
                action_type,
                repetitions,
            } => format!("learned {skill_id} from {action_type} x{repetitions}"),
            Self::InsightProgress {
                action_type,
                hint,
                percent,
            } => format!("insight {action_type} at {percent}%: {hint}"),
            Self::SkillFused { result, recipe, .. } => {
                format!("fused skills into {result} via {recipe}")
            }
            Self::SkillEvolved { from, to } => format!("{from} evolved into {to}"),
            Self::LocationDiscovered { name, .. } => format!("discovered {name}"),
            Self::BeatTriggered { title, .. } => format!("beat triggered: {title}"),
            Self::AiCall {
                agent, latency_ms, ..
            } => format!("ai call {agent} ({latency_ms}ms)"),
        }
    }

    /// The NPC this event references, for the denormalised index column.
    pub fn npc_id(&self) -> Option<&NpcId> {
        match self {
            Self::NpcDialogue { npc_id, .. } => Some(npc_id),
            _ => None,
        }
    }

    /// The location this event references.
    pub fn location_id(&self) -> Option<&LocationId> {
        match self {
            Self::LocationDiscovered { location_id, .. } => Some(location_id),
            _ => None,
        }
    }

    /// The quest this event references.
    pub fn quest_id(&self) -> Option<&QuestId> {
        match self {
            Self::QuestUpdate { quest_id, .. } => Some(quest_id),
            _ => None,
        }
    }

    /// The item this event references.
    pub fn item_id(&self) -> Option<&ItemId> {
        match self {
            Self::ItemGained { item_id, .. } => Some(item_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// One entry in a game's append-only event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Monotone per-game sequence id; `None` until persisted.
    pub id: Option<i64>,
    /// Owning game.
    pub game_id: GameId,
    /// Typed payload.
    pub body: GameEventBody,
    /// Search/filter category.
    pub category: EventCategory,
    /// Retention importance.
    pub importance: EventImportance,
    /// Wall-clock creation time; insertion order is authoritative.
    pub created_at: DateTime<Utc>,
}

impl GameEvent {
    /// Create an event with the body's default category and normal
    /// importance.
    pub fn new(game_id: GameId, body: GameEventBody) -> Self {
        let category = body.default_category();
        Self {
            id: None,
            game_id,
            body,
            category,
            importance: EventImportance::Normal,
            created_at: Utc::now(),
        }
    }

    /// Override the importance.
    #[must_use]
    pub const fn with_importance(mut self, importance: EventImportance) -> Self {
        self.importance = importance;
        self
    }

    /// Override the category.
    #[must_use]
    pub const fn with_category(mut self, category: EventCategory) -> Self {
        self.category = category;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_category_follows_body() {
        let game = GameId::new();
        let narration = GameEvent::new(
            game,
            GameEventBody::NarratorText {
                text: String::from("The grove hums with quiet power."),
            },
        );
        assert_eq!(narration.category, EventCategory::Narrative);

        let combat = GameEvent::new(
            game,
            GameEventBody::CombatLog {
                target: String::from("goblin"),
                damage: 12,
                xp_gained: 40,
                gold: 3,
                loot: Vec::new(),
            },
        );
        assert_eq!(combat.category, EventCategory::Combat);
    }

    #[test]
    fn searchable_text_mentions_key_facts() {
        let body = GameEventBody::LearnedFromInsight {
            skill_id: SkillId::from("power_strike"),
            action_type: String::from("sword_slash"),
            repetitions: 50,
        };
        let text = body.searchable_text();
        assert!(text.contains("power_strike"));
        assert!(text.contains("sword_slash"));
        assert!(text.contains("50"));
    }

    #[test]
    fn denormalised_keys_only_on_matching_bodies() {
        let dialogue = GameEventBody::NpcDialogue {
            npc_id: NpcId::from("brakka"),
            text: String::from("Welcome."),
        };
        assert!(dialogue.npc_id().is_some());
        assert!(dialogue.quest_id().is_none());

        let quest = GameEventBody::QuestUpdate {
            quest_id: QuestId::from("rat-cull"),
            status: QuestStatus::InProgress,
            note: String::from("2/5 rats"),
        };
        assert!(quest.quest_id().is_some());
        assert!(quest.npc_id().is_none());
    }

    #[test]
    fn importance_builder_overrides() {
        let event = GameEvent::new(
            GameId::new(),
            GameEventBody::SystemNotification {
                message: String::from("invariant breach"),
            },
        )
        .with_importance(EventImportance::High);
        assert_eq!(event.importance, EventImportance::High);
    }
}
