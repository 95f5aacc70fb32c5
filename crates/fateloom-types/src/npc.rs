//! NPC value types: personality, conversation history, per-game
//! relationships, and shops.
//!
//! Conversation history is append-only; relationship affinity is clamped to
//! `[-100, 100]` by the rules crate on every update; shop stock only
//! decreases on purchase unless explicitly replenished.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::character::Item;
use crate::ids::{GameId, ItemId, LocationId, NpcId, QuestId};

/// Lowest possible relationship affinity (sworn enemy).
pub const AFFINITY_MIN: i32 = -100;

/// Highest possible relationship affinity (devoted ally).
pub const AFFINITY_MAX: i32 = 100;

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Who said a conversation line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The player character.
    Player,
    /// The NPC.
    Npc,
}

/// One line of recorded conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who spoke.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// When it was said.
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Shop
// ---------------------------------------------------------------------------

/// One listing in an NPC shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopItem {
    /// The item being sold (quantity field is per-unit, not stock).
    pub item: Item,
    /// Units remaining; purchases decrement, never below 0.
    pub stock: u32,
    /// Price per unit in gold.
    pub price: u64,
    /// Minimum player level to purchase, 0 for none.
    #[serde(default)]
    pub min_level: u32,
    /// Minimum affinity with the shopkeeper to purchase.
    #[serde(default)]
    pub min_affinity: i32,
}

/// An NPC's shop: a named inventory with purchase gates and a buyback rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    /// Display name (`"The Rusted Blade"`).
    pub name: String,
    /// Listings keyed by item id.
    pub listings: BTreeMap<ItemId, ShopItem>,
    /// Percentage of an item's value paid when the player sells to this
    /// shop, in whole percent (0--100).
    pub buyback_pct: u8,
}

impl Shop {
    /// Gold paid for one unit of an item sold back to this shop.
    pub fn buyback_price(&self, item_value: u64) -> u64 {
        item_value
            .saturating_mul(u64::from(self.buyback_pct.min(100)))
            .checked_div(100)
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// NPC
// ---------------------------------------------------------------------------

/// A non-player character.
///
/// The `location_id` must equal the key under which this NPC is stored in
/// `GameState::npcs_by_location` -- moving an NPC updates both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    /// Content identifier.
    pub id: NpcId,
    /// Display name.
    pub name: String,
    /// Role archetype (`"blacksmith"`, `"mysterious elder"`).
    pub archetype: String,
    /// Where the NPC currently is.
    pub location_id: LocationId,
    /// Free-text personality sketch used in dialogue prompts.
    pub personality: String,
    /// Append-only conversation log.
    #[serde(default)]
    pub conversation: Vec<ConversationTurn>,
    /// Relationship affinity per game, each in `[-100, 100]`.
    #[serde(default)]
    pub affinity: BTreeMap<GameId, i32>,
    /// Shop, if this NPC trades.
    #[serde(default)]
    pub shop: Option<Shop>,
    /// Quests this NPC can offer.
    #[serde(default)]
    pub offered_quests: Vec<QuestId>,
    /// Background lore woven into narration.
    #[serde(default)]
    pub lore: String,
    /// Context hint for the first greeting.
    #[serde(default)]
    pub greeting_context: String,
}

impl Npc {
    /// Affinity toward the player in one game, 0 if never interacted.
    pub fn affinity_for(&self, game: GameId) -> i32 {
        self.affinity.get(&game).copied().unwrap_or(0)
    }
}
