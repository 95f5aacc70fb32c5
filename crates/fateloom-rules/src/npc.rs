//! NPC relationship, conversation, and shop rules.
//!
//! Relationship affinity is clamped to `[-100, 100]` on every update -- no
//! silent drift beyond bounds. Conversation history is append-only. Shop
//! stock is monotone-decreasing per purchase unless explicitly
//! replenished.

use chrono::Utc;

use fateloom_types::character::CharacterSheet;
use fateloom_types::ids::{GameId, ItemId};
use fateloom_types::npc::{AFFINITY_MAX, AFFINITY_MIN, ConversationTurn, Npc, Speaker};

use crate::error::RulesError;
use crate::sheet::{add_item, remove_item};

/// Largest affinity change a single interaction can apply. Dialogue
/// outcomes from the LLM are clamped into `[-MAX_AFFINITY_DELTA,
/// MAX_AFFINITY_DELTA]` before they touch the stored score.
pub const MAX_AFFINITY_DELTA: i32 = 10;

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// Apply a bounded affinity delta for one game, clamping the result to
/// `[-100, 100]`. Returns the new NPC snapshot and the stored score.
#[must_use]
pub fn update_relationship(npc: &Npc, game: GameId, delta: i32) -> (Npc, i32) {
    let bounded = delta.clamp(-MAX_AFFINITY_DELTA, MAX_AFFINITY_DELTA);
    let old = npc.affinity_for(game);
    let new = old.saturating_add(bounded).clamp(AFFINITY_MIN, AFFINITY_MAX);
    let mut next = npc.clone();
    next.affinity.insert(game, new);
    (next, new)
}

/// Append a pair of conversation turns (player line, NPC reply).
#[must_use]
pub fn record_exchange(npc: &Npc, player_line: &str, npc_reply: &str) -> Npc {
    let mut next = npc.clone();
    let now = Utc::now();
    next.conversation.push(ConversationTurn {
        speaker: Speaker::Player,
        text: String::from(player_line),
        at: now,
    });
    next.conversation.push(ConversationTurn {
        speaker: Speaker::Npc,
        text: String::from(npc_reply),
        at: now,
    });
    next
}

// ---------------------------------------------------------------------------
// Shop
// ---------------------------------------------------------------------------

/// The result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOutcome {
    /// The buyer's new sheet (gold spent, item added).
    pub sheet: CharacterSheet,
    /// The shopkeeper's new snapshot (stock decremented).
    pub npc: Npc,
    /// Gold paid.
    pub paid: u64,
}

/// Buy one unit of an item from an NPC's shop.
///
/// Gates, checked in order: the NPC must have a shop, the listing must
/// exist with stock, the player must meet the listing's level and
/// affinity requirements, afford the price, and have inventory room.
///
/// # Errors
///
/// Returns [`RulesError::PurchaseBlocked`], [`RulesError::NotEnoughGold`],
/// or [`RulesError::InventoryFull`] describing the failed gate.
pub fn purchase(
    sheet: &CharacterSheet,
    npc: &Npc,
    game: GameId,
    item_id: &ItemId,
) -> Result<PurchaseOutcome, RulesError> {
    let Some(shop) = &npc.shop else {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: String::from("this one does not trade"),
        });
    };
    let Some(listing) = shop.listings.get(item_id) else {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: format!("{item_id} is not for sale here"),
        });
    };
    if listing.stock == 0 {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: format!("{} is sold out", listing.item.name),
        });
    }
    if sheet.level < listing.min_level {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: format!("requires level {}", listing.min_level),
        });
    }
    if npc.affinity_for(game) < listing.min_affinity {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: String::from("they do not trust you enough for that"),
        });
    }
    if sheet.inventory.gold < listing.price {
        return Err(RulesError::NotEnoughGold {
            needed: listing.price,
            held: sheet.inventory.gold,
        });
    }

    let mut unit = listing.item.clone();
    unit.quantity = 1;
    let mut next_sheet = add_item(sheet, unit)?;
    next_sheet.inventory.gold = next_sheet.inventory.gold.saturating_sub(listing.price);

    let mut next_npc = npc.clone();
    if let Some(shop) = &mut next_npc.shop
        && let Some(listing) = shop.listings.get_mut(item_id)
    {
        listing.stock = listing.stock.saturating_sub(1);
    }

    Ok(PurchaseOutcome {
        sheet: next_sheet,
        npc: next_npc,
        paid: listing.price,
    })
}

/// Sell one unit of an owned item to an NPC's shop at its buyback rate.
///
/// # Errors
///
/// Returns [`RulesError::PurchaseBlocked`] if the NPC has no shop, or
/// [`RulesError::ItemNotAvailable`] if the item is not carried.
pub fn sell(
    sheet: &CharacterSheet,
    npc: &Npc,
    item_id: &ItemId,
) -> Result<(CharacterSheet, u64), RulesError> {
    let Some(shop) = &npc.shop else {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: String::from("this one does not trade"),
        });
    };
    let Some(stack) = sheet.inventory.slots.get(item_id) else {
        return Err(RulesError::ItemNotAvailable(item_id.clone()));
    };
    // Quest-bound items never leave the inventory through a shop.
    if stack.kind == fateloom_types::character::ItemKind::QuestItem {
        return Err(RulesError::PurchaseBlocked {
            npc: npc.id.clone(),
            reason: format!("{} is bound to your task", stack.name),
        });
    }
    let paid = shop.buyback_price(stack.value);
    let mut next = remove_item(sheet, item_id, 1)?;
    next.inventory.gold = next.inventory.gold.saturating_add(paid);
    Ok((next, paid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use fateloom_types::character::{Item, ItemKind};
    use fateloom_types::ids::{LocationId, NpcId};
    use fateloom_types::npc::{Shop, ShopItem};

    fn potion() -> Item {
        Item {
            id: ItemId::from("potion"),
            name: String::from("Healing Potion"),
            description: String::new(),
            kind: ItemKind::Consumable,
            stat_bonuses: BTreeMap::new(),
            quantity: 1,
            value: 20,
        }
    }

    fn shopkeeper() -> Npc {
        let mut listings = BTreeMap::new();
        listings.insert(
            ItemId::from("potion"),
            ShopItem {
                item: potion(),
                stock: 3,
                price: 25,
                min_level: 1,
                min_affinity: 0,
            },
        );
        Npc {
            id: NpcId::from("brakka"),
            name: String::from("Brakka"),
            archetype: String::from("merchant"),
            location_id: LocationId::from("tutorial-grove"),
            personality: String::new(),
            conversation: Vec::new(),
            affinity: BTreeMap::new(),
            shop: Some(Shop {
                name: String::from("Brakka's Wares"),
                listings,
                buyback_pct: 50,
            }),
            offered_quests: Vec::new(),
            lore: String::new(),
            greeting_context: String::new(),
        }
    }

    #[test]
    fn affinity_clamps_at_bounds() {
        let npc = shopkeeper();
        let game = GameId::new();
        let mut current = npc;
        // Push toward the ceiling with many maximal deltas.
        for _step in 0..30 {
            let (next, score) = update_relationship(&current, game, 10);
            assert!(score <= AFFINITY_MAX);
            current = next;
        }
        assert_eq!(current.affinity_for(game), AFFINITY_MAX);
        // And back down past the floor.
        for _step in 0..50 {
            let (next, score) = update_relationship(&current, game, -10);
            assert!(score >= AFFINITY_MIN);
            current = next;
        }
        assert_eq!(current.affinity_for(game), AFFINITY_MIN);
    }

    #[test]
    fn oversized_delta_is_bounded() {
        let npc = shopkeeper();
        let game = GameId::new();
        let (_, score) = update_relationship(&npc, game, 500);
        assert_eq!(score, MAX_AFFINITY_DELTA);
    }

    #[test]
    fn exchanges_append_in_order() {
        let npc = shopkeeper();
        let npc = record_exchange(&npc, "Hello", "Well met.");
        let npc = record_exchange(&npc, "Any work?", "Always.");
        assert_eq!(npc.conversation.len(), 4);
        assert_eq!(
            npc.conversation.first().map(|t| t.speaker),
            Some(Speaker::Player)
        );
        assert_eq!(npc.conversation.last().map(|t| t.text.as_str()), Some("Always."));
    }

    #[test]
    fn purchase_decrements_stock_and_gold() {
        let npc = shopkeeper();
        let game = GameId::new();
        let mut sheet = CharacterSheet::new_level_one();
        sheet.inventory.gold = 100;
        let outcome = purchase(&sheet, &npc, game, &ItemId::from("potion")).ok();
        let Some(outcome) = outcome else {
            assert!(false, "purchase failed");
            return;
        };
        assert_eq!(outcome.paid, 25);
        assert_eq!(outcome.sheet.inventory.gold, 75);
        assert_eq!(outcome.sheet.inventory.quantity_of(&ItemId::from("potion")), 1);
        let stock = outcome
            .npc
            .shop
            .as_ref()
            .and_then(|s| s.listings.get(&ItemId::from("potion")))
            .map(|l| l.stock);
        assert_eq!(stock, Some(2));
    }

    #[test]
    fn sold_out_listing_blocks_purchase() {
        let mut npc = shopkeeper();
        if let Some(shop) = &mut npc.shop
            && let Some(listing) = shop.listings.get_mut(&ItemId::from("potion"))
        {
            listing.stock = 0;
        }
        let mut sheet = CharacterSheet::new_level_one();
        sheet.inventory.gold = 100;
        let result = purchase(&sheet, &npc, GameId::new(), &ItemId::from("potion"));
        assert!(matches!(result, Err(RulesError::PurchaseBlocked { .. })));
    }

    #[test]
    fn affinity_gate_blocks_purchase() {
        let mut npc = shopkeeper();
        if let Some(shop) = &mut npc.shop
            && let Some(listing) = shop.listings.get_mut(&ItemId::from("potion"))
        {
            listing.min_affinity = 20;
        }
        let mut sheet = CharacterSheet::new_level_one();
        sheet.inventory.gold = 100;
        let result = purchase(&sheet, &npc, GameId::new(), &ItemId::from("potion"));
        assert!(matches!(result, Err(RulesError::PurchaseBlocked { .. })));
    }

    #[test]
    fn gold_gate_blocks_purchase() {
        let npc = shopkeeper();
        let sheet = CharacterSheet::new_level_one();
        let result = purchase(&sheet, &npc, GameId::new(), &ItemId::from("potion"));
        assert!(matches!(result, Err(RulesError::NotEnoughGold { .. })));
    }

    #[test]
    fn quest_items_cannot_be_sold() {
        let npc = shopkeeper();
        let sheet = CharacterSheet::new_level_one();
        let mut relic = potion();
        relic.id = ItemId::from("sealed-relic");
        relic.kind = ItemKind::QuestItem;
        let sheet = add_item(&sheet, relic).unwrap_or_else(|_| sheet.clone());
        let result = sell(&sheet, &npc, &ItemId::from("sealed-relic"));
        assert!(matches!(result, Err(RulesError::PurchaseBlocked { .. })));
    }

    #[test]
    fn selling_pays_buyback_rate() {
        let npc = shopkeeper();
        let sheet = CharacterSheet::new_level_one();
        let sheet = add_item(&sheet, potion()).unwrap_or_else(|_| sheet.clone());
        let result = sell(&sheet, &npc, &ItemId::from("potion")).ok();
        let Some((after, paid)) = result else {
            assert!(false, "sell failed");
            return;
        };
        // Value 20 at 50% buyback.
        assert_eq!(paid, 10);
        assert_eq!(after.inventory.gold, 10);
        assert_eq!(after.inventory.quantity_of(&ItemId::from("potion")), 0);
    }
}
