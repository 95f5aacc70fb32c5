//! Game state snapshot persistence: the atomic save and the overlaying
//! load.
//!
//! `save_game` commits the metadata update, the state blob, and every
//! child blob (NPCs, active quests, custom locations) in one transaction:
//! a failure leaves the previous snapshot fully intact. `load_state`
//! reconstitutes a [`GameState`] by loading the base blob and overlaying
//! freshly deserialised child rows, so children persisted out-of-band
//! after the blob was written still appear. Corrupt child blobs are
//! skipped and reported, never fatal.

use std::collections::BTreeMap;

use chrono::Utc;

use fateloom_types::game::GameState;
use fateloom_types::ids::{GameId, LocationId};
use fateloom_types::npc::Npc;
use fateloom_types::quest::Quest;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// A child entity skipped during load because its blob would not decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChild {
    /// Entity kind (`"npc"`, `"quest"`, `"location"`).
    pub entity: &'static str,
    /// The offending row id.
    pub id: String,
}

/// The result of an overlaying load.
#[derive(Debug, Clone)]
pub struct LoadedState {
    /// The reconstituted state.
    pub state: GameState,
    /// Children skipped as corrupt; the caller logs a high-importance
    /// event per entry and the game stays playable.
    pub skipped: Vec<SkippedChild>,
}

/// Operations on the `game_states` table and its child tables.
pub struct StateStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> StateStore<'a> {
    /// Create a new state store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Atomically persist the full snapshot: game metadata, state blob,
    /// all NPC blobs, all active quest blobs, all custom-location blobs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails twice; the
    /// previous snapshot remains intact.
    pub async fn save_game(
        &self,
        state: &GameState,
        playtime_seconds: u64,
    ) -> Result<(), StoreError> {
        let state_blob = serde_json::to_string(state)?;
        let now = Utc::now();

        with_write_retry(|| {
            let state_blob = state_blob.clone();
            async move {
                let mut tx = self.store.pool().begin().await?;

                sqlx::query(
                    r"UPDATE games SET level = ?2, playtime_seconds = ?3, updated_at = ?4 WHERE id = ?1",
                )
                .bind(state.game_id.to_string())
                .bind(i64::from(state.character.level))
                .bind(i64::try_from(playtime_seconds).unwrap_or(i64::MAX))
                .bind(now)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r"INSERT INTO game_states (game_id, blob, updated_at) VALUES (?1, ?2, ?3)
                      ON CONFLICT(game_id) DO UPDATE SET blob = ?2, updated_at = ?3",
                )
                .bind(state.game_id.to_string())
                .bind(&state_blob)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                for npcs in state.npcs_by_location.values() {
                    for npc in npcs {
                        let blob = serde_json::to_string(npc)?;
                        sqlx::query(
                            r"INSERT INTO npcs (game_id, npc_id, blob) VALUES (?1, ?2, ?3)
                              ON CONFLICT(game_id, npc_id) DO UPDATE SET blob = ?3",
                        )
                        .bind(state.game_id.to_string())
                        .bind(npc.id.as_str())
                        .bind(blob)
                        .execute(&mut *tx)
                        .await?;
                    }
                }

                for quest in state.active_quests.values() {
                    let blob = serde_json::to_string(quest)?;
                    sqlx::query(
                        r"INSERT INTO quests (game_id, quest_id, status, blob) VALUES (?1, ?2, ?3, ?4)
                          ON CONFLICT(game_id, quest_id) DO UPDATE SET status = ?3, blob = ?4",
                    )
                    .bind(state.game_id.to_string())
                    .bind(quest.id.as_str())
                    .bind(status_str(quest))
                    .bind(blob)
                    .execute(&mut *tx)
                    .await?;
                }

                for location in state.custom_locations.values() {
                    let blob = serde_json::to_string(location)?;
                    sqlx::query(
                        r"INSERT INTO custom_locations (game_id, location_id, blob) VALUES (?1, ?2, ?3)
                          ON CONFLICT(game_id, location_id) DO UPDATE SET blob = ?3",
                    )
                    .bind(state.game_id.to_string())
                    .bind(location.id.as_str())
                    .bind(blob)
                    .execute(&mut *tx)
                    .await?;
                }

                tx.commit().await?;
                Ok(())
            }
        })
        .await?;

        tracing::debug!(game_id = %state.game_id, "snapshot saved");
        Ok(())
    }

    /// Load the base blob and overlay the freshly deserialised children.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no snapshot exists, or
    /// [`StoreError::Corrupt`] if the base blob itself will not decode.
    /// Corrupt children are skipped, not fatal.
    pub async fn load_state(&self, game_id: GameId) -> Result<LoadedState, StoreError> {
        let blob: Option<(String,)> =
            sqlx::query_as(r"SELECT blob FROM game_states WHERE game_id = ?1")
                .bind(game_id.to_string())
                .fetch_optional(self.store.pool())
                .await?;
        let Some((blob,)) = blob else {
            return Err(StoreError::NotFound(format!("state for game {game_id}")));
        };
        let mut state: GameState =
            serde_json::from_str(&blob).map_err(|_| StoreError::Corrupt {
                entity: "game_state",
                id: game_id.to_string(),
            })?;

        let mut skipped = Vec::new();

        // --- NPC overlay: child rows are the freshest copies ---
        let npc_rows: Vec<(String, String)> =
            sqlx::query_as(r"SELECT npc_id, blob FROM npcs WHERE game_id = ?1 ORDER BY npc_id")
                .bind(game_id.to_string())
                .fetch_all(self.store.pool())
                .await?;
        if !npc_rows.is_empty() {
            let mut by_location: BTreeMap<LocationId, Vec<Npc>> = BTreeMap::new();
            for (npc_id, blob) in npc_rows {
                match serde_json::from_str::<Npc>(&blob) {
                    Ok(npc) => by_location
                        .entry(npc.location_id.clone())
                        .or_default()
                        .push(npc),
                    Err(e) => {
                        tracing::warn!(npc = npc_id, error = %e, "skipping corrupt NPC blob");
                        skipped.push(SkippedChild {
                            entity: "npc",
                            id: npc_id,
                        });
                    }
                }
            }
            state.npcs_by_location = by_location;
        }

        // --- Quest overlay ---
        let quest_rows: Vec<(String, String, String)> = sqlx::query_as(
            r"SELECT quest_id, status, blob FROM quests WHERE game_id = ?1 ORDER BY quest_id",
        )
        .bind(game_id.to_string())
        .fetch_all(self.store.pool())
        .await?;
        for (quest_id, status, blob) in quest_rows {
            match serde_json::from_str::<Quest>(&blob) {
                Ok(quest) => {
                    if quest.status.is_terminal() || status == "COMPLETED" || status == "FAILED" {
                        state.active_quests.remove(&quest.id);
                        if quest.status == fateloom_types::enums::QuestStatus::Completed {
                            state.completed_quests.insert(quest.id);
                        }
                    } else {
                        state.completed_quests.remove(&quest.id);
                        state.active_quests.insert(quest.id.clone(), quest);
                    }
                }
                Err(e) => {
                    tracing::warn!(quest = quest_id, error = %e, "skipping corrupt quest blob");
                    skipped.push(SkippedChild {
                        entity: "quest",
                        id: quest_id,
                    });
                }
            }
        }

        // --- Custom location overlay ---
        let location_rows: Vec<(String, String)> = sqlx::query_as(
            r"SELECT location_id, blob FROM custom_locations WHERE game_id = ?1 ORDER BY location_id",
        )
        .bind(game_id.to_string())
        .fetch_all(self.store.pool())
        .await?;
        for (location_id, blob) in location_rows {
            match serde_json::from_str::<fateloom_types::location::Location>(&blob) {
                Ok(location) => {
                    state.custom_locations.insert(location.id.clone(), location);
                }
                Err(e) => {
                    tracing::warn!(location = location_id, error = %e, "skipping corrupt location blob");
                    skipped.push(SkippedChild {
                        entity: "location",
                        id: location_id,
                    });
                }
            }
        }

        Ok(LoadedState { state, skipped })
    }
}

/// Storage string for a quest's status column.
fn status_str(quest: &Quest) -> String {
    serde_json::to_value(quest.status)
        .ok()
        .and_then(|v| v.as_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| String::from("IN_PROGRESS"))
}
