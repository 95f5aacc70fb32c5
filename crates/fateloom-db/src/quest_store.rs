//! Out-of-band quest persistence.
//!
//! Quest rows carry a denormalised status column so the load overlay can
//! split active from completed without decoding every blob.

use fateloom_types::ids::{GameId, QuestId};
use fateloom_types::quest::Quest;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// Operations on the `quests` table.
pub struct QuestStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> QuestStore<'a> {
    /// Create a new quest store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Upsert one quest blob with its status column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails twice.
    pub async fn save_quest(&self, game_id: GameId, quest: &Quest) -> Result<(), StoreError> {
        let blob = serde_json::to_string(quest)?;
        let status = serde_json::to_value(quest.status)
            .ok()
            .and_then(|v| v.as_str().map(ToOwned::to_owned))
            .unwrap_or_else(|| String::from("IN_PROGRESS"));
        with_write_retry(|| {
            let blob = blob.clone();
            let status = status.clone();
            async move {
                sqlx::query(
                    r"INSERT INTO quests (game_id, quest_id, status, blob) VALUES (?1, ?2, ?3, ?4)
                      ON CONFLICT(game_id, quest_id) DO UPDATE SET status = ?3, blob = ?4",
                )
                .bind(game_id.to_string())
                .bind(quest.id.as_str())
                .bind(status)
                .bind(blob)
                .execute(self.store.pool())
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Load one quest.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent, or
    /// [`StoreError::Corrupt`] if the blob will not decode.
    pub async fn load_quest(
        &self,
        game_id: GameId,
        quest_id: &QuestId,
    ) -> Result<Quest, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as(r"SELECT blob FROM quests WHERE game_id = ?1 AND quest_id = ?2")
                .bind(game_id.to_string())
                .bind(quest_id.as_str())
                .fetch_optional(self.store.pool())
                .await?;
        let Some((blob,)) = row else {
            return Err(StoreError::NotFound(format!("quest {quest_id}")));
        };
        serde_json::from_str(&blob).map_err(|_| StoreError::Corrupt {
            entity: "quest",
            id: quest_id.as_str().to_owned(),
        })
    }
}
