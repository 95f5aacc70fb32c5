//! Out-of-band NPC persistence.
//!
//! NPCs change between full snapshot saves (conversation appends,
//! affinity updates, shop stock). These rows are the freshest copies and
//! win over the state blob's embedded NPCs at load time.

use fateloom_types::ids::{GameId, NpcId};
use fateloom_types::npc::Npc;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// Operations on the `npcs` table.
pub struct NpcStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> NpcStore<'a> {
    /// Create a new NPC store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Upsert one NPC blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails twice.
    pub async fn save_npc(&self, game_id: GameId, npc: &Npc) -> Result<(), StoreError> {
        let blob = serde_json::to_string(npc)?;
        with_write_retry(|| {
            let blob = blob.clone();
            async move {
                sqlx::query(
                    r"INSERT INTO npcs (game_id, npc_id, blob) VALUES (?1, ?2, ?3)
                      ON CONFLICT(game_id, npc_id) DO UPDATE SET blob = ?3",
                )
                .bind(game_id.to_string())
                .bind(npc.id.as_str())
                .bind(blob)
                .execute(self.store.pool())
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Load one NPC.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent, or
    /// [`StoreError::Corrupt`] if the blob will not decode.
    pub async fn load_npc(&self, game_id: GameId, npc_id: &NpcId) -> Result<Npc, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as(r"SELECT blob FROM npcs WHERE game_id = ?1 AND npc_id = ?2")
                .bind(game_id.to_string())
                .bind(npc_id.as_str())
                .fetch_optional(self.store.pool())
                .await?;
        let Some((blob,)) = row else {
            return Err(StoreError::NotFound(format!("npc {npc_id}")));
        };
        serde_json::from_str(&blob).map_err(|_| StoreError::Corrupt {
            entity: "npc",
            id: npc_id.as_str().to_owned(),
        })
    }
}
