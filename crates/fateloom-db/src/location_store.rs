//! Out-of-band custom-location persistence.

use fateloom_types::ids::{GameId, LocationId};
use fateloom_types::location::Location;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// Operations on the `custom_locations` table.
pub struct LocationStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> LocationStore<'a> {
    /// Create a new location store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Upsert one custom-location blob.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails twice.
    pub async fn save_custom_location(
        &self,
        game_id: GameId,
        location: &Location,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(location)?;
        with_write_retry(|| {
            let blob = blob.clone();
            async move {
                sqlx::query(
                    r"INSERT INTO custom_locations (game_id, location_id, blob) VALUES (?1, ?2, ?3)
                      ON CONFLICT(game_id, location_id) DO UPDATE SET blob = ?3",
                )
                .bind(game_id.to_string())
                .bind(location.id.as_str())
                .bind(blob)
                .execute(self.store.pool())
                .await?;
                Ok(())
            }
        })
        .await
    }

    /// Load one custom location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent, or
    /// [`StoreError::Corrupt`] if the blob will not decode.
    pub async fn load_custom_location(
        &self,
        game_id: GameId,
        location_id: &LocationId,
    ) -> Result<Location, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            r"SELECT blob FROM custom_locations WHERE game_id = ?1 AND location_id = ?2",
        )
        .bind(game_id.to_string())
        .bind(location_id.as_str())
        .fetch_optional(self.store.pool())
        .await?;
        let Some((blob,)) = row else {
            return Err(StoreError::NotFound(format!("location {location_id}")));
        };
        serde_json::from_str(&blob).map_err(|_| StoreError::Corrupt {
            entity: "location",
            id: location_id.as_str().to_owned(),
        })
    }
}
