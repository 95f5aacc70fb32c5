//! Game row operations: create, fetch, list, delete.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fateloom_types::enums::{Difficulty, SystemType};
use fateloom_types::game::Game;
use fateloom_types::ids::GameId;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// A row from the `games` table.
///
/// Uses runtime types rather than compile-time checked types to avoid
/// requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameRow {
    /// Game id as a UUID string.
    pub id: String,
    /// Player character name.
    pub player_name: String,
    /// System type storage string.
    pub system_type: String,
    /// Difficulty storage string.
    pub difficulty: String,
    /// Denormalised current level.
    pub level: i64,
    /// Accumulated play time.
    pub playtime_seconds: i64,
    /// Combat PRNG seed.
    pub seed: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
}

impl GameRow {
    /// Decode the row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the id is not a UUID; enum
    /// columns are parsed tolerantly via their serde forms with sensible
    /// fallbacks.
    pub fn into_game(self) -> Result<Game, StoreError> {
        let id = Uuid::parse_str(&self.id).map_err(|_| StoreError::Corrupt {
            entity: "game",
            id: self.id.clone(),
        })?;
        let system_type: SystemType =
            serde_json::from_value(serde_json::Value::String(self.system_type.clone()))
                .unwrap_or(SystemType::SystemIntegration);
        let difficulty: Difficulty =
            serde_json::from_value(serde_json::Value::String(self.difficulty.clone()))
                .unwrap_or_default();
        Ok(Game {
            id: GameId::from(id),
            player_name: self.player_name,
            system_type,
            difficulty,
            level: u32::try_from(self.level).unwrap_or(1),
            playtime_seconds: u64::try_from(self.playtime_seconds).unwrap_or(0),
            seed: u64::from_ne_bytes(self.seed.to_ne_bytes()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Serialize an enum to its storage string via serde.
fn enum_str<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(ToOwned::to_owned))
        .unwrap_or_default()
}

/// Operations on the `games` table.
pub struct GameStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> GameStore<'a> {
    /// Create a new game store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Insert a new game row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the insert fails twice.
    pub async fn create_game(&self, game: &Game) -> Result<(), StoreError> {
        with_write_retry(|| async {
            sqlx::query(
                r"INSERT INTO games (id, player_name, system_type, difficulty, level, playtime_seconds, seed, created_at, updated_at)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(game.id.to_string())
            .bind(&game.player_name)
            .bind(enum_str(&game.system_type))
            .bind(enum_str(&game.difficulty))
            .bind(i64::from(game.level))
            .bind(i64::try_from(game.playtime_seconds).unwrap_or(i64::MAX))
            .bind(i64::from_ne_bytes(game.seed.to_ne_bytes()))
            .bind(game.created_at)
            .bind(game.updated_at)
            .execute(self.store.pool())
            .await?;
            Ok(())
        })
        .await?;
        tracing::info!(game_id = %game.id, player = game.player_name, "game created");
        Ok(())
    }

    /// Fetch one game row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row exists.
    pub async fn get_game(&self, game_id: GameId) -> Result<Game, StoreError> {
        let row = sqlx::query_as::<_, GameRow>(
            r"SELECT id, player_name, system_type, difficulty, level, playtime_seconds, seed, created_at, updated_at
              FROM games WHERE id = ?1",
        )
        .bind(game_id.to_string())
        .fetch_optional(self.store.pool())
        .await?;
        row.ok_or_else(|| StoreError::NotFound(format!("game {game_id}")))?
            .into_game()
    }

    /// List every saved game, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn list_games(&self) -> Result<Vec<Game>, StoreError> {
        let rows = sqlx::query_as::<_, GameRow>(
            r"SELECT id, player_name, system_type, difficulty, level, playtime_seconds, seed, created_at, updated_at
              FROM games ORDER BY updated_at DESC",
        )
        .fetch_all(self.store.pool())
        .await?;
        let mut games = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_game() {
                Ok(game) => games.push(game),
                Err(e) => tracing::warn!(error = %e, "skipping corrupt game row"),
            }
        }
        Ok(games)
    }

    /// Delete a game and, via foreign-key cascade inside one transaction,
    /// every child row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the delete fails twice.
    pub async fn delete_game(&self, game_id: GameId) -> Result<(), StoreError> {
        with_write_retry(|| async {
            let mut tx = self.store.pool().begin().await?;
            sqlx::query("DELETE FROM games WHERE id = ?1")
                .bind(game_id.to_string())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
        .await?;
        tracing::info!(game_id = %game_id, "game deleted with cascade");
        Ok(())
    }
}
