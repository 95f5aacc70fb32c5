//! Event log operations: append-only writes, recent-window reads, and
//! filtered search.
//!
//! Events are strictly ordered by insertion: the `AUTOINCREMENT` id is
//! monotone, so per-game ordering equals commit order. The denormalised
//! foreign-key columns exist only for indexed lookup and are derived from
//! the body on every write.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fateloom_types::enums::{EventCategory, EventImportance};
use fateloom_types::event::{GameEvent, GameEventBody};
use fateloom_types::ids::GameId;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// Filters for event search. Empty filters match everything; set fields
/// combine with AND.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to one category.
    pub category: Option<EventCategory>,
    /// Substring match against the searchable text.
    pub text: Option<String>,
    /// Restrict to events referencing one NPC.
    pub npc_id: Option<String>,
    /// Restrict to events referencing one location.
    pub location_id: Option<String>,
    /// Restrict to events referencing one quest.
    pub quest_id: Option<String>,
    /// Restrict to events referencing one item.
    pub item_id: Option<String>,
}

/// A row from the `game_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Monotone event id.
    pub id: i64,
    /// Owning game id string.
    pub game_id: String,
    /// Category storage string.
    pub category: String,
    /// Importance storage string.
    pub importance: String,
    /// Searchable text rendering.
    pub search_text: String,
    /// Typed body blob.
    pub body: String,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

impl EventRow {
    /// Decode the row into the domain type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the body blob will not decode.
    pub fn into_event(self) -> Result<GameEvent, StoreError> {
        let body: GameEventBody =
            serde_json::from_str(&self.body).map_err(|_| StoreError::Corrupt {
                entity: "event",
                id: self.id.to_string(),
            })?;
        let game_id = Uuid::parse_str(&self.game_id).map_err(|_| StoreError::Corrupt {
            entity: "event",
            id: self.id.to_string(),
        })?;
        Ok(GameEvent {
            id: Some(self.id),
            game_id: GameId::from(game_id),
            body,
            category: EventCategory::from_db_str(&self.category),
            importance: EventImportance::from_db_str(&self.importance),
            created_at: self.created_at,
        })
    }
}

/// Operations on the `game_events` table.
pub struct EventStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Append one event, deriving the denormalised columns from its body.
    ///
    /// Returns the assigned monotone id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails twice.
    pub async fn log_event(&self, event: &GameEvent) -> Result<i64, StoreError> {
        let body_blob = serde_json::to_string(&event.body)?;
        let search_text = event.body.searchable_text();

        let id = with_write_retry(|| {
            let body_blob = body_blob.clone();
            let search_text = search_text.clone();
            async move {
                let result = sqlx::query(
                    r"INSERT INTO game_events (game_id, category, importance, search_text, npc_id, location_id, quest_id, item_id, body, created_at)
                      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .bind(event.game_id.to_string())
                .bind(event.category.as_db_str())
                .bind(event.importance.as_db_str())
                .bind(&search_text)
                .bind(event.body.npc_id().map(|id| id.as_str().to_owned()))
                .bind(event.body.location_id().map(|id| id.as_str().to_owned()))
                .bind(event.body.quest_id().map(|id| id.as_str().to_owned()))
                .bind(event.body.item_id().map(|id| id.as_str().to_owned()))
                .bind(&body_blob)
                .bind(event.created_at)
                .execute(self.store.pool())
                .await?;
                Ok(result.last_insert_rowid())
            }
        })
        .await?;

        Ok(id)
    }

    /// Append a batch of events in one transaction, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the transaction fails twice; nothing is
    /// partially committed.
    pub async fn log_events(&self, events: &[GameEvent]) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }
        with_write_retry(|| async {
            let mut tx = self.store.pool().begin().await?;
            for event in events {
                let body_blob = serde_json::to_string(&event.body)?;
                sqlx::query(
                    r"INSERT INTO game_events (game_id, category, importance, search_text, npc_id, location_id, quest_id, item_id, body, created_at)
                      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .bind(event.game_id.to_string())
                .bind(event.category.as_db_str())
                .bind(event.importance.as_db_str())
                .bind(event.body.searchable_text())
                .bind(event.body.npc_id().map(|id| id.as_str().to_owned()))
                .bind(event.body.location_id().map(|id| id.as_str().to_owned()))
                .bind(event.body.quest_id().map(|id| id.as_str().to_owned()))
                .bind(event.body.item_id().map(|id| id.as_str().to_owned()))
                .bind(body_blob)
                .bind(event.created_at)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok(())
        })
        .await?;
        tracing::debug!(count = events.len(), "events appended");
        Ok(())
    }

    /// The most recent `limit` events for a game, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn recent_events(
        &self,
        game_id: GameId,
        limit: u32,
    ) -> Result<Vec<GameEvent>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, game_id, category, importance, search_text, body, created_at
              FROM (SELECT * FROM game_events WHERE game_id = ?1 ORDER BY id DESC LIMIT ?2)
              ORDER BY id ASC",
        )
        .bind(game_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(self.store.pool())
        .await?;
        Ok(decode_rows(rows))
    }

    /// Search a game's events with the given filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn search(
        &self,
        game_id: GameId,
        filter: &EventFilter,
        limit: u32,
    ) -> Result<Vec<GameEvent>, StoreError> {
        let mut sql = String::from(
            r"SELECT id, game_id, category, importance, search_text, body, created_at
              FROM game_events WHERE game_id = ?1",
        );
        if filter.category.is_some() {
            sql.push_str(" AND category = ?2");
        } else {
            sql.push_str(" AND ?2 IS NULL");
        }
        if filter.text.is_some() {
            sql.push_str(" AND search_text LIKE ?3");
        } else {
            sql.push_str(" AND ?3 IS NULL");
        }
        if filter.npc_id.is_some() {
            sql.push_str(" AND npc_id = ?4");
        } else {
            sql.push_str(" AND ?4 IS NULL");
        }
        if filter.location_id.is_some() {
            sql.push_str(" AND location_id = ?5");
        } else {
            sql.push_str(" AND ?5 IS NULL");
        }
        if filter.quest_id.is_some() {
            sql.push_str(" AND quest_id = ?6");
        } else {
            sql.push_str(" AND ?6 IS NULL");
        }
        if filter.item_id.is_some() {
            sql.push_str(" AND item_id = ?7");
        } else {
            sql.push_str(" AND ?7 IS NULL");
        }
        sql.push_str(" ORDER BY id DESC LIMIT ?8");

        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(game_id.to_string())
            .bind(filter.category.map(EventCategory::as_db_str))
            .bind(filter.text.as_ref().map(|t| format!("%{t}%")))
            .bind(filter.npc_id.as_deref())
            .bind(filter.location_id.as_deref())
            .bind(filter.quest_id.as_deref())
            .bind(filter.item_id.as_deref())
            .bind(i64::from(limit))
            .fetch_all(self.store.pool())
            .await?;
        Ok(decode_rows(rows))
    }
}

/// Decode rows, skipping corrupt ones with a warning.
fn decode_rows(rows: Vec<EventRow>) -> Vec<GameEvent> {
    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_event() {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(error = %e, "skipping corrupt event row"),
        }
    }
    events
}
