//! Planning session persistence.
//!
//! One row per *completed* planner run. Superseded runs never reach this
//! table: cancellation discards their partial results entirely.

use chrono::{DateTime, Utc};

use fateloom_types::ids::{GameId, PlanningSessionId};
use fateloom_types::plot::PlanningSession;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// A row from the `planning_sessions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlanningSessionRow {
    /// Session id as a UUID string.
    pub id: String,
    /// Blob of the full session record.
    pub blob: String,
    /// Completion time.
    pub created_at: DateTime<Utc>,
}

/// Operations on the `planning_sessions` table.
pub struct PlanningStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> PlanningStore<'a> {
    /// Create a new planning store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Persist one completed planning session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails twice.
    pub async fn save_planning_session(
        &self,
        session: &PlanningSession,
    ) -> Result<(), StoreError> {
        let blob = serde_json::to_string(session)?;
        with_write_retry(|| {
            let blob = blob.clone();
            async move {
                sqlx::query(
                    r"INSERT INTO planning_sessions (id, game_id, player_level, graph_version, next_replan_level, blob, created_at)
                      VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .bind(session.id.to_string())
                .bind(session.game_id.to_string())
                .bind(i64::from(session.player_level))
                .bind(i64::try_from(session.graph_version).unwrap_or(i64::MAX))
                .bind(i64::from(session.next_replan_level))
                .bind(&blob)
                .bind(session.created_at)
                .execute(self.store.pool())
                .await?;
                Ok(())
            }
        })
        .await?;
        tracing::info!(
            session = %session.id,
            game_id = %session.game_id,
            graph_version = session.graph_version,
            "planning session persisted"
        );
        Ok(())
    }

    /// Load every planning session for a game, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the query fails.
    pub async fn load_planning_sessions(
        &self,
        game_id: GameId,
    ) -> Result<Vec<PlanningSession>, StoreError> {
        let rows = sqlx::query_as::<_, PlanningSessionRow>(
            r"SELECT id, blob, created_at FROM planning_sessions
              WHERE game_id = ?1 ORDER BY created_at ASC, id ASC",
        )
        .bind(game_id.to_string())
        .fetch_all(self.store.pool())
        .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<PlanningSession>(&row.blob) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(session = row.id, error = %e, "skipping corrupt planning session");
                }
            }
        }
        Ok(sessions)
    }

    /// Load one planning session by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if absent, or
    /// [`StoreError::Corrupt`] if the blob will not decode.
    pub async fn load_planning_session(
        &self,
        id: PlanningSessionId,
    ) -> Result<PlanningSession, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as(r"SELECT blob FROM planning_sessions WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(self.store.pool())
                .await?;
        let Some((blob,)) = row else {
            return Err(StoreError::NotFound(format!("planning session {id}")));
        };
        serde_json::from_str(&blob).map_err(|_| StoreError::Corrupt {
            entity: "planning_session",
            id: id.to_string(),
        })
    }
}
