//! Plot graph persistence: versioned atomic writes plus denormalised
//! node/edge rows for status and trigger-level queries.
//!
//! The canonical form is the graph blob; node and edge rows are rebuilt
//! from it on every save so the denormalised columns stay consistent.
//! Saves refuse to go backwards in version.

use chrono::Utc;

use fateloom_types::enums::NodeStatus;
use fateloom_types::ids::{GameId, NodeId};
use fateloom_types::plot::PlotGraph;

use crate::error::StoreError;
use crate::sqlite::{SqliteStore, with_write_retry};

/// Operations on the `plot_graphs`, `plot_nodes`, and `plot_edges` tables.
pub struct PlotStore<'a> {
    store: &'a SqliteStore,
}

impl<'a> PlotStore<'a> {
    /// Create a new plot store bound to a pool.
    pub const fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Atomically write a graph version: blob row plus rebuilt node and
    /// edge rows. Writes with a version at or below the stored one are
    /// rejected so planner supersession can never regress the graph.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] on a version regression, or
    /// [`StoreError`] if the transaction fails twice.
    pub async fn save_plot_graph(&self, graph: &PlotGraph) -> Result<(), StoreError> {
        let blob = serde_json::to_string(graph)?;
        let now = Utc::now();

        let stored: Option<(i64,)> =
            sqlx::query_as(r"SELECT version FROM plot_graphs WHERE game_id = ?1")
                .bind(graph.game_id.to_string())
                .fetch_optional(self.store.pool())
                .await?;
        if let Some((version,)) = stored
            && u64::try_from(version).unwrap_or(0) >= graph.version
            && graph.version > 0
        {
            return Err(StoreError::Config(format!(
                "plot graph version regression: stored {version}, writing {}",
                graph.version
            )));
        }

        with_write_retry(|| {
            let blob = blob.clone();
            async move {
                let mut tx = self.store.pool().begin().await?;

                sqlx::query(
                    r"INSERT INTO plot_graphs (game_id, version, blob, updated_at) VALUES (?1, ?2, ?3, ?4)
                      ON CONFLICT(game_id) DO UPDATE SET version = ?2, blob = ?3, updated_at = ?4",
                )
                .bind(graph.game_id.to_string())
                .bind(i64::try_from(graph.version).unwrap_or(i64::MAX))
                .bind(&blob)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                // Rebuild denormalised rows from the canonical blob.
                sqlx::query(r"DELETE FROM plot_nodes WHERE game_id = ?1")
                    .bind(graph.game_id.to_string())
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(r"DELETE FROM plot_edges WHERE game_id = ?1")
                    .bind(graph.game_id.to_string())
                    .execute(&mut *tx)
                    .await?;

                for node in graph.nodes.values() {
                    let node_blob = serde_json::to_string(node)?;
                    sqlx::query(
                        r"INSERT INTO plot_nodes (game_id, node_id, thread_id, tier, sequence, trigger_level, status, blob)
                          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .bind(graph.game_id.to_string())
                    .bind(node.id.as_str())
                    .bind(node.thread_id.as_str())
                    .bind(i64::from(node.position.tier))
                    .bind(i64::from(node.position.sequence))
                    .bind(i64::from(node.beat.trigger_level))
                    .bind(node.status.as_db_str())
                    .bind(node_blob)
                    .execute(&mut *tx)
                    .await?;
                }

                for edge in graph.edges.values() {
                    let edge_blob = serde_json::to_string(edge)?;
                    sqlx::query(
                        r"INSERT INTO plot_edges (game_id, edge_id, from_node, to_node, edge_type, disabled, blob)
                          VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    )
                    .bind(graph.game_id.to_string())
                    .bind(edge.id.as_str())
                    .bind(edge.from.as_str())
                    .bind(edge.to.as_str())
                    .bind(format!("{:?}", edge.edge_type))
                    .bind(i64::from(edge.disabled))
                    .bind(edge_blob)
                    .execute(&mut *tx)
                    .await?;
                }

                tx.commit().await?;
                Ok(())
            }
        })
        .await?;

        tracing::info!(
            game_id = %graph.game_id,
            version = graph.version,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "plot graph saved"
        );
        Ok(())
    }

    /// Load the current graph version for a game.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no graph has been planned yet,
    /// or [`StoreError::Corrupt`] if the blob will not decode.
    pub async fn load_plot_graph(&self, game_id: GameId) -> Result<PlotGraph, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as(r"SELECT blob FROM plot_graphs WHERE game_id = ?1")
                .bind(game_id.to_string())
                .fetch_optional(self.store.pool())
                .await?;
        let Some((blob,)) = row else {
            return Err(StoreError::NotFound(format!("plot graph for {game_id}")));
        };
        serde_json::from_str(&blob).map_err(|_| StoreError::Corrupt {
            entity: "plot_graph",
            id: game_id.to_string(),
        })
    }

    /// Update one node's status in both the canonical blob and the
    /// denormalised row, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the graph or node is missing,
    /// or [`StoreError`] if the transaction fails twice.
    pub async fn update_node_status(
        &self,
        game_id: GameId,
        node_id: &NodeId,
        status: NodeStatus,
    ) -> Result<(), StoreError> {
        let mut graph = self.load_plot_graph(game_id).await?;
        let Some(node) = graph.nodes.get_mut(node_id) else {
            return Err(StoreError::NotFound(format!("plot node {node_id}")));
        };
        node.status = status;
        let blob = serde_json::to_string(&graph)?;

        with_write_retry(|| {
            let blob = blob.clone();
            async move {
                let mut tx = self.store.pool().begin().await?;
                sqlx::query(r"UPDATE plot_graphs SET blob = ?2, updated_at = ?3 WHERE game_id = ?1")
                    .bind(game_id.to_string())
                    .bind(&blob)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;
                sqlx::query(
                    r"UPDATE plot_nodes SET status = ?3 WHERE game_id = ?1 AND node_id = ?2",
                )
                .bind(game_id.to_string())
                .bind(node_id.as_str())
                .bind(status.as_db_str())
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(())
            }
        })
        .await
    }
}
