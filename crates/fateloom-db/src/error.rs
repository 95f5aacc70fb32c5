//! Error types for the persistence layer.

/// Errors that can occur in the save-game store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored blob could not be decoded; callers skip the child and
    /// keep the game playable.
    #[error("corrupt {entity} blob for {id}")]
    Corrupt {
        /// Entity kind (`"npc"`, `"quest"`, ...).
        entity: &'static str,
        /// The offending row's identifier.
        id: String,
    },

    /// A configuration problem (bad path, unparseable URL).
    #[error("configuration error: {0}")]
    Config(String),
}
