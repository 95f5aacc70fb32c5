//! `SQLite` connection pool and configuration.
//!
//! The save-game store is a single local `SQLite` database in WAL mode.
//! Uses [`sqlx`] with runtime query construction (not compile-time
//! checked) to avoid requiring a live database at build time. All queries
//! are parameterized.
//!
//! Writes retry once with a short backoff before surfacing, matching the
//! engine's persistence failure policy: transient lock contention heals,
//! real faults bubble to the caller.

use std::time::Duration;

use sqlx::SqlitePool as Pool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::StoreError;

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection acquire timeout in seconds.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

/// Delay before the single write retry.
pub(crate) const WRITE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Configuration for the `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Filesystem path of the database file. `":memory:"` for tests.
    pub path: String,
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Acquire timeout.
    pub acquire_timeout: Duration,
}

impl SqliteConfig {
    /// Create a configuration for a database file path.
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Connection pool handle to the save-game database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and configure WAL mode.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the database cannot be opened.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        tracing::info!(path = config.path, "connected to save-game database");
        Ok(Self { pool })
    }

    /// Open an in-memory database for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] on failure.
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        // A single connection: in-memory databases are per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations from the embedded `migrations/`
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations completed");
        Ok(())
    }

    /// Return a reference to the underlying pool.
    pub const fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("save-game database closed");
    }
}

/// Run a write closure, retrying once after a short delay on failure.
///
/// # Errors
///
/// Returns the second failure unchanged.
pub(crate) async fn with_write_retry<T, F, Fut>(operation: F) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "write failed, retrying once");
            tokio::time::sleep(WRITE_RETRY_DELAY).await;
            operation().await
        }
    }
}
