//! Persistence layer for the Fateloom narrative engine.
//!
//! A single local `SQLite` database holds every game's durable state.
//! Each entity's canonical form is a JSON blob; denormalised columns
//! exist only for indexed queries and are rebuilt from the blobs on every
//! write. Uses runtime-constructed parameterized queries so builds never
//! need a live database.
//!
//! # Contracts
//!
//! - `save_game` is atomic across metadata, state blob, and all child
//!   blobs; failure leaves the previous snapshot intact
//! - `load_state` overlays freshly deserialised children over the base
//!   blob, so out-of-band child writes still appear
//! - the event log is append-only with per-game monotone ids
//! - `delete_game` cascades to every child table in one transaction
//! - deserialisation is schema-tolerant: unknown fields are ignored,
//!   corrupt children are skipped with a report, the game stays playable
//!
//! # Modules
//!
//! - [`sqlite`] -- Pool configuration, connection, migrations
//! - [`game_store`] -- Game rows
//! - [`state_store`] -- Atomic snapshot save and overlaying load
//! - [`event_store`] -- Append-only event log and filtered search
//! - [`npc_store`], [`quest_store`], [`location_store`] -- Out-of-band
//!   child entity writes
//! - [`plot_store`] -- Versioned plot graph persistence
//! - [`planning_store`] -- Completed planner run records
//! - [`error`] -- Shared error type ([`StoreError`])

pub mod error;
pub mod event_store;
pub mod game_store;
pub mod location_store;
pub mod npc_store;
pub mod planning_store;
pub mod plot_store;
pub mod quest_store;
pub mod sqlite;
pub mod state_store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use event_store::{EventFilter, EventRow, EventStore};
pub use game_store::{GameRow, GameStore};
pub use location_store::LocationStore;
pub use npc_store::NpcStore;
pub use planning_store::PlanningStore;
pub use plot_store::PlotStore;
pub use quest_store::QuestStore;
pub use sqlite::{SqliteConfig, SqliteStore};
pub use state_store::{LoadedState, SkippedChild, StateStore};
