//! Error types for the engine.

use fateloom_types::ids::GameId;

/// Errors from the turn pipeline and game lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The persistence layer failed.
    #[error("store error: {0}")]
    Store(#[from] fateloom_db::StoreError),

    /// A gameplay rule rejected the action.
    #[error("rules error: {0}")]
    Rules(#[from] fateloom_rules::RulesError),

    /// A plot graph operation failed.
    #[error("plot error: {0}")]
    Plot(#[from] fateloom_plot::PlotError),

    /// A world transition failed.
    #[error("world error: {0}")]
    World(#[from] fateloom_world::registry::WorldError),

    /// An agent call failed beyond its fallbacks.
    #[error("agent error: {0}")]
    Agent(#[from] fateloom_agents::AgentError),

    /// A turn is already in flight for this game. The caller does not
    /// queue; the UI gates input.
    #[error("a turn is already in progress for game {0}")]
    Busy(GameId),

    /// No session is loaded for this game.
    #[error("unknown game: {0}")]
    UnknownGame(GameId),

    /// The player's action failed validation. Rendered as a system
    /// notification, never a crash.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}
