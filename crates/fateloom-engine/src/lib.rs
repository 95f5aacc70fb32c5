//! Turn orchestration and composition for the Fateloom narrative engine.
//!
//! The engine owns the per-game serial pipelines: each player input flows
//! through intent classification, validation, tool dispatch, insight
//! tracking, plot trigger evaluation, streamed narration, and a
//! transactional commit. Background planning runs as per-game tasks with
//! supersession. The process holds one dependency bundle constructed at
//! startup; there is no global mutable state.
//!
//! # Modules
//!
//! - [`config`] -- File + environment configuration
//! - [`session`] -- Game sessions, the registry, planner supersession
//! - [`orchestrator`] -- The nine-step turn pipeline
//! - [`tools`] -- The typed, side-effect-classified tool layer
//! - [`ui`] -- The engine side of the UI transport contract
//! - [`error`] -- Error types ([`EngineError`])

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod tools;
pub mod ui;

pub use config::EngineConfig;
pub use error::EngineError;
pub use orchestrator::TurnReport;
pub use session::{Engine, EngineDeps, GameSession};
pub use tools::{Mutation, SideEffect, ToolOutcome, ToolRequest};
pub use ui::{UiMessage, UiOutput};
