//! Plot graph and consensus engines.
//!
//! The **graph engine** evaluates trigger eligibility, advances node
//! statuses along their monotone lifecycle, queues foreshadowing hints for
//! the narrator, and repairs structural damage (dangling edges) without
//! ever failing a turn. The **consensus engine** merges the perspective
//! agents' proposals into an accepted node/edge set by rating, priority,
//! and structural checks.
//!
//! Both engines are pure: they consume immutable graph snapshots and
//! return new ones. Versioning and atomic swaps belong to the planner and
//! the persistence layer.
//!
//! # Modules
//!
//! - [`graph`] -- Trigger evaluation, status transitions, foreshadowing,
//!   sanitisation, version merging
//! - [`consensus`] -- Proposal dedup/merge, thresholding, re-sequencing,
//!   cycle breaking, conflict detection
//! - [`error`] -- Error types ([`PlotError`])

pub mod consensus;
pub mod error;
pub mod graph;

pub use consensus::{ConsensusEngine, run_consensus};
pub use error::PlotError;
pub use graph::{
    ForeshadowHint, TriggerOutcome, complete_node, eligible_to_trigger, evaluate_triggers,
    merge_into_next_version, sanitize_graph, threads,
};
