//! The skill subsystem: execution, action-insight learning, evolution,
//! fusion, and cooldown management.
//!
//! # Sub-behaviours
//!
//! - [`execution`] -- Validate cooldown/affordability, apply effects with
//!   rarity and level scaling, award skill XP
//! - [`insight`] -- Classify free-text actions into tokens, track
//!   repetitions, reveal partial skills, grant full skills
//! - [`evolution`] -- Replace a max-level skill with one of its paths
//! - [`fusion`] -- Match owned skills against recipes, consume inputs,
//!   produce the result
//! - [`cooldown`] -- Per-combat-turn cooldown ticks and readiness checks
//! - [`catalog`] -- Built-in skill definitions granted by insight, fusion,
//!   and evolution

pub mod catalog;
pub mod cooldown;
pub mod evolution;
pub mod execution;
pub mod fusion;
pub mod insight;
