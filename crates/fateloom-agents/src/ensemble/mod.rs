//! The specialised agent ensemble.
//!
//! Every agent is a [`ChatSession`](crate::session::ChatSession) with a
//! single system directive and its own conversation memory; agents
//! sharing a backend still hold independent sessions. The orchestrator
//! talks to agents through typed methods, never raw prompts.
//!
//! # Agents
//!
//! - [`intent`] -- Classifies player input, with deterministic fallback
//!   heuristics when the model misbehaves
//! - [`narrator`] -- Streams the turn's narration
//! - [`generators`] -- NPC, location, and quest generators with minimal
//!   defaults on unrecoverable output
//! - [`perspective`] -- The four planning perspectives, producing rated
//!   plot proposals
//! - [`system_definer`] -- Produces the campaign's system identity

pub mod generators;
pub mod intent;
pub mod narrator;
pub mod perspective;
pub mod system_definer;

use std::sync::Arc;

use crate::backend::LlmBackend;
use crate::config::ResilienceConfig;
use crate::prompt::PromptEngine;

/// Shared construction dependencies for every agent.
#[derive(Clone)]
pub struct AgentDeps {
    /// The LLM backend (shared; sessions are per-agent).
    pub backend: Arc<LlmBackend>,
    /// Resilience settings applied to every call.
    pub resilience: ResilienceConfig,
    /// The embedded prompt templates.
    pub prompts: Arc<PromptEngine>,
}

impl AgentDeps {
    /// Bundle the shared dependencies.
    pub const fn new(
        backend: Arc<LlmBackend>,
        resilience: ResilienceConfig,
        prompts: Arc<PromptEngine>,
    ) -> Self {
        Self {
            backend,
            resilience,
            prompts,
        }
    }
}
