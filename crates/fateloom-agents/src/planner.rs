//! The story planner: orchestrates the perspective council and commits
//! its consensus into a new plot graph version.
//!
//! Runs in two modes. **Initial** planning happens synchronously at game
//! creation; **periodic** planning is spawned in the background whenever
//! the player crosses the replan level, and a newer invocation for the
//! same game supersedes an in-flight one (the engine aborts the stale
//! task and its partial results are discarded without persistence).
//!
//! Each perspective agent runs as its own task with its own session and
//! an individual deadline; one slow or broken voice degrades the council
//! to the remaining voices instead of stalling the run.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::timeout;

use fateloom_plot::consensus::run_consensus;
use fateloom_plot::graph::merge_into_next_version;
use fateloom_types::enums::PerspectiveKind;
use fateloom_types::game::{GameConfig, GameState};
use fateloom_types::ids::PlanningSessionId;
use fateloom_types::plot::{AgentProposal, PlanningSession, PlotGraph, SystemDefinition};

use crate::ensemble::AgentDeps;
use crate::ensemble::perspective::PerspectiveAgent;
use crate::ensemble::system_definer::SystemDefiner;

/// How far past the player's level the council plans, in levels.
const PLANNING_HORIZON: u32 = 10;

/// The committed output of one planner run.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// The next graph version (previous non-terminal content plus
    /// accepted additions).
    pub graph: PlotGraph,
    /// The session record linking proposals to consensus.
    pub session: PlanningSession,
    /// The (re)produced system definition.
    pub definition: SystemDefinition,
}

/// The story planner.
pub struct Planner {
    deps: AgentDeps,
    per_agent_timeout: Duration,
}

impl Planner {
    /// Create a planner with a per-perspective deadline.
    pub const fn new(deps: AgentDeps, per_agent_timeout: Duration) -> Self {
        Self {
            deps,
            per_agent_timeout,
        }
    }

    /// Execute one full planning run against a frozen state snapshot.
    ///
    /// Never fails: missing or broken perspectives contribute empty
    /// proposals and the consensus engine works with what arrived.
    pub async fn run(
        &self,
        config: &GameConfig,
        state: &GameState,
        previous: &PlotGraph,
    ) -> PlanOutcome {
        let started = std::time::Instant::now();

        // --- 1. Refresh the system definition ---
        let mut definer = SystemDefiner::start(self.deps.clone());
        let definition = definer.define(config).await;

        // --- 2. Dispatch the perspective council in parallel ---
        let level_ceiling = state.character.level.saturating_add(PLANNING_HORIZON);
        let mut join_set: JoinSet<AgentProposal> = JoinSet::new();
        for kind in PerspectiveKind::ALL {
            let deps = self.deps.clone();
            let state = state.clone();
            let definition = definition.clone();
            let previous = previous.clone();
            let deadline = self.per_agent_timeout;
            join_set.spawn(async move {
                let mut agent = PerspectiveAgent::start(deps, kind);
                match timeout(
                    deadline,
                    agent.propose(&state, &definition, &previous, level_ceiling),
                )
                .await
                {
                    Ok(proposal) => proposal,
                    Err(_) => {
                        tracing::warn!(
                            kind = ?kind,
                            timeout = ?deadline,
                            "perspective agent deadline exceeded, contributing empty proposal"
                        );
                        AgentProposal::empty(
                            format!("perspective:{kind:?}").to_lowercase(),
                            kind,
                        )
                    }
                }
            });
        }

        // --- 3. Collect; panicked tasks degrade to empty proposals ---
        let mut proposals = Vec::with_capacity(PerspectiveKind::ALL.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(proposal) => proposals.push(proposal),
                Err(e) => {
                    tracing::warn!(error = %e, "perspective task failed to join");
                }
            }
        }
        // Deterministic order for the session record.
        proposals.sort_by_key(|p| p.agent_id.clone());

        // --- 4. Consensus ---
        let consensus = run_consensus(&proposals, previous);

        // --- 5. Next graph version ---
        let graph = merge_into_next_version(
            previous,
            &consensus.accepted_nodes,
            &consensus.accepted_edges,
        );

        // --- 6. Session record and next replan level ---
        let next_replan_level = state
            .character
            .level
            .saturating_add(state.character.grade.replan_stride());
        let session = PlanningSession {
            id: PlanningSessionId::new(),
            game_id: state.game_id,
            player_level: state.character.level,
            proposals,
            consensus,
            graph_version: graph.version,
            next_replan_level,
            created_at: Utc::now(),
        };

        tracing::info!(
            game_id = %state.game_id,
            graph_version = graph.version,
            accepted = session.consensus.accepted_nodes.len(),
            consensus = ?session.consensus.consensus_type,
            next_replan_level = next_replan_level,
            elapsed = ?started.elapsed(),
            "planning run complete"
        );

        PlanOutcome {
            graph,
            session,
            definition,
        }
    }
}
