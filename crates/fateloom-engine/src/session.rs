//! Game sessions and the engine registry.
//!
//! One [`GameSession`] exists per loaded game. It owns the in-memory
//! `GameState` cell (replaced only under the per-game turn gate), the
//! read-copy-update plot graph reference, the per-game agent set, and the
//! planner supersession bookkeeping. Turns for different games proceed in
//! parallel; a second turn for the same game is rejected with `Busy`
//! rather than queued.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use fateloom_agents::{
    AgentDeps, IntentAnalyzer, LocationGenerator, Narrator, NpcGenerator, Planner, PromptEngine,
    QuestGenerator, create_backend,
};
use fateloom_db::{
    GameStore, PlanningStore, PlotStore, SqliteConfig, SqliteStore, StateStore,
};
use fateloom_types::character::CharacterSheet;
use fateloom_types::game::{Game, GameConfig, GameState};
use fateloom_types::ids::{GameId, LocationId};
use fateloom_types::plot::{PlotGraph, SystemDefinition};
use fateloom_world::templates::{STARTING_LOCATION, template_location};

use crate::config::EngineConfig;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Dependency bundle
// ---------------------------------------------------------------------------

/// The process-wide dependency bundle, constructed once at startup and
/// threaded through calls. There is no global mutable state.
pub struct EngineDeps {
    /// The save-game store.
    pub store: SqliteStore,
    /// Shared agent construction dependencies.
    pub agent_deps: AgentDeps,
    /// The story planner.
    pub planner: Arc<Planner>,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl EngineDeps {
    /// Build the bundle from configuration: open the database, run
    /// migrations, construct the backend, planner, and prompt engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the database or prompt engine fails to
    /// initialise.
    pub async fn bootstrap(config: EngineConfig) -> Result<Self, EngineError> {
        let store = SqliteStore::connect(&SqliteConfig::new(&config.database.path)).await?;
        store.run_migrations().await?;

        let backend = Arc::new(create_backend(&config.llm));
        let prompts = Arc::new(PromptEngine::new()?);
        let agent_deps = AgentDeps::new(backend, config.resilience.clone(), prompts);
        let planner = Arc::new(Planner::new(
            agent_deps.clone(),
            std::time::Duration::from_millis(config.planner.per_agent_timeout_ms),
        ));

        Ok(Self {
            store,
            agent_deps,
            planner,
            config,
        })
    }

    /// Build the bundle against an in-memory database (tests).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if initialisation fails.
    pub async fn bootstrap_in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        let store = SqliteStore::connect_in_memory().await?;
        store.run_migrations().await?;

        let backend = Arc::new(create_backend(&config.llm));
        let prompts = Arc::new(PromptEngine::new()?);
        let agent_deps = AgentDeps::new(backend, config.resilience.clone(), prompts);
        let planner = Arc::new(Planner::new(
            agent_deps.clone(),
            std::time::Duration::from_millis(config.planner.per_agent_timeout_ms),
        ));

        Ok(Self {
            store,
            agent_deps,
            planner,
            config,
        })
    }
}

// ---------------------------------------------------------------------------
// Per-game agents
// ---------------------------------------------------------------------------

/// The agent set owned by one game session. Each agent carries its own
/// conversation memory; the orchestrator never mutates that memory
/// directly.
pub struct SessionAgents {
    /// Intent classification.
    pub intent: IntentAnalyzer,
    /// Turn narration.
    pub narrator: Narrator,
    /// NPC generation.
    pub npc_gen: NpcGenerator,
    /// Location generation.
    pub location_gen: LocationGenerator,
    /// Quest generation.
    pub quest_gen: QuestGenerator,
}

impl SessionAgents {
    fn start(deps: &AgentDeps, definition: &SystemDefinition) -> Self {
        Self {
            intent: IntentAnalyzer::start(deps.clone()),
            narrator: Narrator::start(deps.clone(), &definition.personality),
            npc_gen: NpcGenerator::start(deps.clone()),
            location_gen: LocationGenerator::start(deps.clone()),
            quest_gen: QuestGenerator::start(deps.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Game session
// ---------------------------------------------------------------------------

/// One loaded game: state cell, plot reference, agents, and planner
/// bookkeeping.
pub struct GameSession {
    /// The game row (identity, seed, difficulty).
    pub game: Game,
    /// The creation configuration (reconstructed on load).
    pub config: GameConfig,
    /// The in-memory state cell. Replaced only under the turn gate.
    pub state: Mutex<GameState>,
    /// The current plot graph (read-copy-update: readers clone the Arc,
    /// the planner swaps it).
    pub plot: Mutex<Arc<PlotGraph>>,
    /// The campaign's system identity.
    pub definition: Mutex<SystemDefinition>,
    /// The per-game agent set.
    pub agents: Mutex<SessionAgents>,
    /// Serialises turns; `try_lock` failure means a turn is in flight.
    pub turn_gate: Mutex<()>,
    /// Total turns taken, also the combat PRNG stream selector.
    pub turn_counter: AtomicU64,
    /// Accumulated play time.
    pub playtime_seconds: AtomicU64,
    /// Player level at which the next periodic replan fires.
    pub next_replan_level: AtomicU32,
    /// Identity counter for planner supersession.
    planner_invocation: AtomicU64,
    /// The in-flight planner task, if any.
    planner_handle: Mutex<Option<JoinHandle<()>>>,
}

impl GameSession {
    /// The level at which the planner should next run.
    pub fn replan_due(&self, level: u32) -> bool {
        level >= self.next_replan_level.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The engine: the registry of loaded sessions plus the shared bundle.
pub struct Engine {
    /// The dependency bundle.
    pub deps: Arc<EngineDeps>,
    sessions: Mutex<BTreeMap<GameId, Arc<GameSession>>>,
}

impl Engine {
    /// Create an engine around a bootstrapped bundle.
    pub const fn new(deps: Arc<EngineDeps>) -> Self {
        Self {
            deps,
            sessions: Mutex::const_new(BTreeMap::new()),
        }
    }

    /// Fetch a loaded session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownGame`] if the game is not loaded.
    pub async fn session(&self, game_id: GameId) -> Result<Arc<GameSession>, EngineError> {
        self.sessions
            .lock()
            .await
            .get(&game_id)
            .cloned()
            .ok_or(EngineError::UnknownGame(game_id))
    }

    /// Create a new game: identity row, initial state at the starting
    /// location, and a synchronous initial planning run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if persistence fails.
    pub async fn create_game(&self, config: GameConfig) -> Result<Arc<GameSession>, EngineError> {
        let now = Utc::now();
        let game = Game {
            id: GameId::new(),
            player_name: config.player_name.clone(),
            system_type: config.system_type,
            difficulty: config.difficulty,
            level: 1,
            playtime_seconds: 0,
            seed: rand::random(),
            created_at: now,
            updated_at: now,
        };

        let starting = template_location(&LocationId::from(STARTING_LOCATION))
            .ok_or_else(|| EngineError::Config(String::from("starting location missing")))?;
        let state = GameState {
            game_id: game.id,
            system_type: config.system_type,
            world_settings: config.world_settings.clone(),
            character: CharacterSheet::new_level_one(),
            current_location: starting,
            player_name: config.player_name.clone(),
            backstory: config.backstory.clone(),
            discovered_locations: [LocationId::from(STARTING_LOCATION)].into_iter().collect(),
            custom_locations: BTreeMap::new(),
            npcs_by_location: BTreeMap::new(),
            active_quests: BTreeMap::new(),
            completed_quests: std::collections::BTreeSet::new(),
            death_count: 0,
            opening_narration_played: false,
        };

        GameStore::new(&self.deps.store).create_game(&game).await?;
        StateStore::new(&self.deps.store).save_game(&state, 0).await?;

        // Initial planning is synchronous: the opening narration needs a
        // graph to foreshadow from.
        let previous = PlotGraph::empty(game.id);
        let outcome = self.deps.planner.run(&config, &state, &previous).await;
        PlotStore::new(&self.deps.store)
            .save_plot_graph(&outcome.graph)
            .await?;
        PlanningStore::new(&self.deps.store)
            .save_planning_session(&outcome.session)
            .await?;

        let session = Arc::new(GameSession {
            agents: Mutex::new(SessionAgents::start(
                &self.deps.agent_deps,
                &outcome.definition,
            )),
            game,
            config,
            state: Mutex::new(state),
            plot: Mutex::new(Arc::new(outcome.graph)),
            definition: Mutex::new(outcome.definition),
            turn_gate: Mutex::new(()),
            turn_counter: AtomicU64::new(0),
            playtime_seconds: AtomicU64::new(0),
            next_replan_level: AtomicU32::new(outcome.session.next_replan_level),
            planner_invocation: AtomicU64::new(0),
            planner_handle: Mutex::new(None),
        });
        self.sessions
            .lock()
            .await
            .insert(session.game.id, session.clone());
        tracing::info!(game_id = %session.game.id, player = session.game.player_name, "game created");
        Ok(session)
    }

    /// Load an existing game from the store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the game or its state is missing.
    pub async fn load_game(&self, game_id: GameId) -> Result<Arc<GameSession>, EngineError> {
        let game = GameStore::new(&self.deps.store).get_game(game_id).await?;
        let loaded = StateStore::new(&self.deps.store).load_state(game_id).await?;
        for skipped in &loaded.skipped {
            tracing::warn!(entity = skipped.entity, id = skipped.id, "corrupt child skipped on load");
        }

        let plot = match PlotStore::new(&self.deps.store).load_plot_graph(game_id).await {
            Ok(graph) => graph,
            Err(fateloom_db::StoreError::NotFound(_)) => PlotGraph::empty(game_id),
            Err(e) => return Err(e.into()),
        };
        // Repair any structural damage before the graph goes live.
        let (plot, dropped) = fateloom_plot::sanitize_graph(&plot);
        if !dropped.is_empty() {
            tracing::warn!(count = dropped.len(), "dropped dangling plot edges on load");
        }

        let config = GameConfig {
            player_name: game.player_name.clone(),
            system_type: game.system_type,
            difficulty: game.difficulty,
            world_settings: loaded.state.world_settings.clone(),
            backstory: loaded.state.backstory.clone(),
        };
        // Refresh the definition without a model call; the next planner
        // run will overwrite it.
        let definition = fateloom_agents::default_definition(&config);
        let next_replan = PlanningStore::new(&self.deps.store)
            .load_planning_sessions(game_id)
            .await?
            .last()
            .map_or_else(
                || {
                    loaded
                        .state
                        .character
                        .level
                        .saturating_add(loaded.state.character.grade.replan_stride())
                },
                |s| s.next_replan_level,
            );

        let session = Arc::new(GameSession {
            agents: Mutex::new(SessionAgents::start(&self.deps.agent_deps, &definition)),
            playtime_seconds: AtomicU64::new(game.playtime_seconds),
            game,
            config,
            state: Mutex::new(loaded.state),
            plot: Mutex::new(Arc::new(plot)),
            definition: Mutex::new(definition),
            turn_gate: Mutex::new(()),
            turn_counter: AtomicU64::new(0),
            next_replan_level: AtomicU32::new(next_replan),
            planner_invocation: AtomicU64::new(0),
            planner_handle: Mutex::new(None),
        });
        self.sessions
            .lock()
            .await
            .insert(game_id, session.clone());
        Ok(session)
    }

    /// Schedule a background planner run for a session, superseding any
    /// in-flight run for the same game: the stale task is aborted and its
    /// partial results are discarded without persistence.
    pub async fn schedule_replan(&self, session: &Arc<GameSession>) {
        let invocation = session
            .planner_invocation
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);

        // Supersede: abort whatever is still running.
        if let Some(stale) = session.planner_handle.lock().await.take() {
            stale.abort();
            tracing::info!(
                game_id = %session.game.id,
                invocation = invocation,
                "superseded in-flight planner run"
            );
        }

        let deps = self.deps.clone();
        let session_ref = session.clone();
        let handle = tokio::spawn(async move {
            let snapshot = session_ref.state.lock().await.clone();
            let previous = session_ref.plot.lock().await.clone();
            let outcome = deps
                .planner
                .run(&session_ref.config, &snapshot, &previous)
                .await;

            // A newer invocation may have started while we planned; if
            // so, discard everything (no PlanningSession row either).
            if session_ref.planner_invocation.load(Ordering::Acquire) != invocation {
                tracing::info!(
                    game_id = %session_ref.game.id,
                    invocation = invocation,
                    "planner run superseded after completion, discarding"
                );
                return;
            }

            if let Err(e) = PlotStore::new(&deps.store).save_plot_graph(&outcome.graph).await {
                tracing::warn!(game_id = %session_ref.game.id, error = %e, "plot graph save failed");
                return;
            }
            if let Err(e) = PlanningStore::new(&deps.store)
                .save_planning_session(&outcome.session)
                .await
            {
                tracing::warn!(game_id = %session_ref.game.id, error = %e, "planning session save failed");
                return;
            }

            // Atomic swap: readers mid-turn keep their version.
            *session_ref.plot.lock().await = Arc::new(outcome.graph);
            *session_ref.definition.lock().await = outcome.definition;
            session_ref
                .next_replan_level
                .store(outcome.session.next_replan_level, Ordering::Release);
        });
        *session.planner_handle.lock().await = Some(handle);
    }

    /// Await the current planner task, if any (tests and shutdown).
    pub async fn drain_planner(&self, session: &Arc<GameSession>) {
        let handle = session.planner_handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
