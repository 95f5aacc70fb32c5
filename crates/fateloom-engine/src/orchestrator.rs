//! The per-turn pipeline.
//!
//! For each player input: freeze a snapshot, classify intent, validate,
//! dispatch to the intent handler, track action insight, evaluate plot
//! triggers, narrate (streamed), commit events and state, advance
//! playtime and schedule replanning. Steps run serialised per game under
//! the session's turn gate; a second submission while a turn is in
//! flight returns `Busy` without queueing.
//!
//! Cancelling the narration stream discards uncommitted narrator text but
//! keeps the state mutations already applied by the dispatch step.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use rand::SeedableRng;
use rand::rngs::StdRng;

use fateloom_agents::NarrationContext;
use fateloom_db::event_store::{EventFilter, EventStore};
use fateloom_db::{NpcStore, StateStore};
use fateloom_plot::graph::evaluate_triggers;
use fateloom_rules::skills::insight::{ActionContext, track_action};
use fateloom_types::enums::{EventImportance, Intent, NodeStatus, QuestStatus};
use fateloom_types::event::{GameEvent, GameEventBody};
use fateloom_types::game::GameState;
use fateloom_types::ids::SkillId;

use crate::error::EngineError;
use crate::session::{Engine, GameSession};
use crate::tools::{Mutation, ToolRequest, apply_mutations, run_tool, validate_action};
use crate::ui::{UiMessage, UiOutput};

/// Cap on idle time credited to playtime between turns.
const MAX_IDLE_CREDIT_SECS: u64 = 300;

/// How many recent events feed the narrator's context.
const RECENT_EVENT_WINDOW: u32 = 10;

/// The committed result of one turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The classified intent.
    pub intent: Intent,
    /// Events logged this turn, in commit order.
    pub events: Vec<GameEvent>,
    /// The full narration text (empty when the turn was menu-only or
    /// rejected).
    pub narration: String,
    /// A rendered view, for menu intents.
    pub view: Option<String>,
}

impl Engine {
    /// Run one turn for a game.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`] when a turn is already in flight,
    /// [`EngineError::UnknownGame`] for unloaded games, and store errors
    /// when the commit itself fails. Validation failures are *not*
    /// errors: they commit a system notification and return normally.
    pub async fn run_turn(
        &self,
        session: &Arc<GameSession>,
        input: &str,
        ui: &UiOutput,
    ) -> Result<TurnReport, EngineError> {
        // --- Serialisation: one pipeline per game, no queueing ---
        let Ok(_gate) = session.turn_gate.try_lock() else {
            return Err(EngineError::Busy(session.game.id));
        };
        let turn_started = Instant::now();
        let turn = session.turn_counter.fetch_add(1, Ordering::AcqRel);
        let input = input.trim_end_matches(['\n', '\r']).trim();

        // --- Step 1: freeze the snapshot ---
        let frozen = session.state.lock().await.clone();
        let mut events: Vec<GameEvent> = Vec::new();

        // --- Step 2: classify ---
        let analysis = {
            let mut agents = session.agents.lock().await;
            agents.intent.analyze(input, &frozen).await
        };
        tracing::debug!(
            game_id = %session.game.id,
            turn = turn,
            intent = ?analysis.intent,
            target = ?analysis.target,
            fallback = analysis.from_fallback,
            "intent classified"
        );

        // --- Step 3: validate ---
        if let Err(EngineError::InvalidAction(message)) =
            validate_action(analysis.intent, analysis.target.as_deref(), &frozen)
        {
            let event = GameEvent::new(
                session.game.id,
                GameEventBody::SystemNotification {
                    message: message.clone(),
                },
            );
            EventStore::new(&self.deps.store).log_event(&event).await?;
            ui.emit_notification(message).await;
            ui.emit(UiMessage::TurnComplete).await;
            return Ok(TurnReport {
                intent: analysis.intent,
                events: vec![event],
                narration: String::new(),
                view: None,
            });
        }

        // --- Step 4: dispatch ---
        let mut working = frozen.clone();
        let mut summaries: Vec<String> = Vec::new();
        let mut view: Option<String> = None;
        if let Err(error) = self
            .dispatch_intent(
                session,
                &mut working,
                analysis.intent,
                analysis.target.as_deref(),
                input,
                turn,
                &mut events,
                &mut summaries,
                &mut view,
            )
            .await
        {
            match error {
                // Infrastructure failures are real errors.
                EngineError::Store(_) => return Err(error),
                // Everything else is player-visible: notify, commit the
                // notification, keep the state untouched.
                other => {
                    let message = other.to_string();
                    let event = GameEvent::new(
                        session.game.id,
                        GameEventBody::SystemNotification {
                            message: message.clone(),
                        },
                    );
                    EventStore::new(&self.deps.store).log_event(&event).await?;
                    ui.emit_notification(message).await;
                    ui.emit(UiMessage::TurnComplete).await;
                    return Ok(TurnReport {
                        intent: analysis.intent,
                        events: vec![event],
                        narration: String::new(),
                        view: None,
                    });
                }
            }
        }

        // --- Step 5: track actions for insight (all intents) ---
        let insight_context = ActionContext {
            weapon: working.character.equipment.weapon_type(),
            location_tags: working.current_location.tags.clone(),
            in_combat: analysis.intent == Intent::Combat,
        };
        let insight = track_action(&working.character, input, &insight_context);
        working.character = insight.sheet;
        for progress in &insight.progress {
            events.push(GameEvent::new(
                session.game.id,
                GameEventBody::InsightProgress {
                    action_type: progress.action_type.clone(),
                    hint: progress.hint.clone(),
                    percent: progress.percent,
                },
            ));
        }
        for skill in &insight.newly_granted {
            if let fateloom_types::skill::AcquisitionSource::ActionInsight {
                action_type,
                repetitions,
            } = &skill.source
            {
                events.push(GameEvent::new(
                    session.game.id,
                    GameEventBody::LearnedFromInsight {
                        skill_id: skill.id.clone(),
                        action_type: action_type.clone(),
                        repetitions: *repetitions,
                    },
                ));
            }
            summaries.push(format!("a new skill crystallised: {}", skill.name));
        }

        // --- Step 6: plot triggers against the turn's graph version ---
        let graph = session.plot.lock().await.clone();
        let trigger_outcome = evaluate_triggers(&graph, working.character.level);
        let mut foreshadowing: Vec<String> = Vec::new();
        let mut upcoming_beats: Vec<String> = Vec::new();
        if !trigger_outcome.triggered.is_empty() || !trigger_outcome.stale_hints.is_empty() {
            let plot_store = fateloom_db::PlotStore::new(&self.deps.store);
            for node_id in &trigger_outcome.triggered {
                if let Some(node) = trigger_outcome.graph.nodes.get(node_id) {
                    events.push(GameEvent::new(
                        session.game.id,
                        GameEventBody::BeatTriggered {
                            node_id: node_id.clone(),
                            title: node.beat.title.clone(),
                        },
                    ));
                    upcoming_beats.push(node.beat.title.clone());
                }
                if let Err(e) = plot_store
                    .update_node_status(session.game.id, node_id, NodeStatus::Triggered)
                    .await
                {
                    // Graph inconsistency never crashes the turn.
                    tracing::warn!(node = %node_id, error = %e, "node status persist failed");
                }
            }
            for stale in &trigger_outcome.stale_hints {
                events.push(GameEvent::new(
                    session.game.id,
                    GameEventBody::SystemNotification {
                        message: format!("a moment passed unremarked: {}", stale.hint),
                    },
                ));
            }
            *session.plot.lock().await = Arc::new(trigger_outcome.graph.clone());
        }
        for hint in &trigger_outcome.foreshadow_queue {
            foreshadowing.push(hint.hint.clone());
        }

        // --- Step 7: narrate (streamed, cancellable) ---
        let narration = if let Some(view_text) = &view {
            // Menu turns render the view verbatim; no narrator call.
            ui.emit_notification(view_text.clone()).await;
            String::new()
        } else {
            self.narrate_turn(
                session,
                &working,
                input,
                analysis.intent,
                &summaries,
                &upcoming_beats,
                &foreshadowing,
                ui,
                &mut events,
            )
            .await?
        };

        // NPC dialogue records the exchange with the narration as the
        // reply, after the stream completes.
        if analysis.intent == Intent::NpcDialogue
            && !narration.is_empty()
            && let Some(target) = analysis.target.as_deref()
        {
            self.record_dialogue(session, &mut working, target, input, &narration, &mut events)
                .await?;
        }

        if !working.opening_narration_played {
            working.opening_narration_played = true;
        }

        // --- Step 8: commit ---
        // Consistency check before anything durable happens; a breach is
        // logged loudly but the turn still commits (never crash the
        // pipeline on an invariant report).
        for violation in working.invariant_violations() {
            tracing::error!(game_id = %session.game.id, violation = violation, "state invariant breach");
            events.push(
                GameEvent::new(
                    session.game.id,
                    GameEventBody::SystemNotification {
                        message: format!("invariant breach: {violation}"),
                    },
                )
                .with_importance(EventImportance::High),
            );
        }

        // --- Step 9 (first half): playtime accounting feeds the save ---
        let elapsed = turn_started.elapsed().as_secs().min(MAX_IDLE_CREDIT_SECS);
        let playtime = session
            .playtime_seconds
            .fetch_add(elapsed, Ordering::AcqRel)
            .saturating_add(elapsed);

        // State first, then the event batch: events are derived records,
        // so a crash between the two costs log lines, never state.
        StateStore::new(&self.deps.store)
            .save_game(&working, playtime)
            .await?;
        EventStore::new(&self.deps.store).log_events(&events).await?;
        *session.state.lock().await = working.clone();

        // --- Step 9 (second half): background replanning ---
        if session.replan_due(working.character.level) {
            tracing::info!(
                game_id = %session.game.id,
                level = working.character.level,
                "replan level reached, scheduling planner"
            );
            self.schedule_replan(session).await;
        }

        ui.emit(UiMessage::TurnComplete).await;
        Ok(TurnReport {
            intent: analysis.intent,
            events,
            narration,
            view,
        })
    }

    /// Step 4's intent routing.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_intent(
        &self,
        session: &Arc<GameSession>,
        working: &mut GameState,
        intent: Intent,
        target: Option<&str>,
        input: &str,
        turn: u64,
        events: &mut Vec<GameEvent>,
        summaries: &mut Vec<String>,
        view: &mut Option<String>,
    ) -> Result<(), EngineError> {
        let game_id = session.game.id;

        match intent {
            Intent::Combat => {
                let target = target.unwrap_or("foe").to_owned();
                apply_tool(
                    session,
                    turn,
                    &ToolRequest::ResolveCombat { target },
                    working,
                    events,
                    summaries,
                    view,
                )?;
                // Combat turns tick every skill cooldown once.
                working.character =
                    fateloom_rules::tick_skill_cooldowns(&working.character);
                if working.character.dead {
                    // Respawn at the current location; the death was
                    // already counted by the combat tool.
                    working.character = fateloom_rules::sheet::respawn(&working.character);
                    summaries.push(String::from("death took its toll, but the system returned you"));
                }
            }
            Intent::NpcDialogue => {
                // The exchange itself is recorded after narration; here
                // the dialogue only shapes the narrator's context.
                if let Some(target) = target {
                    summaries.push(format!("spoke with {target}"));
                }
            }
            Intent::UseSkill => {
                let Some(target) = target else {
                    return Ok(());
                };
                let skill_id = SkillId::from(target);
                let outcome = fateloom_rules::execute_skill(&working.character, &skill_id, 0, 0)?;
                working.character = outcome.sheet.clone();
                let mut line = format!("used {skill_id}");
                if outcome.damage_to_target > 0 {
                    line.push_str(&format!(", dealing {} damage", outcome.damage_to_target));
                }
                if outcome.healing > 0 {
                    line.push_str(&format!(", restoring {} HP", outcome.healing));
                }
                events.push(GameEvent::new(
                    game_id,
                    GameEventBody::StatChange {
                        description: line.clone(),
                    },
                ));
                summaries.push(line);
                if outcome.leveled_up {
                    summaries.push(format!(
                        "{skill_id} sharpened to level {}",
                        outcome.skill_level
                    ));
                }
            }
            Intent::SkillEvolution => {
                self.handle_evolution(game_id, working, input, events, summaries)?;
            }
            Intent::SkillFusion => {
                self.handle_fusion(game_id, working, input, events, summaries)?;
            }
            Intent::Exploration => {
                self.handle_exploration(session, working, input, events, summaries)
                    .await?;
            }
            Intent::QuestAction => {
                self.handle_quest_action(session, working, input, events, summaries)
                    .await?;
            }
            Intent::ClassSelection => {
                handle_class_selection(game_id, working, target, events, summaries);
            }
            Intent::StatusMenu => {
                apply_tool(session, turn, &ToolRequest::PlayerStatus, working, events, summaries, view)?;
            }
            Intent::InventoryMenu => {
                apply_tool(session, turn, &ToolRequest::InventoryView, working, events, summaries, view)?;
            }
            Intent::SkillMenu => {
                apply_tool(session, turn, &ToolRequest::SkillMenu, working, events, summaries, view)?;
            }
            Intent::SystemQuery => {
                // The system answers through the narrator; no mutation.
                summaries.push(String::from("the system considers the question"));
            }
        }
        Ok(())
    }

    /// Evolution: the input names the path target (`"evolve power_strike
    /// into crushing_blow"`), or the first available path is taken.
    fn handle_evolution(
        &self,
        game_id: fateloom_types::ids::GameId,
        working: &mut GameState,
        input: &str,
        events: &mut Vec<GameEvent>,
        summaries: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let lowered = input.to_lowercase();
        let candidate = working
            .character
            .skills
            .iter()
            .filter(|s| s.at_max_level() && !s.evolution_paths.is_empty())
            .find(|s| lowered.contains(s.id.as_str()) || lowered.contains(&s.name.to_lowercase()))
            .or_else(|| {
                working
                    .character
                    .skills
                    .iter()
                    .find(|s| s.at_max_level() && !s.evolution_paths.is_empty())
            });
        let Some(skill) = candidate else {
            return Err(EngineError::InvalidAction(String::from(
                "Nothing is ready to evolve.",
            )));
        };
        let path_target = skill
            .evolution_paths
            .iter()
            .find(|p| lowered.contains(p.target.as_str()))
            .or_else(|| skill.evolution_paths.first())
            .map(|p| p.target.clone());
        let Some(target) = path_target else {
            return Err(EngineError::InvalidAction(String::from(
                "No evolution path presents itself.",
            )));
        };
        let skill_id = skill.id.clone();
        let outcome = fateloom_rules::evolve_skill(&working.character, &skill_id, &target)?;
        working.character = outcome.sheet;
        events.push(GameEvent::new(
            game_id,
            GameEventBody::SkillEvolved {
                from: outcome.from.clone(),
                to: target.clone(),
            },
        ));
        summaries.push(format!("{} evolved into {}", outcome.from, outcome.evolved.name));
        Ok(())
    }

    /// Fusion: collect the named skills from the input and match them
    /// against the recipe table.
    fn handle_fusion(
        &self,
        game_id: fateloom_types::ids::GameId,
        working: &mut GameState,
        input: &str,
        events: &mut Vec<GameEvent>,
        summaries: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let lowered = input.to_lowercase();
        let named: std::collections::BTreeSet<SkillId> = working
            .character
            .skills
            .iter()
            .filter(|s| {
                lowered.contains(s.id.as_str()) || lowered.contains(&s.name.to_lowercase())
            })
            .map(|s| s.id.clone())
            .collect();
        if named.len() < 2 {
            return Err(EngineError::InvalidAction(String::from(
                "Name the skills to fuse, at least two.",
            )));
        }
        match fateloom_rules::fuse_skills(&working.character, &named) {
            Ok(outcome) => {
                working.character = outcome.sheet;
                events.push(GameEvent::new(
                    game_id,
                    GameEventBody::SkillFused {
                        result: outcome.result.id.clone(),
                        inputs: outcome.consumed.clone(),
                        recipe: outcome.recipe.clone(),
                        was_new_discovery: outcome.was_new_discovery,
                    },
                ));
                summaries.push(format!(
                    "the skills fused into {}{}",
                    outcome.result.name,
                    if outcome.was_new_discovery {
                        " -- a new recipe"
                    } else {
                        ""
                    }
                ));
                Ok(())
            }
            Err(fateloom_rules::RulesError::NoFusionMatch { hint }) => {
                let message = hint.unwrap_or_else(|| {
                    String::from("The skills resist each other; nothing happens.")
                });
                Err(EngineError::InvalidAction(message))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Exploration: movement along known connections, or generation from
    /// a discovery cue.
    async fn handle_exploration(
        &self,
        session: &Arc<GameSession>,
        working: &mut GameState,
        input: &str,
        events: &mut Vec<GameEvent>,
        summaries: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let lowered = input.to_lowercase();

        // Movement to a known connection first.
        let known_target = working
            .current_location
            .connections
            .iter()
            .find(|id| lowered.contains(id.as_str()) || name_matches(working, id, &lowered))
            .cloned();
        if let Some(location_id) = known_target {
            let destination = working
                .location(&location_id)
                .cloned()
                .or_else(|| fateloom_world::template_location(&location_id));
            if let Some(destination) = destination {
                let discovered = fateloom_world::discover_template(working, &location_id)
                    .map(|o| o.newly_discovered)
                    .unwrap_or(false);
                working.discovered_locations.insert(location_id.clone());
                working.current_location = destination.clone();
                if discovered {
                    events.push(GameEvent::new(
                        session.game.id,
                        GameEventBody::LocationDiscovered {
                            location_id: location_id.clone(),
                            name: destination.name.clone(),
                        },
                    ));
                }
                summaries.push(format!("travelled to {}", destination.name));
                return Ok(());
            }
        }

        // A discovery cue spins up the location generator.
        let discovery_cue = ["explore", "search", "venture", "push into", "follow the"]
            .iter()
            .any(|cue| lowered.contains(cue));
        if discovery_cue {
            let theme = session.definition.lock().await.theme.clone();
            let generated = {
                let mut agents = session.agents.lock().await;
                agents.location_gen.generate(working, input, &theme).await
            };
            match fateloom_world::register_custom_location(working, generated) {
                Ok(outcome) => {
                    *working = outcome.state;
                    events.push(GameEvent::new(
                        session.game.id,
                        GameEventBody::LocationDiscovered {
                            location_id: outcome.location.id.clone(),
                            name: outcome.location.name.clone(),
                        },
                    ));
                    summaries.push(format!("discovered {}", outcome.location.name));
                }
                Err(e) => {
                    // Id collision: treat as plain wandering.
                    tracing::debug!(error = %e, "generated location rejected");
                    summaries.push(String::from("wandered without finding anything new"));
                }
            }
            return Ok(());
        }

        summaries.push(String::from("took in the surroundings"));
        Ok(())
    }

    /// Quest actions: progress the first incomplete objective, or
    /// generate-and-accept a new quest when none is active.
    async fn handle_quest_action(
        &self,
        session: &Arc<GameSession>,
        working: &mut GameState,
        input: &str,
        events: &mut Vec<GameEvent>,
        summaries: &mut Vec<String>,
    ) -> Result<(), EngineError> {
        let game_id = session.game.id;

        // Progress an active quest if one matches the input (or any, on a
        // generic progress phrase).
        let lowered = input.to_lowercase();
        let active_target = working
            .active_quests
            .values()
            .find(|q| lowered.contains(&q.name.to_lowercase()) || lowered.contains(q.id.as_str()))
            .or_else(|| working.active_quests.values().next())
            .map(|q| q.id.clone());

        if let Some(quest_id) = active_target {
            let Some(quest) = working.active_quests.get(&quest_id).cloned() else {
                return Ok(());
            };
            let objective_index = quest
                .objectives
                .iter()
                .position(|o| !o.is_complete())
                .unwrap_or(0);
            let (updated, completed) =
                fateloom_rules::quest::progress_objective(&quest, objective_index, 1)?;
            events.push(GameEvent::new(
                game_id,
                GameEventBody::QuestUpdate {
                    quest_id: updated.id.clone(),
                    status: updated.status,
                    note: updated
                        .objectives
                        .get(objective_index)
                        .map_or_else(String::new, |o| {
                            format!(
                                "{} ({}/{})",
                                o.description, o.current_progress, o.target_progress
                            )
                        }),
                },
            ));
            if completed {
                let reward_outcome =
                    fateloom_rules::quest::apply_rewards(&working.character, &updated)?;
                working.character = reward_outcome.sheet;
                working.active_quests.remove(&updated.id);
                working.completed_quests.insert(updated.id.clone());
                summaries.push(format!("completed the quest: {}", updated.name));
                if reward_outcome.levels_gained > 0 {
                    events.push(GameEvent::new(
                        game_id,
                        GameEventBody::LevelUp {
                            new_level: working.character.level,
                            grade: working.character.grade.label().to_owned(),
                        },
                    ));
                }
            } else {
                working.active_quests.insert(updated.id.clone(), updated.clone());
                summaries.push(format!("made progress on {}", updated.name));
            }
            return Ok(());
        }

        // Nothing active: generate and accept.
        let theme = session.definition.lock().await.theme.clone();
        let generated = {
            let mut agents = session.agents.lock().await;
            agents.quest_gen.generate(working, None, input, &theme).await
        };
        let accepted = fateloom_rules::quest::accept_quest(&generated, &working.completed_quests)?;
        events.push(GameEvent::new(
            game_id,
            GameEventBody::QuestUpdate {
                quest_id: accepted.id.clone(),
                status: QuestStatus::InProgress,
                note: format!("accepted: {}", accepted.name),
            },
        ));
        summaries.push(format!("took on a new quest: {}", accepted.name));
        working.active_quests.insert(accepted.id.clone(), accepted);
        Ok(())
    }

    /// Step 7: build the narrator context and stream the narration.
    #[allow(clippy::too_many_arguments)]
    async fn narrate_turn(
        &self,
        session: &Arc<GameSession>,
        working: &GameState,
        input: &str,
        intent: Intent,
        summaries: &[String],
        upcoming_beats: &[String],
        foreshadowing: &[String],
        ui: &UiOutput,
        events: &mut Vec<GameEvent>,
    ) -> Result<String, EngineError> {
        let recent = EventStore::new(&self.deps.store)
            .search(session.game.id, &EventFilter::default(), RECENT_EVENT_WINDOW)
            .await
            .map(|found| {
                found
                    .iter()
                    .rev()
                    .map(|e| e.body.searchable_text())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let definition = session.definition.lock().await.clone();
        let context = NarrationContext {
            system_name: definition.name.clone(),
            system_personality: definition.personality.clone(),
            theme: definition.theme.clone(),
            location_name: working.current_location.name.clone(),
            location_description: working.current_location.description.clone(),
            player_name: working.player_name.clone(),
            level: working.character.level,
            grade: working.character.grade.label().to_owned(),
            hp_current: working.character.hp.current,
            hp_max: working.character.hp.max,
            player_input: String::from(input),
            intent: format!("{intent:?}"),
            tool_results: summaries.to_vec(),
            recent_events: recent,
            upcoming_beats: upcoming_beats.to_vec(),
            foreshadowing: foreshadowing.to_vec(),
        };

        let stream = {
            let mut agents = session.agents.lock().await;
            agents.narrator.narrate(&context).await
        };
        match stream {
            Ok(mut stream) => {
                let mut narration = String::new();
                while let Some(chunk) = stream.next_chunk().await {
                    narration.push_str(&chunk);
                    ui.emit_chunk(chunk).await;
                }
                events.push(GameEvent::new(
                    session.game.id,
                    GameEventBody::NarratorText {
                        text: narration.clone(),
                    },
                ));
                Ok(narration)
            }
            Err(e) => {
                // The narrative stream is never left half-rendered: the
                // failure terminates the turn with a notification built
                // from the tool summaries.
                tracing::warn!(game_id = %session.game.id, error = %e, "narration failed, falling back");
                let fallback = if summaries.is_empty() {
                    String::from("The moment passes quietly.")
                } else {
                    summaries.join("; ")
                };
                ui.emit_notification(fallback.clone()).await;
                events.push(GameEvent::new(
                    session.game.id,
                    GameEventBody::SystemNotification {
                        message: fallback.clone(),
                    },
                ));
                Ok(String::new())
            }
        }
    }

    /// Record an NPC exchange after narration: append both lines, nudge
    /// affinity by a bounded delta, and persist the NPC out-of-band.
    async fn record_dialogue(
        &self,
        session: &Arc<GameSession>,
        working: &mut GameState,
        target: &str,
        input: &str,
        reply: &str,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), EngineError> {
        let lowered = target.to_lowercase();
        let npc = working
            .npcs_by_location
            .values()
            .flat_map(|npcs| npcs.iter())
            .find(|n| n.name.to_lowercase().contains(&lowered) || n.id.as_str() == lowered)
            .cloned();
        let Some(npc) = npc else {
            return Ok(());
        };

        let npc = fateloom_rules::npc::record_exchange(&npc, input, reply);
        let (npc, affinity) = fateloom_rules::npc::update_relationship(
            &npc,
            session.game.id,
            dialogue_affinity_delta(input),
        );
        events.push(GameEvent::new(
            session.game.id,
            GameEventBody::NpcDialogue {
                npc_id: npc.id.clone(),
                text: String::from(reply),
            },
        ));
        tracing::debug!(npc = %npc.id, affinity = affinity, "dialogue recorded");

        NpcStore::new(&self.deps.store)
            .save_npc(session.game.id, &npc)
            .await?;
        *working = apply_mutations(working, &[Mutation::UpsertNpc(npc)]);
        Ok(())
    }
}

/// Bounded affinity nudge from the player's tone.
fn dialogue_affinity_delta(input: &str) -> i32 {
    let lowered = input.to_lowercase();
    if ["please", "thank", "friend", "help you"]
        .iter()
        .any(|w| lowered.contains(w))
    {
        2
    } else if ["idiot", "fool", "shut up", "worthless"]
        .iter()
        .any(|w| lowered.contains(w))
    {
        -5
    } else {
        1
    }
}

/// Dispatch one synchronous tool and fold its outcome into the turn.
///
/// Combat variance draws from the per-game seed and the turn counter, so
/// replays reproduce outcomes exactly.
fn apply_tool(
    session: &GameSession,
    turn: u64,
    request: &ToolRequest,
    state: &mut GameState,
    events: &mut Vec<GameEvent>,
    summaries: &mut Vec<String>,
    view: &mut Option<String>,
) -> Result<(), EngineError> {
    let mut rng = StdRng::seed_from_u64(session.game.seed ^ turn);
    let outcome = run_tool(request, state, session.game.id, session.game.difficulty, &mut rng)?;
    *state = apply_mutations(state, &outcome.mutations);
    for body in outcome.events {
        events.push(GameEvent::new(session.game.id, body));
    }
    summaries.extend(outcome.summaries);
    if outcome.view.is_some() {
        *view = outcome.view;
    }
    Ok(())
}

/// Class selection: apply the class and grant its starter skills.
fn handle_class_selection(
    game_id: fateloom_types::ids::GameId,
    working: &mut GameState,
    target: Option<&str>,
    events: &mut Vec<GameEvent>,
    summaries: &mut Vec<String>,
) {
    use fateloom_rules::skills::catalog;

    let class = target
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| String::from("warrior"));
    let starters: &[&str] = match class.as_str() {
        "mage" | "sorcerer" => &["mana_bolt", "ice_shard"],
        "ranger" | "archer" => &["piercing_shot", "fleet_foot"],
        _ => &["power_strike", "iron_guard"],
    };
    working.character.class = Some(class.clone());
    for skill_id in starters {
        let id = SkillId::from(*skill_id);
        if working.character.has_skill(&id) {
            continue;
        }
        if let Some(mut skill) = catalog::skill_definition(&id) {
            skill.source = fateloom_types::skill::AcquisitionSource::ClassGrant {
                class: class.clone(),
            };
            working.character.insight.granted.insert(id.clone());
            working.character.skills.push(skill);
            events.push(GameEvent::new(
                game_id,
                GameEventBody::StatChange {
                    description: format!("learned {skill_id} from the {class} path"),
                },
            ));
        }
    }
    summaries.push(format!("walked the {class} path"));
}

/// Whether a connection id's display name matches the input.
fn name_matches(state: &GameState, id: &fateloom_types::ids::LocationId, lowered: &str) -> bool {
    if let Some(location) = state.location(id) {
        return lowered.contains(&location.name.to_lowercase());
    }
    fateloom_world::template_location(id)
        .is_some_and(|l| lowered.contains(&l.name.to_lowercase()))
}
