//! Integration tests for the `fateloom-db` save-game store.
//!
//! These run against in-memory `SQLite` databases, so plain `cargo test`
//! exercises them with no external services.

// Integration tests use expect/unwrap extensively for clarity -- panicking
// on failure is the correct behavior in test code.
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::items_after_statements,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rust_decimal::Decimal;

use fateloom_db::{
    EventFilter, EventStore, GameStore, PlanningStore, PlotStore, SqliteStore, StateStore,
    StoreError,
};
use fateloom_types::character::CharacterSheet;
use fateloom_types::enums::{
    BeatType, ConsensusType, Difficulty, EdgeType, EventCategory, NodeStatus, SystemType,
};
use fateloom_types::event::{GameEvent, GameEventBody};
use fateloom_types::game::{Game, GameState, WorldSettings};
use fateloom_types::ids::{
    BeatId, EdgeId, GameId, LocationId, NodeId, NpcId, PlanningSessionId, QuestId, ThreadId,
};
use fateloom_types::location::Location;
use fateloom_types::npc::Npc;
use fateloom_types::plot::{
    Beat, ConsensusResult, NodePosition, PlanningSession, PlotEdge, PlotGraph, PlotNode,
};

// =============================================================================
// Helpers
// =============================================================================

async fn setup() -> SqliteStore {
    let store = SqliteStore::connect_in_memory()
        .await
        .expect("failed to open in-memory database");
    store.run_migrations().await.expect("migrations failed");
    store
}

fn sample_game() -> Game {
    Game {
        id: GameId::new(),
        player_name: String::from("Kaya"),
        system_type: SystemType::SystemIntegration,
        difficulty: Difficulty::Balanced,
        level: 1,
        playtime_seconds: 0,
        seed: 42,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn sample_state(game_id: GameId) -> GameState {
    GameState {
        game_id,
        system_type: SystemType::SystemIntegration,
        world_settings: WorldSettings::default(),
        character: CharacterSheet::new_level_one(),
        current_location: Location {
            id: LocationId::from("tutorial-grove"),
            name: String::from("Tutorial Grove"),
            description: String::from("A quiet forest clearing."),
            tags: BTreeSet::new(),
            connections: BTreeSet::new(),
            danger_level: 1,
        },
        player_name: String::from("Kaya"),
        backstory: String::new(),
        discovered_locations: [LocationId::from("tutorial-grove")].into_iter().collect(),
        custom_locations: BTreeMap::new(),
        npcs_by_location: BTreeMap::new(),
        active_quests: BTreeMap::new(),
        completed_quests: BTreeSet::new(),
        death_count: 0,
        opening_narration_played: false,
    }
}

fn sample_npc(id: &str, location: &str) -> Npc {
    Npc {
        id: NpcId::from(id),
        name: String::from(id),
        archetype: String::from("villager"),
        location_id: LocationId::from(location),
        personality: String::from("gruff but fair"),
        conversation: Vec::new(),
        affinity: BTreeMap::new(),
        shop: None,
        offered_quests: Vec::new(),
        lore: String::new(),
        greeting_context: String::new(),
    }
}

fn sample_graph(game_id: GameId, version: u64) -> PlotGraph {
    let mut graph = PlotGraph::empty(game_id);
    graph.version = version;
    let node = PlotNode {
        id: NodeId::from("gate-opens"),
        beat: Beat {
            id: BeatId::from("gate-opens"),
            title: String::from("The Sealed Gate Opens"),
            description: String::new(),
            beat_type: BeatType::Hook,
            trigger_level: 2,
            foreshadowing: Vec::new(),
            consequences: Vec::new(),
        },
        thread_id: ThreadId::from("main"),
        position: NodePosition::default(),
        status: NodeStatus::Pending,
    };
    graph.nodes.insert(node.id.clone(), node);
    graph.edges.insert(
        EdgeId::from("self-loop-free"),
        PlotEdge {
            id: EdgeId::from("self-loop-free"),
            from: NodeId::from("gate-opens"),
            to: NodeId::from("gate-opens"),
            edge_type: EdgeType::Parallel,
            weight: Decimal::ONE,
            disabled: true,
        },
    );
    graph
}

// =============================================================================
// Game + state round trips
// =============================================================================

#[tokio::test]
async fn game_create_and_fetch_round_trip() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    let fetched = games.get_game(game.id).await.expect("fetch failed");
    assert_eq!(fetched.id, game.id);
    assert_eq!(fetched.player_name, "Kaya");
    assert_eq!(fetched.system_type, SystemType::SystemIntegration);
    assert_eq!(fetched.seed, 42);
}

#[tokio::test]
async fn save_load_round_trip_preserves_state() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let states = StateStore::new(&store);

    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    let mut state = sample_state(game.id);
    state.npcs_by_location.insert(
        LocationId::from("tutorial-grove"),
        vec![sample_npc("brakka", "tutorial-grove")],
    );
    state.death_count = 2;
    state.opening_narration_played = true;

    states.save_game(&state, 300).await.expect("save failed");
    let loaded = states.load_state(game.id).await.expect("load failed");

    assert!(loaded.skipped.is_empty());
    assert_eq!(loaded.state, state);

    // The denormalised game row advanced too.
    let fetched = games.get_game(game.id).await.expect("fetch failed");
    assert_eq!(fetched.playtime_seconds, 300);
}

#[tokio::test]
async fn load_overlays_out_of_band_npc_writes() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let states = StateStore::new(&store);
    let npcs = fateloom_db::NpcStore::new(&store);

    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    let mut state = sample_state(game.id);
    let npc = sample_npc("brakka", "tutorial-grove");
    state
        .npcs_by_location
        .insert(LocationId::from("tutorial-grove"), vec![npc.clone()]);
    states.save_game(&state, 0).await.expect("save failed");

    // An out-of-band NPC write after the blob was saved.
    let mut updated = npc;
    updated.lore = String::from("once forged a king's blade");
    npcs.save_npc(game.id, &updated).await.expect("npc save failed");

    let loaded = states.load_state(game.id).await.expect("load failed");
    let reloaded_npc = loaded
        .state
        .npcs_by_location
        .get(&LocationId::from("tutorial-grove"))
        .and_then(|v| v.first())
        .expect("npc missing after overlay");
    assert_eq!(reloaded_npc.lore, "once forged a king's blade");
}

#[tokio::test]
async fn corrupt_child_is_skipped_not_fatal() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let states = StateStore::new(&store);

    let game = sample_game();
    games.create_game(&game).await.expect("create failed");
    let state = sample_state(game.id);
    states.save_game(&state, 0).await.expect("save failed");

    // Plant a corrupt NPC row by hand.
    sqlx::query(r"INSERT INTO npcs (game_id, npc_id, blob) VALUES (?1, 'broken', 'not json')")
        .bind(game.id.to_string())
        .execute(store.pool())
        .await
        .expect("raw insert failed");

    let loaded = states.load_state(game.id).await.expect("load failed");
    assert_eq!(loaded.skipped.len(), 1);
    assert_eq!(loaded.skipped[0].entity, "npc");
    assert_eq!(loaded.skipped[0].id, "broken");
}

#[tokio::test]
async fn delete_game_cascades_to_children() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let states = StateStore::new(&store);
    let events = EventStore::new(&store);

    let game = sample_game();
    games.create_game(&game).await.expect("create failed");
    states
        .save_game(&sample_state(game.id), 0)
        .await
        .expect("save failed");
    events
        .log_event(&GameEvent::new(
            game.id,
            GameEventBody::SystemNotification {
                message: String::from("hello"),
            },
        ))
        .await
        .expect("log failed");

    games.delete_game(game.id).await.expect("delete failed");

    assert!(matches!(
        games.get_game(game.id).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        states.load_state(game.id).await,
        Err(StoreError::NotFound(_))
    ));
    let remaining = events
        .recent_events(game.id, 10)
        .await
        .expect("query failed");
    assert!(remaining.is_empty());
}

// =============================================================================
// Event log
// =============================================================================

#[tokio::test]
async fn event_ids_are_monotone_in_commit_order() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let events = EventStore::new(&store);
    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    let mut ids = Vec::new();
    for i in 0..5 {
        let id = events
            .log_event(&GameEvent::new(
                game.id,
                GameEventBody::SystemNotification {
                    message: format!("event {i}"),
                },
            ))
            .await
            .expect("log failed");
        ids.push(id);
    }
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "ids must be strictly increasing");
    }

    let recent = events.recent_events(game.id, 10).await.expect("query failed");
    assert_eq!(recent.len(), 5);
    let texts: Vec<String> = recent.iter().map(|e| e.body.searchable_text()).collect();
    assert_eq!(texts[0], "event 0");
    assert_eq!(texts[4], "event 4");
}

#[tokio::test]
async fn event_search_filters_compose() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let events = EventStore::new(&store);
    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    events
        .log_event(&GameEvent::new(
            game.id,
            GameEventBody::NpcDialogue {
                npc_id: NpcId::from("brakka"),
                text: String::from("The forge is cold today."),
            },
        ))
        .await
        .expect("log failed");
    events
        .log_event(&GameEvent::new(
            game.id,
            GameEventBody::CombatLog {
                target: String::from("goblin"),
                damage: 12,
                xp_gained: 40,
                gold: 3,
                loot: Vec::new(),
            },
        ))
        .await
        .expect("log failed");

    // By category.
    let combat = events
        .search(
            game.id,
            &EventFilter {
                category: Some(EventCategory::Combat),
                ..EventFilter::default()
            },
            10,
        )
        .await
        .expect("search failed");
    assert_eq!(combat.len(), 1);

    // By denormalised NPC key.
    let brakka = events
        .search(
            game.id,
            &EventFilter {
                npc_id: Some(String::from("brakka")),
                ..EventFilter::default()
            },
            10,
        )
        .await
        .expect("search failed");
    assert_eq!(brakka.len(), 1);

    // By text substring.
    let forge = events
        .search(
            game.id,
            &EventFilter {
                text: Some(String::from("forge")),
                ..EventFilter::default()
            },
            10,
        )
        .await
        .expect("search failed");
    assert_eq!(forge.len(), 1);

    // Composed filters that cannot both hold.
    let none = events
        .search(
            game.id,
            &EventFilter {
                category: Some(EventCategory::Combat),
                npc_id: Some(String::from("brakka")),
                ..EventFilter::default()
            },
            10,
        )
        .await
        .expect("search failed");
    assert!(none.is_empty());
}

// =============================================================================
// Plot graph + planning sessions
// =============================================================================

#[tokio::test]
async fn plot_graph_versions_are_monotone() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let plots = PlotStore::new(&store);
    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    plots
        .save_plot_graph(&sample_graph(game.id, 1))
        .await
        .expect("v1 save failed");
    plots
        .save_plot_graph(&sample_graph(game.id, 2))
        .await
        .expect("v2 save failed");

    // Writing version 2 again (or lower) is a regression.
    let result = plots.save_plot_graph(&sample_graph(game.id, 2)).await;
    assert!(matches!(result, Err(StoreError::Config(_))));

    let loaded = plots.load_plot_graph(game.id).await.expect("load failed");
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.nodes.len(), 1);
}

#[tokio::test]
async fn node_status_update_touches_blob_and_row() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let plots = PlotStore::new(&store);
    let game = sample_game();
    games.create_game(&game).await.expect("create failed");
    plots
        .save_plot_graph(&sample_graph(game.id, 1))
        .await
        .expect("save failed");

    plots
        .update_node_status(game.id, &NodeId::from("gate-opens"), NodeStatus::Triggered)
        .await
        .expect("status update failed");

    let loaded = plots.load_plot_graph(game.id).await.expect("load failed");
    assert_eq!(
        loaded.nodes.get(&NodeId::from("gate-opens")).map(|n| n.status),
        Some(NodeStatus::Triggered)
    );
    let (status,): (String,) = sqlx::query_as(
        r"SELECT status FROM plot_nodes WHERE game_id = ?1 AND node_id = 'gate-opens'",
    )
    .bind(game.id.to_string())
    .fetch_one(store.pool())
    .await
    .expect("row query failed");
    assert_eq!(status, "triggered");
}

#[tokio::test]
async fn planning_sessions_round_trip_in_order() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let sessions = PlanningStore::new(&store);
    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    for (level, version) in [(1_u32, 1_u64), (6, 2)] {
        let session = PlanningSession {
            id: PlanningSessionId::new(),
            game_id: game.id,
            player_level: level,
            proposals: Vec::new(),
            consensus: ConsensusResult {
                accepted_nodes: Vec::new(),
                accepted_edges: Vec::new(),
                node_ratings: BTreeMap::new(),
                conflicts: Vec::new(),
                consensus_type: ConsensusType::NoConsensus,
            },
            graph_version: version,
            next_replan_level: level + 5,
            created_at: Utc::now(),
        };
        sessions
            .save_planning_session(&session)
            .await
            .expect("session save failed");
    }

    let loaded = sessions
        .load_planning_sessions(game.id)
        .await
        .expect("load failed");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].player_level, 1);
    assert_eq!(loaded[1].player_level, 6);
    assert!(loaded[0].graph_version < loaded[1].graph_version);
}

#[tokio::test]
async fn quest_overlay_moves_completed_out_of_active() {
    let store = setup().await;
    let games = GameStore::new(&store);
    let states = StateStore::new(&store);
    let quests = fateloom_db::QuestStore::new(&store);

    let game = sample_game();
    games.create_game(&game).await.expect("create failed");

    let quest = fateloom_types::quest::Quest {
        id: QuestId::from("rat-cull"),
        name: String::from("Rat Cull"),
        description: String::new(),
        quest_type: fateloom_types::enums::QuestType::Side,
        objectives: Vec::new(),
        rewards: fateloom_types::quest::QuestRewards::default(),
        prerequisites: BTreeSet::new(),
        giver: None,
        status: fateloom_types::enums::QuestStatus::InProgress,
    };
    let mut state = sample_state(game.id);
    state.active_quests.insert(quest.id.clone(), quest.clone());
    states.save_game(&state, 0).await.expect("save failed");

    // Complete the quest out-of-band after the blob was written.
    let mut done = quest;
    done.status = fateloom_types::enums::QuestStatus::Completed;
    quests.save_quest(game.id, &done).await.expect("quest save failed");

    let loaded = states.load_state(game.id).await.expect("load failed");
    assert!(loaded.state.active_quests.is_empty());
    assert!(loaded
        .state
        .completed_quests
        .contains(&QuestId::from("rat-cull")));
    assert!(loaded.state.invariant_violations().is_empty());
}
