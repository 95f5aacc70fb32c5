//! Plot graph value types: beats, nodes, edges, threads, perspective
//! proposals, and consensus results.
//!
//! The graph stores nodes and edges in id-keyed maps and edges reference
//! endpoints by id -- there are no direct references, so cycles in the
//! narrative structure cannot create ownership cycles. Versioning is
//! strictly monotone per game: every planner run writes `version + 1` and
//! readers keep whatever version they loaded for the duration of a turn.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{BeatType, ConsensusType, EdgeType, NodeStatus, PerspectiveKind, ThreadCategory};
use crate::ids::{BeatId, EdgeId, GameId, NodeId, PlanningSessionId, ThreadId};

// ---------------------------------------------------------------------------
// Beats and foreshadowing
// ---------------------------------------------------------------------------

/// A foreshadowing hint attached to a beat, to be woven into narration
/// before the beat itself triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Foreshadow {
    /// The hint text handed to the narrator.
    pub hint: String,
    /// Latest player level by which the hint should have been narrated.
    /// Hints past this level are dropped at trigger evaluation.
    #[serde(default)]
    pub must_appear_by: Option<u32>,
}

/// A named unit of planned narrative scheduled against a player level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    /// Content identifier.
    pub id: BeatId,
    /// Short title (`"The Sealed Gate Opens"`).
    pub title: String,
    /// What happens when this beat plays.
    pub description: String,
    /// Narrative function.
    pub beat_type: BeatType,
    /// Player level at which the beat becomes eligible to trigger.
    pub trigger_level: u32,
    /// Hints to seed before the beat triggers.
    #[serde(default)]
    pub foreshadowing: Vec<Foreshadow>,
    /// Downstream consequences once the beat completes.
    #[serde(default)]
    pub consequences: Vec<String>,
}

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// Spatial position of a node within its thread's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NodePosition {
    /// Depth tier in the overall campaign.
    pub tier: u32,
    /// Order within the thread.
    pub sequence: u32,
    /// Branch index for alternative paths, 0 for the mainline.
    pub branch: u32,
}

/// A node in the plot graph: one beat plus scheduling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotNode {
    /// Content identifier.
    pub id: NodeId,
    /// The beat this node schedules.
    pub beat: Beat,
    /// Thread this node belongs to.
    pub thread_id: ThreadId,
    /// Layout position.
    pub position: NodePosition,
    /// Lifecycle status; transitions are monotone.
    pub status: NodeStatus,
}

/// A directed edge between two plot nodes, referenced by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotEdge {
    /// Content identifier.
    pub id: EdgeId,
    /// Source node id.
    pub from: NodeId,
    /// Target node id.
    pub to: NodeId,
    /// Relationship kind.
    pub edge_type: EdgeType,
    /// Strength used for cycle-breaking (lowest weight drops first).
    pub weight: Decimal,
    /// Disabled edges are kept for history but ignored by evaluation.
    #[serde(default)]
    pub disabled: bool,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// The versioned plot graph for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotGraph {
    /// Owning game.
    pub game_id: GameId,
    /// Strictly monotone version; bumped by every planner run.
    pub version: u64,
    /// Nodes keyed by id.
    pub nodes: BTreeMap<NodeId, PlotNode>,
    /// Edges keyed by id.
    pub edges: BTreeMap<EdgeId, PlotEdge>,
}

impl PlotGraph {
    /// An empty version-0 graph for a new game.
    pub const fn empty(game_id: GameId) -> Self {
        Self {
            game_id,
            version: 0,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }

    /// Enabled edges of one type pointing **into** a node.
    pub fn incoming_edges(
        &self,
        node: &NodeId,
        edge_type: EdgeType,
    ) -> impl Iterator<Item = &PlotEdge> {
        self.edges
            .values()
            .filter(move |e| !e.disabled && e.edge_type == edge_type && &e.to == node)
    }

    /// Enabled edges of one type leaving a node.
    pub fn outgoing_edges(
        &self,
        node: &NodeId,
        edge_type: EdgeType,
    ) -> impl Iterator<Item = &PlotEdge> {
        self.edges
            .values()
            .filter(move |e| !e.disabled && e.edge_type == edge_type && &e.from == node)
    }

    /// All node ids belonging to one thread.
    pub fn thread_nodes(&self, thread: &ThreadId) -> Vec<&PlotNode> {
        self.nodes
            .values()
            .filter(|n| &n.thread_id == thread)
            .collect()
    }

    /// Whether both endpoints of an edge exist in the node map.
    pub fn edge_endpoints_exist(&self, edge: &PlotEdge) -> bool {
        self.nodes.contains_key(&edge.from) && self.nodes.contains_key(&edge.to)
    }
}

// ---------------------------------------------------------------------------
// Threads (derived projection)
// ---------------------------------------------------------------------------

/// A derived grouping of nodes sharing a thread id, ordered by trigger
/// level. Never persisted; recomputed from the graph on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotThread {
    /// Thread identifier.
    pub thread_id: ThreadId,
    /// Scheduling priority relative to other threads.
    pub priority: u32,
    /// Narrative register.
    pub category: ThreadCategory,
    /// Node ids in trigger-level order.
    pub node_ids: Vec<NodeId>,
}

// ---------------------------------------------------------------------------
// Proposals and consensus
// ---------------------------------------------------------------------------

/// One perspective agent's proposed additions to the plot graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProposal {
    /// Stable identifier of the proposing agent instance.
    pub agent_id: String,
    /// Which perspective produced this proposal.
    pub agent_kind: PerspectiveKind,
    /// Proposed nodes.
    pub nodes: Vec<PlotNode>,
    /// Proposed edges.
    pub edges: Vec<PlotEdge>,
    /// Per-node confidence ratings in `[0, 1]`.
    pub ratings: BTreeMap<NodeId, Decimal>,
    /// Free-text reasoning retained for the planning session record.
    #[serde(default)]
    pub reasoning: String,
}

impl AgentProposal {
    /// An empty proposal, contributed when a perspective agent times out
    /// or fails. The planner degrades gracefully around these.
    pub fn empty(agent_id: impl Into<String>, agent_kind: PerspectiveKind) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            ratings: BTreeMap::new(),
            reasoning: String::new(),
        }
    }

    /// Whether the proposal contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// A structural problem found while merging proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsensusConflict {
    /// Two proposals assign contradictory consequences to the same beat.
    ContradictoryConsequences {
        /// The contested beat.
        beat_id: BeatId,
        /// The conflicting consequence texts.
        variants: Vec<String>,
    },
    /// A dependency cycle was found and broken.
    CyclicDependency {
        /// The edge dropped to break the cycle.
        dropped_edge: EdgeId,
        /// The node ids on the cycle.
        cycle: Vec<NodeId>,
    },
    /// No path of enabled edges reaches this node from any pending node.
    /// The node is retained; another thread's completion may reach it later.
    UnreachableNode {
        /// The orphaned node.
        node_id: NodeId,
    },
}

/// The merged outcome of one consensus run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Nodes that survived dedup, thresholding, and re-sequencing.
    pub accepted_nodes: Vec<PlotNode>,
    /// Edges that survived, including synthesised dependency edges.
    pub accepted_edges: Vec<PlotEdge>,
    /// The strongest contributor rating retained per accepted node, so a
    /// re-run over this result reproduces the same acceptance set.
    #[serde(default)]
    pub node_ratings: BTreeMap<NodeId, Decimal>,
    /// Structural conflicts found (informational; already resolved).
    pub conflicts: Vec<ConsensusConflict>,
    /// How strongly the agents agreed.
    pub consensus_type: ConsensusType,
}

// ---------------------------------------------------------------------------
// System definition and planning sessions
// ---------------------------------------------------------------------------

/// The unique narrative identity produced by the system definer agent at
/// game start and refreshed on later planner runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SystemDefinition {
    /// The system's name as it presents itself to the player.
    pub name: String,
    /// Voice and personality of the system interface.
    pub personality: String,
    /// The campaign's central mystery.
    pub central_mystery: String,
    /// The looming threat.
    pub threat: String,
    /// Tonal theme.
    pub theme: String,
    /// Factions in play.
    #[serde(default)]
    pub factions: Vec<String>,
    /// Opening hooks.
    #[serde(default)]
    pub hooks: Vec<String>,
}

/// A persisted record of one completed planner run, linking the proposals
/// that went in to the consensus that came out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningSession {
    /// Row identifier.
    pub id: PlanningSessionId,
    /// Owning game.
    pub game_id: GameId,
    /// Player level when the run started.
    pub player_level: u32,
    /// The proposals collected (empty ones included).
    pub proposals: Vec<AgentProposal>,
    /// The consensus outcome.
    pub consensus: ConsensusResult,
    /// Graph version this run produced.
    pub graph_version: u64,
    /// Player level at which the next periodic run is due.
    pub next_replan_level: u32,
    /// Wall-clock completion time.
    pub created_at: DateTime<Utc>,
}
