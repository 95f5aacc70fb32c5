//! Plot graph engine: trigger evaluation, status transitions,
//! foreshadowing scheduling, and structural repair.
//!
//! A node may trigger only when it is `Pending`, its beat's trigger level
//! has been reached, and every enabled incoming `Dependency` edge comes
//! from a `Completed` node. Trigger evaluation is atomic over one graph
//! snapshot: the orchestrator evaluates against the version it loaded for
//! the turn, and a planner version bump mid-turn does not invalidate it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use fateloom_types::enums::{BeatType, EdgeType, NodeStatus, ThreadCategory};
use fateloom_types::ids::{EdgeId, NodeId, ThreadId};
use fateloom_types::plot::{PlotGraph, PlotThread};

use crate::error::PlotError;

// ---------------------------------------------------------------------------
// Trigger evaluation
// ---------------------------------------------------------------------------

/// A foreshadowing hint queued for the narrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeshadowHint {
    /// The node the hint belongs to.
    pub node_id: NodeId,
    /// The hint text.
    pub hint: String,
}

/// The result of one trigger evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    /// The new graph snapshot with statuses advanced.
    pub graph: PlotGraph,
    /// Nodes newly marked `Triggered`, in deterministic id order.
    pub triggered: Vec<NodeId>,
    /// Hints to weave into the next narration.
    pub foreshadow_queue: Vec<ForeshadowHint>,
    /// Hints dropped because their `must_appear_by` level has passed.
    pub stale_hints: Vec<ForeshadowHint>,
}

/// Whether one node is eligible to trigger at the given player level.
///
/// Eligibility is exactly: `Pending`, `trigger_level <= player_level`, and
/// every enabled incoming `Dependency` edge originates from a `Completed`
/// node. Dangling dependency edges (missing source) block triggering until
/// [`sanitize_graph`] removes them.
pub fn eligible_to_trigger(graph: &PlotGraph, node_id: &NodeId, player_level: u32) -> bool {
    let Some(node) = graph.nodes.get(node_id) else {
        return false;
    };
    if node.status != NodeStatus::Pending || node.beat.trigger_level > player_level {
        return false;
    }
    graph
        .incoming_edges(node_id, EdgeType::Dependency)
        .all(|edge| {
            graph
                .nodes
                .get(&edge.from)
                .is_some_and(|source| source.status == NodeStatus::Completed)
        })
}

/// Evaluate every pending node against the player level, marking the
/// eligible ones `Triggered` and assembling the foreshadowing queue.
///
/// The queue carries, for each newly triggered node, its own hints plus
/// the hints of still-pending nodes it points at through `Foreshadows`
/// edges. Hints whose `must_appear_by` level has already passed are
/// dropped and reported separately so the orchestrator can log them.
#[must_use]
pub fn evaluate_triggers(graph: &PlotGraph, player_level: u32) -> TriggerOutcome {
    let mut next = graph.clone();
    let mut triggered = Vec::new();

    let eligible: Vec<NodeId> = next
        .nodes
        .keys()
        .filter(|id| eligible_to_trigger(graph, id, player_level))
        .cloned()
        .collect();

    for id in &eligible {
        if let Some(node) = next.nodes.get_mut(id) {
            node.status = NodeStatus::Triggered;
            triggered.push(id.clone());
            tracing::info!(node = %id, title = %node.beat.title, "plot node triggered");
        }
    }

    let mut foreshadow_queue = Vec::new();
    let mut stale_hints = Vec::new();
    let queue_hints = |node_id: &NodeId, out: &mut Vec<ForeshadowHint>, stale: &mut Vec<ForeshadowHint>| {
        let Some(node) = next.nodes.get(node_id) else {
            return;
        };
        for hint in &node.beat.foreshadowing {
            let entry = ForeshadowHint {
                node_id: node_id.clone(),
                hint: hint.hint.clone(),
            };
            match hint.must_appear_by {
                Some(deadline) if deadline < player_level => stale.push(entry),
                _ => out.push(entry),
            }
        }
    };

    for id in &triggered {
        queue_hints(id, &mut foreshadow_queue, &mut stale_hints);
        // Pending targets of Foreshadows edges get their hints seeded
        // early, while the source beat is live.
        let targets: Vec<NodeId> = next
            .outgoing_edges(id, EdgeType::Foreshadows)
            .map(|edge| edge.to.clone())
            .collect();
        for target in targets {
            if next
                .nodes
                .get(&target)
                .is_some_and(|n| n.status == NodeStatus::Pending)
            {
                queue_hints(&target, &mut foreshadow_queue, &mut stale_hints);
            }
        }
    }

    TriggerOutcome {
        graph: next,
        triggered,
        foreshadow_queue,
        stale_hints,
    }
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Advance a node to a new status, enforcing the monotone lifecycle.
///
/// # Errors
///
/// - [`PlotError::UnknownNode`] if the node is missing
/// - [`PlotError::IllegalTransition`] if the lifecycle forbids the move
pub fn transition_node(
    graph: &PlotGraph,
    node_id: &NodeId,
    to: NodeStatus,
) -> Result<PlotGraph, PlotError> {
    let Some(node) = graph.nodes.get(node_id) else {
        return Err(PlotError::UnknownNode(node_id.clone()));
    };
    if !node.status.can_transition_to(to) {
        return Err(PlotError::IllegalTransition {
            node: node_id.clone(),
            from: node.status,
            to,
        });
    }
    let mut next = graph.clone();
    if let Some(node) = next.nodes.get_mut(node_id) {
        node.status = to;
    }
    Ok(next)
}

/// Mark a triggered node completed.
///
/// # Errors
///
/// Propagates [`transition_node`] errors.
pub fn complete_node(graph: &PlotGraph, node_id: &NodeId) -> Result<PlotGraph, PlotError> {
    transition_node(graph, node_id, NodeStatus::Completed)
}

// ---------------------------------------------------------------------------
// Structural repair
// ---------------------------------------------------------------------------

/// Drop edges whose endpoints are missing after a load.
///
/// Returns the repaired graph and the ids of the dropped edges; the
/// caller logs a high-importance event per drop and continues. A graph
/// inconsistency never crashes the turn pipeline.
#[must_use]
pub fn sanitize_graph(graph: &PlotGraph) -> (PlotGraph, Vec<EdgeId>) {
    let mut next = graph.clone();
    let dangling: Vec<EdgeId> = next
        .edges
        .values()
        .filter(|edge| !graph.edge_endpoints_exist(edge))
        .map(|edge| edge.id.clone())
        .collect();
    for id in &dangling {
        next.edges.remove(id);
        tracing::warn!(edge = %id, "dropped dangling plot edge");
    }
    (next, dangling)
}

// ---------------------------------------------------------------------------
// Version merging
// ---------------------------------------------------------------------------

/// Build the next graph version: the previous version's nodes and edges
/// (terminal nodes included, for history) plus accepted additions, with
/// the version bumped by one.
///
/// Accepted nodes never overwrite an existing node that has left
/// `Pending`: a beat the player has already seen stays as it is.
#[must_use]
pub fn merge_into_next_version(
    previous: &PlotGraph,
    accepted_nodes: &[fateloom_types::plot::PlotNode],
    accepted_edges: &[fateloom_types::plot::PlotEdge],
) -> PlotGraph {
    let mut next = previous.clone();
    next.version = next.version.saturating_add(1);

    for node in accepted_nodes {
        match next.nodes.get(&node.id) {
            Some(existing) if existing.status != NodeStatus::Pending => {}
            _ => {
                next.nodes.insert(node.id.clone(), node.clone());
            }
        }
    }
    for edge in accepted_edges {
        next.edges.insert(edge.id.clone(), edge.clone());
    }

    // New edges may reference nodes that were dropped upstream; repair
    // rather than trust.
    let (repaired, dropped) = sanitize_graph(&next);
    if !dropped.is_empty() {
        tracing::warn!(count = dropped.len(), "merge introduced dangling edges");
    }
    repaired
}

// ---------------------------------------------------------------------------
// Thread projection
// ---------------------------------------------------------------------------

/// Project the graph into per-thread views, nodes ordered by trigger
/// level. Priority is the count of non-terminal nodes (live threads rank
/// higher); category is derived from the thread's dominant beat type.
#[must_use]
pub fn threads(graph: &PlotGraph) -> Vec<PlotThread> {
    let mut by_thread: BTreeMap<ThreadId, Vec<&fateloom_types::plot::PlotNode>> = BTreeMap::new();
    for node in graph.nodes.values() {
        by_thread.entry(node.thread_id.clone()).or_default().push(node);
    }

    by_thread
        .into_iter()
        .map(|(thread_id, mut nodes)| {
            nodes.sort_by_key(|n| (n.beat.trigger_level, n.id.clone()));
            let live = nodes
                .iter()
                .filter(|n| !n.status.is_terminal())
                .count();
            let category = dominant_category(&nodes);
            PlotThread {
                thread_id,
                priority: u32::try_from(live).unwrap_or(u32::MAX),
                category,
                node_ids: nodes.iter().map(|n| n.id.clone()).collect(),
            }
        })
        .collect()
}

/// Derive a thread's category from its most common beat type.
fn dominant_category(nodes: &[&fateloom_types::plot::PlotNode]) -> ThreadCategory {
    let mut counts: BTreeMap<BeatType, usize> = BTreeMap::new();
    for node in nodes {
        *counts.entry(node.beat.beat_type).or_insert(0) =
            counts.get(&node.beat.beat_type).copied().unwrap_or(0).saturating_add(1);
    }
    let dominant = counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map(|(beat_type, _)| beat_type);
    match dominant {
        Some(BeatType::Mystery) => ThreadCategory::MysteryArc,
        Some(BeatType::CharacterMoment) => ThreadCategory::CharacterArc,
        Some(BeatType::Hook | BeatType::Resolution) => ThreadCategory::SideArc,
        Some(BeatType::Escalation | BeatType::Confrontation | BeatType::Revelation) => {
            ThreadCategory::MainArc
        }
        None => ThreadCategory::WorldEvent,
    }
}

// ---------------------------------------------------------------------------
// Reachability (shared with consensus)
// ---------------------------------------------------------------------------

/// Node ids reachable from dependency roots (nodes with no enabled
/// incoming dependency edge) by following enabled edges of any type.
#[must_use]
pub fn reachable_from_roots(graph: &PlotGraph) -> BTreeSet<NodeId> {
    let roots: Vec<NodeId> = graph
        .nodes
        .keys()
        .filter(|id| graph.incoming_edges(id, EdgeType::Dependency).next().is_none())
        .cloned()
        .collect();

    let mut seen: BTreeSet<NodeId> = roots.iter().cloned().collect();
    let mut queue: VecDeque<NodeId> = roots.into();
    while let Some(id) = queue.pop_front() {
        let targets: Vec<NodeId> = graph
            .edges
            .values()
            .filter(|e| !e.disabled && e.from == id)
            .map(|e| e.to.clone())
            .collect();
        for target in targets {
            if seen.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }
    seen
}
