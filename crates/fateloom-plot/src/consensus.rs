//! Consensus engine: merging perspective agents' plot proposals.
//!
//! ## Resolution policy
//!
//! - **Dedup**: two proposed nodes are equivalent when they share a
//!   thread and either the same beat id, or the same beat type with
//!   trigger levels within two of each other.
//! - **Merging**: a group's combined rating is the mean of contributor
//!   ratings weighted by agent priority; the highest-rated contributor's
//!   node becomes the representative. The strongest single rating is
//!   retained on the result so feeding the output back in reproduces the
//!   same acceptance set.
//! - **Thresholds**: accepted iff the combined rating reaches 0.5 and at
//!   least one contributor rated the node 0.6 or higher.
//! - **Ordering**: per thread, accepted nodes are re-sequenced by trigger
//!   level and missing dependency edges between successive nodes are
//!   synthesised.
//! - **Cycles** are broken by dropping the lowest-weight edge on the
//!   cycle; **unreachable** nodes are recorded but retained.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use fateloom_types::enums::{ConsensusType, EdgeType};
use fateloom_types::ids::{EdgeId, NodeId, ThreadId};
use fateloom_types::plot::{
    AgentProposal, ConsensusConflict, ConsensusResult, PlotEdge, PlotGraph, PlotNode,
};

use crate::graph::reachable_from_roots;

/// Combined-rating acceptance floor.
fn acceptance_floor() -> Decimal {
    Decimal::new(5, 1)
}

/// Minimum single-contributor rating required as a witness.
fn witness_floor() -> Decimal {
    Decimal::new(6, 1)
}

/// Rating assumed for a proposed node its agent forgot to rate.
fn default_rating() -> Decimal {
    Decimal::new(5, 1)
}

/// Weight given to synthesised dependency edges.
fn synthesised_weight() -> Decimal {
    Decimal::new(5, 1)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One contributor to a merged node group.
struct Contribution {
    agent_index: usize,
    weight: Decimal,
    rating: Decimal,
    node: PlotNode,
}

/// The consensus engine. Stateless; the struct exists so alternative
/// thresholds can be injected in tests.
pub struct ConsensusEngine {
    accept_floor: Decimal,
    witness: Decimal,
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self {
            accept_floor: acceptance_floor(),
            witness: witness_floor(),
        }
    }
}

/// Run consensus with the default thresholds.
#[must_use]
pub fn run_consensus(proposals: &[AgentProposal], previous: &PlotGraph) -> ConsensusResult {
    ConsensusEngine::default().run(proposals, previous)
}

impl ConsensusEngine {
    /// Merge the proposals against the previous graph version.
    #[must_use]
    pub fn run(&self, proposals: &[AgentProposal], previous: &PlotGraph) -> ConsensusResult {
        let mut conflicts = Vec::new();

        // --- Group equivalent nodes across proposals ---
        let mut groups: Vec<Vec<Contribution>> = Vec::new();
        for (agent_index, proposal) in proposals.iter().enumerate() {
            let weight = proposal.agent_kind.priority_weight();
            for node in &proposal.nodes {
                let rating = proposal
                    .ratings
                    .get(&node.id)
                    .copied()
                    .unwrap_or_else(default_rating);
                let contribution = Contribution {
                    agent_index,
                    weight,
                    rating,
                    node: node.clone(),
                };
                let slot = groups.iter_mut().find(|group| {
                    group
                        .first()
                        .is_some_and(|head| equivalent(&head.node, &contribution.node))
                });
                match slot {
                    Some(group) => group.push(contribution),
                    None => groups.push(vec![contribution]),
                }
            }
        }

        // --- Merge and threshold each group ---
        let mut accepted_nodes: Vec<PlotNode> = Vec::new();
        let mut node_ratings: BTreeMap<NodeId, Decimal> = BTreeMap::new();
        let mut surviving_agents: BTreeSet<usize> = BTreeSet::new();

        for group in &groups {
            let weighted_sum = group
                .iter()
                .fold(Decimal::ZERO, |acc, c| {
                    acc.saturating_add(c.rating.checked_mul(c.weight).unwrap_or(Decimal::ZERO))
                });
            let weight_sum = group
                .iter()
                .fold(Decimal::ZERO, |acc, c| acc.saturating_add(c.weight));
            let combined = weighted_sum
                .checked_div(weight_sum)
                .unwrap_or(Decimal::ZERO);
            let witness = group
                .iter()
                .map(|c| c.rating)
                .max()
                .unwrap_or(Decimal::ZERO);

            record_consequence_conflicts(group, &mut conflicts);

            if combined < self.accept_floor || witness < self.witness {
                continue;
            }

            // Representative: the highest-rated contributor's node.
            let representative = group
                .iter()
                .max_by(|a, b| a.rating.cmp(&b.rating))
                .map(|c| c.node.clone());
            let Some(node) = representative else {
                continue;
            };
            for c in group {
                surviving_agents.insert(c.agent_index);
            }
            node_ratings.insert(node.id.clone(), witness);
            accepted_nodes.push(node);
        }

        // --- Re-sequence per thread and synthesise dependency edges ---
        let mut accepted_edges = collect_proposed_edges(proposals, &accepted_nodes, previous);
        resequence_threads(&mut accepted_nodes);
        synthesise_dependencies(&accepted_nodes, &mut accepted_edges);

        // --- Break dependency cycles ---
        break_cycles(&accepted_nodes, &mut accepted_edges, &mut conflicts);

        // --- Record unreachable nodes (retained) ---
        record_unreachable(&accepted_nodes, &accepted_edges, previous, &mut conflicts);

        // --- Derive the consensus type ---
        let proposing: BTreeSet<usize> = proposals
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.nodes.is_empty())
            .map(|(i, _)| i)
            .collect();
        let consensus_type = derive_consensus_type(proposing.len(), surviving_agents.len());

        tracing::debug!(
            groups = groups.len(),
            accepted = accepted_nodes.len(),
            conflicts = conflicts.len(),
            consensus = ?consensus_type,
            "consensus complete"
        );

        ConsensusResult {
            accepted_nodes,
            accepted_edges,
            node_ratings,
            conflicts,
            consensus_type,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spec equivalence: same thread, and either the same beat id or the same
/// beat type with trigger levels within +/- 2.
fn equivalent(a: &PlotNode, b: &PlotNode) -> bool {
    if a.thread_id != b.thread_id {
        return false;
    }
    if a.beat.id == b.beat.id {
        return true;
    }
    a.beat.beat_type == b.beat.beat_type && a.beat.trigger_level.abs_diff(b.beat.trigger_level) <= 2
}

/// Record contradictory-consequence conflicts for contributors sharing a
/// beat id with differing non-empty consequence lists.
fn record_consequence_conflicts(group: &[Contribution], conflicts: &mut Vec<ConsensusConflict>) {
    let mut by_beat: BTreeMap<&fateloom_types::ids::BeatId, BTreeSet<&Vec<String>>> =
        BTreeMap::new();
    for c in group {
        if !c.node.beat.consequences.is_empty() {
            by_beat
                .entry(&c.node.beat.id)
                .or_default()
                .insert(&c.node.beat.consequences);
        }
    }
    for (beat_id, variants) in by_beat {
        if variants.len() > 1 {
            conflicts.push(ConsensusConflict::ContradictoryConsequences {
                beat_id: beat_id.clone(),
                variants: variants
                    .into_iter()
                    .flat_map(|v| v.iter().cloned())
                    .collect(),
            });
        }
    }
}

/// Keep proposed edges whose endpoints both exist among the accepted
/// nodes or the previous graph's nodes.
fn collect_proposed_edges(
    proposals: &[AgentProposal],
    accepted: &[PlotNode],
    previous: &PlotGraph,
) -> Vec<PlotEdge> {
    let known: BTreeSet<&NodeId> = accepted
        .iter()
        .map(|n| &n.id)
        .chain(previous.nodes.keys())
        .collect();
    let mut seen_ids = BTreeSet::new();
    let mut edges = Vec::new();
    for proposal in proposals {
        for edge in &proposal.edges {
            if known.contains(&edge.from)
                && known.contains(&edge.to)
                && seen_ids.insert(edge.id.clone())
            {
                edges.push(edge.clone());
            }
        }
    }
    edges
}

/// Sort each thread's accepted nodes by trigger level and rewrite their
/// sequence positions.
fn resequence_threads(accepted: &mut [PlotNode]) {
    accepted.sort_by(|a, b| {
        (&a.thread_id, a.beat.trigger_level, &a.id)
            .cmp(&(&b.thread_id, b.beat.trigger_level, &b.id))
    });
    let mut sequence_in_thread: BTreeMap<ThreadId, u32> = BTreeMap::new();
    for node in accepted.iter_mut() {
        let counter = sequence_in_thread
            .entry(node.thread_id.clone())
            .or_insert(0);
        node.position.sequence = *counter;
        *counter = counter.saturating_add(1);
    }
}

/// Add a dependency edge between successive nodes of a thread when no
/// explicit edge already links them (in either direction).
fn synthesise_dependencies(accepted: &[PlotNode], edges: &mut Vec<PlotEdge>) {
    let mut by_thread: BTreeMap<&ThreadId, Vec<&PlotNode>> = BTreeMap::new();
    for node in accepted {
        by_thread.entry(&node.thread_id).or_default().push(node);
    }
    for nodes in by_thread.values() {
        for pair in nodes.windows(2) {
            let (Some(from), Some(to)) = (pair.first(), pair.get(1)) else {
                continue;
            };
            let linked = edges.iter().any(|e| {
                (e.from == from.id && e.to == to.id) || (e.from == to.id && e.to == from.id)
            });
            if !linked {
                edges.push(PlotEdge {
                    id: EdgeId::from(format!("dep:{}:{}", from.id, to.id)),
                    from: from.id.clone(),
                    to: to.id.clone(),
                    edge_type: EdgeType::Dependency,
                    weight: synthesised_weight(),
                    disabled: false,
                });
            }
        }
    }
}

/// Break dependency cycles by repeatedly dropping the lowest-weight edge
/// on a found cycle.
fn break_cycles(
    accepted: &[PlotNode],
    edges: &mut Vec<PlotEdge>,
    conflicts: &mut Vec<ConsensusConflict>,
) {
    loop {
        let Some(cycle_edge_ids) = find_dependency_cycle(accepted, edges) else {
            break;
        };
        let dropped = cycle_edge_ids
            .iter()
            .filter_map(|id| edges.iter().find(|e| &e.id == id))
            .min_by(|a, b| a.weight.cmp(&b.weight))
            .map(|e| e.id.clone());
        let Some(dropped_id) = dropped else {
            break;
        };
        let cycle_nodes: Vec<NodeId> = cycle_edge_ids
            .iter()
            .filter_map(|id| edges.iter().find(|e| &e.id == id))
            .map(|e| e.from.clone())
            .collect();
        edges.retain(|e| e.id != dropped_id);
        tracing::warn!(edge = %dropped_id, "dependency cycle broken");
        conflicts.push(ConsensusConflict::CyclicDependency {
            dropped_edge: dropped_id,
            cycle: cycle_nodes,
        });
    }
}

/// Find one dependency cycle, returning the edge ids along it.
///
/// Kahn's algorithm over the accepted nodes' dependency edges: if the
/// topological peel leaves nodes behind, those nodes sit on cycles, and a
/// deterministic walk through them recovers one concrete cycle.
fn find_dependency_cycle(accepted: &[PlotNode], edges: &[PlotEdge]) -> Option<Vec<EdgeId>> {
    let node_ids: BTreeSet<&NodeId> = accepted.iter().map(|n| &n.id).collect();
    let dep_edges: Vec<&PlotEdge> = edges
        .iter()
        .filter(|e| {
            e.edge_type == EdgeType::Dependency
                && !e.disabled
                && node_ids.contains(&e.from)
                && node_ids.contains(&e.to)
        })
        .collect();

    // Topological peel: repeatedly remove nodes with no incoming edges.
    let mut remaining: BTreeSet<&NodeId> = node_ids.clone();
    loop {
        let removable: Vec<&NodeId> = remaining
            .iter()
            .filter(|id| {
                !dep_edges
                    .iter()
                    .any(|e| &&e.to == *id && remaining.contains(&e.from))
            })
            .copied()
            .collect();
        if removable.is_empty() {
            break;
        }
        for id in removable {
            remaining.remove(id);
        }
    }
    if remaining.is_empty() {
        return None;
    }

    // Every remaining node has an in-edge from another remaining node, so
    // a forward walk must revisit a node within |remaining| + 1 steps.
    let mut walk: Vec<&NodeId> = Vec::new();
    let mut walk_edges: Vec<&PlotEdge> = Vec::new();
    let mut current = remaining.iter().next().copied()?;
    loop {
        if let Some(position) = walk.iter().position(|id| *id == current) {
            // Close the cycle: edges from the first occurrence onward.
            return Some(
                walk_edges
                    .get(position..)
                    .unwrap_or(&[])
                    .iter()
                    .map(|e| e.id.clone())
                    .collect(),
            );
        }
        walk.push(current);
        let edge = dep_edges
            .iter()
            .find(|e| e.from == *current && remaining.contains(&e.to))
            .copied()?;
        walk_edges.push(edge);
        current = &edge.to;
    }
}

/// Record (but retain) nodes unreachable from any dependency root.
fn record_unreachable(
    accepted: &[PlotNode],
    edges: &[PlotEdge],
    previous: &PlotGraph,
    conflicts: &mut Vec<ConsensusConflict>,
) {
    // Evaluate reachability over the merged view the planner will write.
    let mut merged = previous.clone();
    for node in accepted {
        merged.nodes.insert(node.id.clone(), node.clone());
    }
    for edge in edges {
        merged.edges.insert(edge.id.clone(), edge.clone());
    }
    let reachable = reachable_from_roots(&merged);
    for node in accepted {
        if !reachable.contains(&node.id) {
            conflicts.push(ConsensusConflict::UnreachableNode {
                node_id: node.id.clone(),
            });
        }
    }
}

/// Derive the consensus type from the surviving-agent fraction.
fn derive_consensus_type(proposing: usize, surviving: usize) -> ConsensusType {
    if proposing == 0 || surviving == 0 {
        return ConsensusType::NoConsensus;
    }
    if surviving == proposing {
        ConsensusType::Unanimous
    } else if surviving.saturating_mul(2) > proposing {
        ConsensusType::Majority
    } else {
        ConsensusType::Split
    }
}
