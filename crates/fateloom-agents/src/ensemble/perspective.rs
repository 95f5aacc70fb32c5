//! Perspective agents: the four voices of the planning council.
//!
//! Each perspective (character, world, conflict, mystery) receives the
//! same state snapshot and system definition, and proposes rated plot
//! nodes and edges from its own angle. A perspective that fails or times
//! out contributes an empty proposal; the planner degrades gracefully.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;

use fateloom_types::enums::{BeatType, EdgeType, NodeStatus, PerspectiveKind};
use fateloom_types::game::GameState;
use fateloom_types::ids::{BeatId, EdgeId, NodeId, ThreadId};
use fateloom_types::plot::{
    AgentProposal, Beat, Foreshadow, NodePosition, PlotEdge, PlotGraph, PlotNode, SystemDefinition,
};

use crate::ensemble::AgentDeps;
use crate::parse::extract_json;
use crate::prompt::names;
use crate::session::ChatSession;

// ---------------------------------------------------------------------------
// Draft shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ForeshadowDraft {
    hint: String,
    #[serde(default)]
    must_appear_by: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NodeDraft {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    beat_type: Option<String>,
    trigger_level: u32,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    foreshadowing: Vec<ForeshadowDraft>,
    #[serde(default)]
    consequences: Vec<String>,
    #[serde(default)]
    rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EdgeDraft {
    from: String,
    to: String,
    #[serde(default)]
    edge_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProposalDraft {
    #[serde(default)]
    nodes: Vec<NodeDraft>,
    #[serde(default)]
    edges: Vec<EdgeDraft>,
    #[serde(default)]
    reasoning: String,
}

// ---------------------------------------------------------------------------
// Perspective agent
// ---------------------------------------------------------------------------

/// What each perspective champions, fed into its prompt.
const fn perspective_charge(kind: PerspectiveKind) -> &'static str {
    match kind {
        PerspectiveKind::Character => {
            "You champion character-driven beats: growth, bonds, costs, choices."
        }
        PerspectiveKind::World => {
            "You champion the world: factions moving, places changing, history surfacing."
        }
        PerspectiveKind::Conflict => {
            "You champion conflict: escalation, stakes, enemies that adapt."
        }
        PerspectiveKind::Mystery => {
            "You champion mystery: questions, foreshadowing, revelations earned."
        }
    }
}

/// One perspective agent with its own session.
pub struct PerspectiveAgent {
    deps: AgentDeps,
    kind: PerspectiveKind,
    session: ChatSession,
}

impl PerspectiveAgent {
    /// Start one perspective.
    pub fn start(deps: AgentDeps, kind: PerspectiveKind) -> Self {
        let session = ChatSession::start(
            deps.backend.clone(),
            deps.resilience.clone(),
            format!(
                "You sit on a story planning council. {} Respond with JSON only.",
                perspective_charge(kind)
            ),
        );
        Self {
            deps,
            kind,
            session,
        }
    }

    /// The perspective this agent speaks for.
    pub const fn kind(&self) -> PerspectiveKind {
        self.kind
    }

    /// Produce a proposal for the planning window. Any failure yields an
    /// empty proposal -- the council proceeds without this voice.
    pub async fn propose(
        &mut self,
        state: &GameState,
        definition: &SystemDefinition,
        existing: &PlotGraph,
        level_ceiling: u32,
    ) -> AgentProposal {
        let agent_id = format!("perspective:{:?}", self.kind).to_lowercase();
        let existing_nodes: Vec<serde_json::Value> = existing
            .nodes
            .values()
            .map(|n| {
                serde_json::json!({
                    "status": format!("{:?}", n.status),
                    "title": n.beat.title,
                    "trigger_level": n.beat.trigger_level,
                    "thread": n.thread_id.as_str(),
                })
            })
            .collect();
        let context = serde_json::json!({
            "perspective": format!("{:?}", self.kind),
            "perspective_charge": perspective_charge(self.kind),
            "system_name": definition.name,
            "central_mystery": definition.central_mystery,
            "threat": definition.threat,
            "theme": definition.theme,
            "player_name": state.player_name,
            "level": state.character.level,
            "grade": state.character.grade.label(),
            "location_name": state.current_location.name,
            "active_quests": state.active_quests.values().map(|q| q.name.clone()).collect::<Vec<_>>(),
            "existing_nodes": existing_nodes,
            "level_floor": state.character.level,
            "level_ceiling": level_ceiling,
        });

        let prompt = match self.deps.prompts.render(names::PERSPECTIVE, &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(kind = ?self.kind, error = %e, "perspective prompt failed");
                return AgentProposal::empty(agent_id, self.kind);
            }
        };

        let raw = match self.session.send(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(kind = ?self.kind, error = %e, "perspective call failed, contributing empty proposal");
                return AgentProposal::empty(agent_id, self.kind);
            }
        };
        let draft = match extract_json::<ProposalDraft>(&raw) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(kind = ?self.kind, error = %e, "perspective output unparseable, contributing empty proposal");
                return AgentProposal::empty(agent_id, self.kind);
            }
        };

        draft_to_proposal(agent_id, self.kind, draft)
    }
}

/// Convert a parsed draft into a typed proposal.
fn draft_to_proposal(
    agent_id: String,
    kind: PerspectiveKind,
    draft: ProposalDraft,
) -> AgentProposal {
    let mut proposal = AgentProposal::empty(agent_id, kind);
    proposal.reasoning = draft.reasoning;

    for node in draft.nodes {
        if node.id.is_empty() {
            continue;
        }
        let node_id = NodeId::from(node.id.as_str());
        let rating = node
            .rating
            .and_then(Decimal::from_f64)
            .map(|r| r.clamp(Decimal::ZERO, Decimal::ONE))
            .unwrap_or_else(|| Decimal::new(5, 1));
        proposal.ratings.insert(node_id.clone(), rating);
        proposal.nodes.push(PlotNode {
            id: node_id,
            beat: Beat {
                id: BeatId::from(node.id.as_str()),
                title: node.title,
                description: node.description,
                beat_type: parse_beat_type(node.beat_type.as_deref()),
                trigger_level: node.trigger_level,
                foreshadowing: node
                    .foreshadowing
                    .into_iter()
                    .map(|f| Foreshadow {
                        hint: f.hint,
                        must_appear_by: f.must_appear_by,
                    })
                    .collect(),
                consequences: node.consequences,
            },
            thread_id: if node.thread_id.is_empty() {
                ThreadId::from(format!("{kind:?}").to_lowercase())
            } else {
                ThreadId::from(node.thread_id)
            },
            position: NodePosition::default(),
            status: NodeStatus::Pending,
        });
    }

    for edge in draft.edges {
        if edge.from.is_empty() || edge.to.is_empty() {
            continue;
        }
        proposal.edges.push(PlotEdge {
            id: EdgeId::from(format!("{}:{}:{}", edge.from, edge.to, proposal.edges.len())),
            from: NodeId::from(edge.from),
            to: NodeId::from(edge.to),
            edge_type: parse_edge_type(edge.edge_type.as_deref()),
            weight: Decimal::new(5, 1),
            disabled: false,
        });
    }

    proposal
}

/// Parse a beat type token, defaulting to a hook.
fn parse_beat_type(s: Option<&str>) -> BeatType {
    let Some(s) = s else {
        return BeatType::Hook;
    };
    serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
        .unwrap_or(BeatType::Hook)
}

/// Parse an edge type token, defaulting to a dependency.
fn parse_edge_type(s: Option<&str>) -> EdgeType {
    let Some(s) = s else {
        return EdgeType::Dependency;
    };
    serde_json::from_value(serde_json::Value::String(s.trim().to_uppercase()))
        .unwrap_or(EdgeType::Dependency)
}
