//! Error types for the plot engines.

use fateloom_types::enums::NodeStatus;
use fateloom_types::ids::NodeId;

/// Errors from plot graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlotError {
    /// The node does not exist in the graph.
    #[error("unknown plot node: {0}")]
    UnknownNode(NodeId),

    /// The requested status change violates the monotone lifecycle.
    #[error("illegal status transition for {node}: {from:?} -> {to:?}")]
    IllegalTransition {
        /// The node.
        node: NodeId,
        /// Current status.
        from: NodeStatus,
        /// Requested status.
        to: NodeStatus,
    },
}
