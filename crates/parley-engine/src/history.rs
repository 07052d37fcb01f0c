use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use parley_core::graph::{EdgeId, NodeId};

/// One traversal step: the node that was left and the edge taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub node: NodeId,
    pub edge: EdgeId,
}

/// Per-session memory of what the dialogue has already done.
///
/// Append-only: nothing is ever removed for the life of a session. The
/// traversal engine is the only writer; condition evaluation only reads.
/// Serializable so a host can persist it and later resume a dialogue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    visited: HashSet<NodeId>,
    trace: Vec<TraceEntry>,
    traversed: HashSet<EdgeId>,
    fired_once: HashSet<EdgeId>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_visit(&mut self, node: NodeId) {
        self.visited.insert(node);
    }

    /// Record that `edge` was taken out of `node`.
    pub fn record_traversal(&mut self, node: NodeId, edge: EdgeId) {
        self.trace.push(TraceEntry { node, edge });
        self.traversed.insert(edge);
    }

    /// Consume a fire-once edge.
    pub fn record_fired_once(&mut self, edge: EdgeId) {
        self.fired_once.insert(edge);
    }

    pub fn has_visited(&self, node: NodeId) -> bool {
        self.visited.contains(&node)
    }

    /// Whether the edge has been traversed at least once.
    pub fn has_fired(&self, edge: EdgeId) -> bool {
        self.traversed.contains(&edge)
    }

    /// Whether a fire-once edge has been used up.
    pub fn is_once_consumed(&self, edge: EdgeId) -> bool {
        self.fired_once.contains(&edge)
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
