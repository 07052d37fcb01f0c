use std::cell::RefCell;
use std::collections::HashSet;

use tracing::{debug, warn};

use parley_core::condition::{Condition, Operand};
use parley_core::graph::{Edge, Graph, NodeId};
use parley_core::participant::ParticipantBinding;
use parley_core::value::Value;

use crate::history::History;

/// Evaluates conditions against live participant state and session history.
///
/// Evaluation never mutates anything and never fails: anything that cannot be
/// resolved (unknown role, missing variable, unknown named condition,
/// incomparable types) makes the leaf `false`.
pub struct Evaluator<'a> {
    graph: &'a Graph,
    binding: &'a ParticipantBinding,
    history: &'a History,
    /// Nodes whose children are currently being expanded by `has_satisfied_child`.
    expanding: RefCell<HashSet<NodeId>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(graph: &'a Graph, binding: &'a ParticipantBinding, history: &'a History) -> Self {
        Self {
            graph,
            binding,
            history,
            expanding: RefCell::new(HashSet::new()),
        }
    }

    pub fn evaluate(&self, condition: &Condition) -> bool {
        match condition {
            Condition::All { conditions } => conditions.iter().all(|c| self.evaluate(c)),
            Condition::Any { conditions } => conditions.iter().any(|c| self.evaluate(c)),
            Condition::Not { condition } => !self.evaluate(condition),
            Condition::Always { value } => *value,
            Condition::Compare {
                role,
                variable,
                op,
                value,
            } => {
                let Some(lhs) = self.lookup(role, variable) else {
                    return false;
                };
                let Some(rhs) = self.resolve(value) else {
                    return false;
                };
                lhs.compare(*op, &rhs)
            }
            Condition::Check { role, name } => match self.binding.get(role) {
                Some(p) => p.check_condition(name).unwrap_or_else(|| {
                    debug!(role = %role, condition = %name, "Unknown named condition, treating as false");
                    false
                }),
                None => {
                    debug!(role = %role, "Unbound role in condition, treating as false");
                    false
                }
            },
            Condition::ParticipantKind { role, kind } => self
                .binding
                .get(role)
                .is_some_and(|p| p.kind() == *kind),
            Condition::NodeVisited { node } => self.history.has_visited(*node),
            Condition::EdgeFired { edge } => self.history.has_fired(*edge),
            Condition::HasSatisfiedChild { node } => self.has_satisfied_child(*node),
        }
    }

    /// Value of an operand, if it resolves.
    pub fn resolve(&self, operand: &Operand) -> Option<Value> {
        match operand {
            Operand::Literal(v) => Some(v.clone()),
            Operand::Variable { role, variable } => self.lookup(role, variable),
        }
    }

    fn lookup(&self, role: &str, variable: &str) -> Option<Value> {
        let Some(participant) = self.binding.get(role) else {
            debug!(role = %role, "Unbound role in condition, treating as false");
            return None;
        };
        let value = participant.variable(variable);
        if value.is_none() {
            debug!(role = %role, variable = %variable, "Missing variable in condition, treating as false");
        }
        value
    }

    /// A node is enterable when it has no enter condition or the condition holds.
    pub fn is_enterable(&self, node: NodeId) -> bool {
        match self.graph.node(node) {
            Some(n) => n.enter_condition.as_ref().map_or(true, |c| self.evaluate(c)),
            None => false,
        }
    }

    /// An edge is satisfied when its once-flag is not consumed, its guard holds
    /// and its target is enterable.
    pub fn is_edge_satisfied(&self, edge: &Edge) -> bool {
        if edge.once && self.history.is_once_consumed(edge.id) {
            return false;
        }
        if let Some(guard) = &edge.condition {
            if !self.evaluate(guard) {
                return false;
            }
        }
        self.is_enterable(edge.target)
    }

    /// Satisfied outgoing edges of `node`, in authored order.
    pub fn satisfied_edges(&self, node: NodeId) -> Vec<&'a Edge> {
        self.graph
            .outgoing_edges(node)
            .filter(|e| self.is_edge_satisfied(e))
            .collect()
    }

    /// Node whose outgoing edges `node` offers.
    ///
    /// A virtual-parent speech node offers the edges of the target of its
    /// first satisfied edge, followed further while that target is a virtual
    /// parent too. `None` when some link has no satisfied edge or the chain
    /// leads back to a node already on it.
    pub fn options_source(&self, node: NodeId) -> Option<NodeId> {
        let mut chain = HashSet::new();
        let mut current = node;
        while self.graph.node(current)?.is_virtual_parent() {
            if !chain.insert(current) {
                warn!(node = %node, looped_at = %current, "Virtual parent chain loops back on itself");
                return None;
            }
            current = self
                .graph
                .outgoing_edges(current)
                .find(|e| self.is_edge_satisfied(e))?
                .target;
        }
        Some(current)
    }

    fn has_satisfied_child(&self, node: NodeId) -> bool {
        // Re-entering a node that is already being expanded would recurse forever.
        if !self.expanding.borrow_mut().insert(node) {
            return false;
        }
        let result = self
            .graph
            .outgoing_edges(node)
            .any(|e| self.is_edge_satisfied(e));
        self.expanding.borrow_mut().remove(&node);
        result
    }
}
