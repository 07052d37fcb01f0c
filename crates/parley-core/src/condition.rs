use serde::{Deserialize, Serialize};

use crate::graph::{EdgeId, NodeId};
use crate::value::{CompareOp, Value};

/// Right-hand side of a comparison or a modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Read another participant's variable at evaluation time.
    Variable { role: String, variable: String },
    /// A literal authored in the asset.
    Literal(Value),
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    pub fn variable(role: impl Into<String>, variable: impl Into<String>) -> Self {
        Operand::Variable {
            role: role.into(),
            variable: variable.into(),
        }
    }
}

/// Boolean expression tree guarding edges and node entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// True when every child is true. An empty list is true.
    All { conditions: Vec<Condition> },
    /// True when any child is true. An empty list is false.
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
    /// Constant, mostly useful for disabling a branch while authoring.
    Always { value: bool },
    /// Compare a participant variable with a literal or another variable.
    Compare {
        role: String,
        variable: String,
        op: CompareOp,
        value: Operand,
    },
    /// Ask the participant to evaluate a named condition.
    Check { role: String, name: String },
    /// Participant class/type check.
    ParticipantKind { role: String, kind: String },
    NodeVisited { node: NodeId },
    EdgeFired { edge: EdgeId },
    /// True when the node currently has at least one satisfied outgoing edge.
    HasSatisfiedChild { node: NodeId },
}

impl Condition {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::All { conditions }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Any { conditions }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Condition::Not {
            condition: Box::new(condition),
        }
    }

    pub fn compare(
        role: impl Into<String>,
        variable: impl Into<String>,
        op: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        Condition::Compare {
            role: role.into(),
            variable: variable.into(),
            op,
            value: Operand::Literal(value.into()),
        }
    }

    pub fn node_visited(node: impl Into<NodeId>) -> Self {
        Condition::NodeVisited { node: node.into() }
    }

    pub fn edge_fired(edge: impl Into<EdgeId>) -> Self {
        Condition::EdgeFired { edge: edge.into() }
    }

    /// Node ids referenced by this tree, used for load-time validation.
    pub fn referenced_nodes(&self, out: &mut Vec<NodeId>) {
        match self {
            Condition::All { conditions } | Condition::Any { conditions } => {
                for c in conditions {
                    c.referenced_nodes(out);
                }
            }
            Condition::Not { condition } => condition.referenced_nodes(out),
            Condition::NodeVisited { node } | Condition::HasSatisfiedChild { node } => {
                out.push(*node)
            }
            _ => {}
        }
    }
}
