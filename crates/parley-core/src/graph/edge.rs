use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::NodeId;
use crate::condition::Condition;

/// Stable edge identity, assigned by the authoring tool.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u32);

impl From<u32> for EdgeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge connecting two nodes in the dialogue graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    /// Guard; an unguarded edge is always satisfied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Usable at most once per session.
    #[serde(default, skip_serializing_if = "is_false")]
    pub once: bool,
    /// Relative weight for random selection.
    #[serde(default = "default_weight", skip_serializing_if = "is_default_weight")]
    pub weight: f64,
    /// Option label shown when the edge is offered as a choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// List the option, marked unavailable, even while its guard fails.
    #[serde(default, skip_serializing_if = "is_false")]
    pub show_when_unsatisfied: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn is_default_weight(w: &f64) -> bool {
    *w == default_weight()
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Edge {
    /// Create an unguarded edge.
    pub fn new(id: impl Into<EdgeId>, source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            condition: None,
            once: false,
            weight: default_weight(),
            text: None,
            show_when_unsatisfied: false,
        }
    }

    /// Create a guarded edge.
    pub fn guarded(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        condition: Condition,
    ) -> Self {
        Self::new(id, source, target).with_condition(condition)
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_once(mut self) -> Self {
        self.once = true;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_show_when_unsatisfied(mut self) -> Self {
        self.show_when_unsatisfied = true;
        self
    }
}
