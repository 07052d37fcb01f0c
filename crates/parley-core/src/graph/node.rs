use std::fmt;

use serde::{Deserialize, Serialize};

use super::edge::EdgeId;
use crate::condition::Condition;
use crate::effect::Effect;

/// Stable node identity, assigned by the authoring tool.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl From<u32> for NodeId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an automatically resolved node picks among its satisfied edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First satisfied edge in authored order.
    #[default]
    First,
    /// Weighted random draw among satisfied edges.
    Random,
}

/// Node kind and its kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Speech {
        speaker: String,
        text: String,
        /// Offer the options of the first satisfied child instead of this
        /// node's own edges.
        #[serde(default)]
        virtual_parent: bool,
    },
    SelectorFirst {
        /// Offer every satisfied branch to the host instead of picking one.
        #[serde(default)]
        expose_choices: bool,
    },
    SelectorRandom {
        #[serde(default)]
        expose_choices: bool,
    },
    Gate {
        #[serde(default)]
        policy: SelectionPolicy,
    },
    End,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Speech { .. } => "speech",
            NodeKind::SelectorFirst { .. } => "selector_first",
            NodeKind::SelectorRandom { .. } => "selector_random",
            NodeKind::Gate { .. } => "gate",
            NodeKind::End => "end",
        }
    }
}

/// A node in the dialogue graph.
///
/// Outgoing edges are referenced by id; the edges themselves live in the
/// graph's edge arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Outgoing edges in authored order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<EdgeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_enter: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_exit: Vec<Effect>,
    /// The node can only be entered while this holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enter_condition: Option<Condition>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            edges: vec![],
            on_enter: vec![],
            on_exit: vec![],
            enter_condition: None,
        }
    }

    pub fn root(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::Root)
    }

    pub fn speech(id: impl Into<NodeId>, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            id,
            NodeKind::Speech {
                speaker: speaker.into(),
                text: text.into(),
                virtual_parent: false,
            },
        )
    }

    pub fn gate(id: impl Into<NodeId>, policy: SelectionPolicy) -> Self {
        Self::new(id, NodeKind::Gate { policy })
    }

    pub fn end(id: impl Into<NodeId>) -> Self {
        Self::new(id, NodeKind::End)
    }

    /// Set the outgoing edges.
    pub fn with_edges(mut self, edges: Vec<EdgeId>) -> Self {
        self.edges = edges;
        self
    }

    pub fn with_on_enter(mut self, effects: Vec<Effect>) -> Self {
        self.on_enter = effects;
        self
    }

    pub fn with_on_exit(mut self, effects: Vec<Effect>) -> Self {
        self.on_exit = effects;
        self
    }

    /// Make a speech node a virtual parent. No effect on other kinds.
    pub fn with_virtual_parent(mut self) -> Self {
        if let NodeKind::Speech { virtual_parent, .. } = &mut self.kind {
            *virtual_parent = true;
        }
        self
    }

    pub fn with_enter_condition(mut self, condition: Condition) -> Self {
        self.enter_condition = Some(condition);
        self
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, NodeKind::End)
    }

    pub fn is_virtual_parent(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Speech {
                virtual_parent: true,
                ..
            }
        )
    }

    /// Speaker role, for speech nodes.
    pub fn speaker(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Speech { speaker, .. } => Some(speaker),
            _ => None,
        }
    }
}
