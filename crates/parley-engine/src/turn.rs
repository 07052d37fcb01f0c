use serde::Serialize;

use parley_core::graph::{EdgeId, NodeId};

/// One selectable option, indexed the way `select_choice` expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub index: usize,
    pub edge: EdgeId,
    pub target: NodeId,
    pub text: Option<String>,
}

/// Every authored option of the current node, including ones whose guard is
/// false but that are flagged to be shown anyway (greyed out by the host).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionView {
    pub edge: EdgeId,
    pub text: Option<String>,
    pub satisfied: bool,
}

/// What the host presents: the current line and the options.
///
/// Empty (no node, no choices) once the session has ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Turn {
    pub node: Option<NodeId>,
    pub speaker: Option<String>,
    pub text: Option<String>,
    pub choices: Vec<Choice>,
    pub all_options: Vec<OptionView>,
}

impl Turn {
    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub fn awaits_choice(&self) -> bool {
        !self.choices.is_empty()
    }
}
