use thiserror::Error;

use crate::graph::{EdgeId, NodeId};

/// Structural problems found while loading a dialogue asset.
///
/// All of these are fatal: no session can be created from the asset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphLoadError {
    #[error("Malformed dialogue asset: {0}")]
    MalformedSchema(String),

    #[error("Unsupported schema version {found} (supported: {min_supported} up to {max_major}.x)")]
    UnsupportedVersion {
        found: String,
        min_supported: String,
        max_major: u32,
    },

    #[error("Edge {edge} targets missing node {target}")]
    DanglingEdgeTarget { edge: EdgeId, target: NodeId },

    #[error("Dialogue must have exactly one root node, found {found}")]
    MultipleOrMissingRoot { found: usize },

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Duplicate edge id: {0}")]
    DuplicateEdgeId(EdgeId),

    #[error("Node {node} lists unknown edge {edge}")]
    UnknownEdge { node: NodeId, edge: EdgeId },

    #[error("Node {node} lists edge {edge} whose source is node {source_node}")]
    EdgeSourceMismatch {
        node: NodeId,
        edge: EdgeId,
        source_node: NodeId,
    },

    #[error("Node {0} has no outgoing edges and is not an end node")]
    MissingExit(NodeId),

    #[error("Root node {root} has an incoming edge {edge}")]
    RootHasIncomingEdge { root: NodeId, edge: EdgeId },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DialogueError {
    // Host misuse
    #[error("Invalid choice {index}: only {available} option(s) offered")]
    InvalidChoice { index: usize, available: usize },

    #[error("Session is not awaiting a choice (state: {state})")]
    NotAwaitingChoice { state: String },

    #[error("Session cannot advance without a choice (state: {state})")]
    NotAdvanceable { state: String },

    // Authoring defects surfaced at runtime
    #[error("Dialogue got stuck: node {node} has no satisfied edge")]
    NoSatisfiedEdge { node: NodeId },

    #[error("Dialogue exceeded {limit} automatic steps without reaching a choice or an end")]
    AutoAdvanceLimit { limit: usize },

    // Load / config errors
    #[error(transparent)]
    Load(#[from] GraphLoadError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),
}

pub type Result<T> = std::result::Result<T, DialogueError>;

impl From<serde_json::Error> for GraphLoadError {
    fn from(e: serde_json::Error) -> Self {
        GraphLoadError::MalformedSchema(e.to_string())
    }
}
