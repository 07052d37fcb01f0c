//! The immutable, authored dialogue graph.
//!
//! Nodes and edges live in flat arenas owned by [`Graph`]; every cross
//! reference (edge → node, node → edge) is a plain integer id resolved through
//! the store. A loaded graph is never mutated, so a single `Arc<Graph>` can back
//! any number of concurrent sessions.

pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphLoadError;

pub use edge::{Edge, EdgeId};
pub use node::{Node, NodeId, NodeKind, SelectionPolicy};

/// Highest schema major version this engine understands.
pub const SCHEMA_MAJOR: u32 = 1;
/// Oldest schema version accepted by [`Graph::load`].
pub const MIN_SCHEMA_VERSION: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

/// `MAJOR.MINOR` asset schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major.parse().ok()?, minor.parse().ok()?),
            None => (s.parse().ok()?, 0),
        };
        Some(Self { major, minor })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Serialized form of a dialogue graph.
///
/// Unknown fields are ignored so assets written by newer minor versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAsset {
    pub schema_version: String,
    #[serde(default)]
    pub name: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A validated dialogue graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    name: String,
    version: SchemaVersion,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_index: HashMap<NodeId, usize>,
    edge_index: HashMap<EdgeId, usize>,
    root: NodeId,
}

impl Graph {
    /// Parse and validate a JSON dialogue asset.
    pub fn load(json: &str) -> Result<Self, GraphLoadError> {
        let asset: GraphAsset = serde_json::from_str(json)?;
        Self::from_asset(asset)
    }

    /// Validate an already-deserialized asset.
    pub fn from_asset(asset: GraphAsset) -> Result<Self, GraphLoadError> {
        let version = check_version(&asset.schema_version, MIN_SCHEMA_VERSION)?;

        let mut node_index = HashMap::with_capacity(asset.nodes.len());
        for (i, node) in asset.nodes.iter().enumerate() {
            if node_index.insert(node.id, i).is_some() {
                return Err(GraphLoadError::DuplicateNodeId(node.id));
            }
        }

        let mut edge_index = HashMap::with_capacity(asset.edges.len());
        for (i, edge) in asset.edges.iter().enumerate() {
            if edge_index.insert(edge.id, i).is_some() {
                return Err(GraphLoadError::DuplicateEdgeId(edge.id));
            }
            if !node_index.contains_key(&edge.target) {
                return Err(GraphLoadError::DanglingEdgeTarget {
                    edge: edge.id,
                    target: edge.target,
                });
            }
            if !node_index.contains_key(&edge.source) {
                return Err(GraphLoadError::MalformedSchema(format!(
                    "edge {} has unknown source node {}",
                    edge.id, edge.source
                )));
            }
            if !edge.weight.is_finite() || edge.weight < 0.0 {
                return Err(GraphLoadError::MalformedSchema(format!(
                    "edge {} has invalid weight {}",
                    edge.id, edge.weight
                )));
            }
        }

        let roots: Vec<&Node> = asset
            .nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Root))
            .collect();
        if roots.len() != 1 {
            return Err(GraphLoadError::MultipleOrMissingRoot { found: roots.len() });
        }
        let root = roots[0].id;

        let mut listed: HashSet<EdgeId> = HashSet::new();
        for node in &asset.nodes {
            let mut total_weight = 0.0_f64;
            for edge_id in &node.edges {
                let edge = edge_index
                    .get(edge_id)
                    .map(|&i| &asset.edges[i])
                    .ok_or(GraphLoadError::UnknownEdge {
                        node: node.id,
                        edge: *edge_id,
                    })?;
                if edge.source != node.id {
                    return Err(GraphLoadError::EdgeSourceMismatch {
                        node: node.id,
                        edge: *edge_id,
                        source_node: edge.source,
                    });
                }
                if !listed.insert(*edge_id) {
                    return Err(GraphLoadError::MalformedSchema(format!(
                        "node {} lists edge {} more than once",
                        node.id, edge_id
                    )));
                }
                total_weight += edge.weight;
            }
            // Random draws sum the weights of a node's edges.
            if !total_weight.is_finite() {
                return Err(GraphLoadError::MalformedSchema(format!(
                    "edge weights of node {} do not sum to a finite value",
                    node.id
                )));
            }
            match (node.is_end(), node.edges.is_empty()) {
                (false, true) => return Err(GraphLoadError::MissingExit(node.id)),
                (true, false) => {
                    return Err(GraphLoadError::MalformedSchema(format!(
                        "end node {} has outgoing edges",
                        node.id
                    )))
                }
                _ => {}
            }
        }

        for edge in &asset.edges {
            if !listed.contains(&edge.id) {
                return Err(GraphLoadError::MalformedSchema(format!(
                    "edge {} is not listed by its source node {}",
                    edge.id, edge.source
                )));
            }
            if edge.target == root {
                return Err(GraphLoadError::RootHasIncomingEdge {
                    root,
                    edge: edge.id,
                });
            }
        }

        let mut referenced = Vec::new();
        for node in &asset.nodes {
            if let Some(cond) = &node.enter_condition {
                cond.referenced_nodes(&mut referenced);
            }
        }
        for edge in &asset.edges {
            if let Some(cond) = &edge.condition {
                cond.referenced_nodes(&mut referenced);
            }
        }
        if let Some(missing) = referenced.iter().find(|id| !node_index.contains_key(id)) {
            return Err(GraphLoadError::MalformedSchema(format!(
                "condition references unknown node {}",
                missing
            )));
        }

        debug!(
            name = %asset.name,
            version = %version,
            nodes = asset.nodes.len(),
            edges = asset.edges.len(),
            "Dialogue graph loaded"
        );

        Ok(Self {
            name: asset.name,
            version,
            nodes: asset.nodes,
            edges: asset.edges,
            node_index,
            edge_index,
            root,
        })
    }

    /// Serialize back to the asset shape (round-trips through [`Graph::from_asset`]).
    pub fn to_asset(&self) -> GraphAsset {
        GraphAsset {
            schema_version: self.version.to_string(),
            name: self.name.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, GraphLoadError> {
        Ok(serde_json::to_string_pretty(&self.to_asset())?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.version
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index.get(&id).map(|&i| &self.edges[i])
    }

    /// Outgoing edges of a node, in authored order. Empty for unknown nodes.
    pub fn outgoing_edges(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|n| n.edges.iter())
            .filter_map(|e| self.edge(*e))
    }

    /// Position of an edge in its source node's outgoing list.
    pub fn ordinal(&self, id: EdgeId) -> Option<usize> {
        let edge = self.edge(id)?;
        self.node(edge.source)?.edges.iter().position(|e| *e == id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Check an asset version string against the supported window.
pub fn check_version(raw: &str, min: SchemaVersion) -> Result<SchemaVersion, GraphLoadError> {
    let version = SchemaVersion::parse(raw).ok_or_else(|| {
        GraphLoadError::MalformedSchema(format!("invalid schema_version '{}'", raw))
    })?;
    if version < min || version.major > SCHEMA_MAJOR {
        return Err(GraphLoadError::UnsupportedVersion {
            found: raw.to_string(),
            min_supported: min.to_string(),
            max_major: SCHEMA_MAJOR,
        });
    }
    Ok(version)
}
