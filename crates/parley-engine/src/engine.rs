use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use parley_core::config::EngineConfig;
use parley_core::error::GraphLoadError;
use parley_core::graph::{check_version, Graph, NodeId, SchemaVersion, MIN_SCHEMA_VERSION};
use parley_core::participant::ParticipantBinding;

use crate::history::History;
use crate::session::Session;

/// Where to pick up a dialogue that was started earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub node: NodeId,
    pub history: History,
    /// Apply the node's `on_enter` effects again when resuming.
    #[serde(default)]
    pub fire_enter_events: bool,
}

/// Creates dialogue sessions under one engine configuration.
///
/// The engine itself holds no per-session state; any number of sessions may
/// run at once over the same `Arc<Graph>`.
#[derive(Debug, Clone, Default)]
pub struct DialogueEngine {
    config: EngineConfig,
}

impl DialogueEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a session at the graph's root.
    ///
    /// Only an incompatible graph is an error. A dialogue that gets stuck on
    /// its way to the first turn still yields a session, already ended, with
    /// the cause in `end_reason`.
    pub fn start_dialogue(
        &self,
        graph: Arc<Graph>,
        binding: ParticipantBinding,
        seed: Option<u64>,
    ) -> Result<Session, GraphLoadError> {
        self.check_graph(&graph)?;
        let root = graph.root();
        let mut session = Session::new(graph, binding, History::new(), &self.config, self.seed(seed));
        session.begin(root, true);
        Ok(session)
    }

    /// Start a session at an arbitrary node with a previously saved history.
    pub fn resume_dialogue(
        &self,
        graph: Arc<Graph>,
        binding: ParticipantBinding,
        point: ResumePoint,
        seed: Option<u64>,
    ) -> Result<Session, GraphLoadError> {
        self.check_graph(&graph)?;
        if graph.node(point.node).is_none() {
            return Err(GraphLoadError::MalformedSchema(format!(
                "resume node {} does not exist in graph '{}'",
                point.node,
                graph.name()
            )));
        }
        let mut session = Session::new(graph, binding, point.history, &self.config, self.seed(seed));
        session.begin(point.node, point.fire_enter_events);
        Ok(session)
    }

    fn check_graph(&self, graph: &Graph) -> Result<SchemaVersion, GraphLoadError> {
        let min = self.config.min_version().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to the default minimum schema version");
            MIN_SCHEMA_VERSION
        });
        check_version(&graph.schema_version().to_string(), min)
    }

    fn seed(&self, explicit: Option<u64>) -> u64 {
        explicit.or(self.config.seed).unwrap_or_else(rand::random)
    }
}
