use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_core::config::{EngineConfig, StepMode};
use parley_core::error::{DialogueError, Result};
use parley_core::graph::{Edge, EdgeId, Graph, NodeId, NodeKind, SelectionPolicy};
use parley_core::participant::ParticipantBinding;

use crate::dispatcher::{ApplyReport, Dispatcher};
use crate::engine::ResumePoint;
use crate::evaluator::Evaluator;
use crate::history::{History, TraceEntry};
use crate::turn::{Choice, OptionView, Turn};

/// Unique identifier for a dialogue session.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AtNode,
    AwaitingChoice,
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::AtNode => "at_node",
            SessionState::AwaitingChoice => "awaiting_choice",
            SessionState::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Why a session reached `Ended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EndReason {
    /// An end node was reached.
    Completed { node: NodeId },
    /// The host called `end_dialogue`.
    Cancelled,
    /// A node had no satisfied outgoing edge.
    Stuck { node: NodeId },
    /// Automatic traversal exceeded the configured step budget.
    StepLimit { node: NodeId, limit: usize },
}

impl EndReason {
    /// The error a fatal end corresponds to, if any.
    pub fn error(&self) -> Option<DialogueError> {
        match self {
            EndReason::Stuck { node } => Some(DialogueError::NoSatisfiedEdge { node: *node }),
            EndReason::StepLimit { limit, .. } => {
                Some(DialogueError::AutoAdvanceLimit { limit: *limit })
            }
            EndReason::Completed { .. } | EndReason::Cancelled => None,
        }
    }
}

/// One run through a dialogue graph.
///
/// A session owns its participant binding and history and shares the graph.
/// Every host call runs synchronously until the dialogue needs input again:
/// a choice, a manual `advance`, or the end.
pub struct Session {
    id: SessionId,
    started_at: DateTime<Utc>,
    graph: Arc<Graph>,
    binding: ParticipantBinding,
    history: History,
    state: SessionState,
    current: Option<NodeId>,
    /// Edges offered while awaiting a choice, in authored order.
    offered: Vec<EdgeId>,
    /// The single way forward while resting on a speech node in manual mode.
    pending: Option<EdgeId>,
    /// Node whose edges a virtual-parent speech node is offering.
    options_from: Option<NodeId>,
    end_reason: Option<EndReason>,
    last_report: ApplyReport,
    step_mode: StepMode,
    max_auto_steps: usize,
    seed: u64,
    rng: StdRng,
}

impl Session {
    pub(crate) fn new(
        graph: Arc<Graph>,
        binding: ParticipantBinding,
        history: History,
        config: &EngineConfig,
        seed: u64,
    ) -> Self {
        Self {
            id: SessionId::new(),
            started_at: Utc::now(),
            graph,
            binding,
            history,
            state: SessionState::Idle,
            current: None,
            offered: Vec::new(),
            pending: None,
            options_from: None,
            end_reason: None,
            last_report: ApplyReport::default(),
            step_mode: config.step_mode,
            max_auto_steps: config.max_auto_steps,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Enter `node` and run until input is needed.
    ///
    /// Fatal traversal errors are not returned: they end the session and are
    /// kept in [`Session::end_reason`].
    pub(crate) fn begin(&mut self, node: NodeId, fire_enter_events: bool) {
        info!(
            session = %self.id,
            graph = %self.graph.name(),
            node = %node,
            seed = self.seed,
            "Dialogue session started"
        );
        let graph = Arc::clone(&self.graph);
        self.enter(&graph, node, fire_enter_events);
        if let Err(e) = self.run() {
            warn!(session = %self.id, error = %e, "Dialogue ended during start");
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == SessionState::Ended
    }

    /// Node the session is resting on (or ended on).
    pub fn current_node(&self) -> Option<NodeId> {
        self.current
    }

    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    /// Seed of the session's random source; replaying with it reproduces
    /// every random selection.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Effects applied (and skipped) by the most recent host call.
    pub fn last_report(&self) -> &ApplyReport {
        &self.last_report
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.history.trace()
    }

    pub fn binding(&self) -> &ParticipantBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut ParticipantBinding {
        &mut self.binding
    }

    /// Hand the participants back to the host.
    pub fn into_binding(self) -> ParticipantBinding {
        self.binding
    }

    /// Where to pick this dialogue up later, or `None` once it has ended.
    pub fn resume_point(&self) -> Option<ResumePoint> {
        if self.is_ended() {
            return None;
        }
        Some(ResumePoint {
            node: self.current?,
            history: self.history.clone(),
            fire_enter_events: false,
        })
    }

    /// What the host should present right now.
    pub fn current_turn(&self) -> Turn {
        let Some(node_id) = self.current.filter(|_| !self.is_ended()) else {
            return Turn::default();
        };
        let Some(node) = self.graph.node(node_id) else {
            return Turn::default();
        };

        let (speaker, text) = match &node.kind {
            NodeKind::Speech { speaker, text, .. } => (Some(speaker.clone()), Some(text.clone())),
            _ => (None, None),
        };

        let choices = if self.state == SessionState::AwaitingChoice {
            self.offered
                .iter()
                .enumerate()
                .filter_map(|(index, id)| {
                    let edge = self.graph.edge(*id)?;
                    Some(Choice {
                        index,
                        edge: edge.id,
                        target: edge.target,
                        text: edge.text.clone(),
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        let all_options = self
            .graph
            .outgoing_edges(self.options_from.unwrap_or(node_id))
            .filter_map(|edge| {
                let satisfied = self.offered.contains(&edge.id) || self.pending == Some(edge.id);
                (satisfied || edge.show_when_unsatisfied).then(|| OptionView {
                    edge: edge.id,
                    text: edge.text.clone(),
                    satisfied,
                })
            })
            .collect();

        Turn {
            node: Some(node_id),
            speaker,
            text,
            choices,
            all_options,
        }
    }

    /// Take the offered choice at `index`.
    ///
    /// An out-of-range index leaves the session untouched.
    pub fn select_choice(&mut self, index: usize) -> Result<()> {
        if self.state != SessionState::AwaitingChoice {
            return Err(DialogueError::NotAwaitingChoice {
                state: self.state.to_string(),
            });
        }
        let Some(&edge_id) = self.offered.get(index) else {
            return Err(DialogueError::InvalidChoice {
                index,
                available: self.offered.len(),
            });
        };

        debug!(session = %self.id, index, edge = %edge_id, "Choice selected");
        self.last_report = ApplyReport::default();
        self.offered.clear();

        let graph = Arc::clone(&self.graph);
        if let (Some(from), Some(edge)) = (self.current, graph.edge(edge_id)) {
            self.traverse(&graph, from, edge);
        }
        self.run()
    }

    /// Move past a speech node the session is resting on in manual mode.
    pub fn advance(&mut self) -> Result<()> {
        let edge_id = match (self.state, self.pending) {
            (SessionState::AtNode, Some(edge)) => edge,
            _ => {
                return Err(DialogueError::NotAdvanceable {
                    state: self.state.to_string(),
                })
            }
        };

        self.last_report = ApplyReport::default();
        self.pending = None;

        let graph = Arc::clone(&self.graph);
        if let (Some(from), Some(edge)) = (self.current, graph.edge(edge_id)) {
            self.traverse(&graph, from, edge);
        }
        self.run()
    }

    /// Cancel the dialogue. No events fire; calling it again does nothing.
    pub fn end_dialogue(&mut self) {
        if self.is_ended() {
            return;
        }
        self.finish(EndReason::Cancelled);
    }

    /// Resolve nodes from the current one until the dialogue needs the host.
    fn run(&mut self) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let mut steps = 0usize;

        loop {
            let Some(node_id) = self.current else {
                return Ok(());
            };
            let Some(node) = graph.node(node_id) else {
                return Ok(());
            };

            if node.is_end() {
                let report = Dispatcher::apply(&node.on_exit, &mut self.binding);
                self.last_report.merge(report);
                self.finish(EndReason::Completed { node: node_id });
                return Ok(());
            }

            let (source, satisfied): (NodeId, Vec<&Edge>) = {
                let evaluator = Evaluator::new(&graph, &self.binding, &self.history);
                match evaluator.options_source(node_id) {
                    Some(source) => (
                        source,
                        graph
                            .outgoing_edges(source)
                            .filter(|e| evaluator.is_edge_satisfied(e))
                            .collect(),
                    ),
                    None => (node_id, Vec::new()),
                }
            };
            self.options_from = (source != node_id).then_some(source);

            if satisfied.is_empty() {
                warn!(session = %self.id, node = %node_id, kind = node.kind.name(), "No satisfied edge");
                self.finish(EndReason::Stuck { node: node_id });
                return Err(DialogueError::NoSatisfiedEdge { node: node_id });
            }

            let next = match &node.kind {
                NodeKind::Root => satisfied[0],
                NodeKind::Gate { policy } => self.pick(*policy, &satisfied),
                NodeKind::SelectorFirst { expose_choices } => {
                    if *expose_choices && satisfied.len() > 1 {
                        self.await_choice(&satisfied);
                        return Ok(());
                    }
                    satisfied[0]
                }
                NodeKind::SelectorRandom { expose_choices } => {
                    if *expose_choices && satisfied.len() > 1 {
                        self.await_choice(&satisfied);
                        return Ok(());
                    }
                    self.pick(SelectionPolicy::Random, &satisfied)
                }
                NodeKind::Speech { .. } => {
                    if satisfied.len() > 1 {
                        self.await_choice(&satisfied);
                        return Ok(());
                    }
                    if self.step_mode == StepMode::Manual {
                        self.state = SessionState::AtNode;
                        self.pending = Some(satisfied[0].id);
                        return Ok(());
                    }
                    satisfied[0]
                }
                NodeKind::End => return Ok(()),
            };

            if steps >= self.max_auto_steps {
                warn!(session = %self.id, node = %node_id, limit = self.max_auto_steps, "Automatic step limit reached");
                self.finish(EndReason::StepLimit {
                    node: node_id,
                    limit: self.max_auto_steps,
                });
                return Err(DialogueError::AutoAdvanceLimit {
                    limit: self.max_auto_steps,
                });
            }
            steps += 1;
            self.traverse(&graph, node_id, next);
        }
    }

    fn pick<'g>(&mut self, policy: SelectionPolicy, satisfied: &[&'g Edge]) -> &'g Edge {
        match policy {
            SelectionPolicy::First => satisfied[0],
            SelectionPolicy::Random => {
                let index = match WeightedIndex::new(satisfied.iter().map(|e| e.weight)) {
                    Ok(dist) => dist.sample(&mut self.rng),
                    // All weights zero: every branch is equally likely.
                    Err(_) => self.rng.gen_range(0..satisfied.len()),
                };
                satisfied[index]
            }
        }
    }

    fn await_choice(&mut self, satisfied: &[&Edge]) {
        self.offered = satisfied.iter().map(|e| e.id).collect();
        self.state = SessionState::AwaitingChoice;
        debug!(
            session = %self.id,
            node = ?self.current,
            choices = self.offered.len(),
            "Awaiting choice"
        );
    }

    /// Exit `from`, record the step and enter the edge's target.
    ///
    /// `from` is the edge's source except when a virtual parent offered the
    /// edge on behalf of its child.
    fn traverse(&mut self, graph: &Graph, from: NodeId, edge: &Edge) {
        if let Some(node) = graph.node(from) {
            let report = Dispatcher::apply(&node.on_exit, &mut self.binding);
            self.last_report.merge(report);
        }
        self.history.record_traversal(from, edge.id);
        if edge.once {
            self.history.record_fired_once(edge.id);
        }
        debug!(session = %self.id, from = %from, to = %edge.target, edge = %edge.id, "Traversed edge");
        self.enter(graph, edge.target, true);
    }

    fn enter(&mut self, graph: &Graph, node: NodeId, fire_enter_events: bool) {
        self.history.record_visit(node);
        self.current = Some(node);
        self.options_from = None;
        self.state = SessionState::AtNode;
        if fire_enter_events {
            if let Some(n) = graph.node(node) {
                let report = Dispatcher::apply(&n.on_enter, &mut self.binding);
                self.last_report.merge(report);
            }
        }
    }

    fn finish(&mut self, reason: EndReason) {
        info!(session = %self.id, reason = ?reason, steps = self.history.trace().len(), "Dialogue ended");
        self.state = SessionState::Ended;
        self.offered.clear();
        self.pending = None;
        self.end_reason = Some(reason);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("graph", &self.graph.name())
            .field("state", &self.state)
            .field("current", &self.current)
            .field("end_reason", &self.end_reason)
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::graph::Node;
    use parley_core::participant::{MemoryParticipant, Participant};
    use parley_core::value::{ModifyOp, Value};
    use parley_core::{Condition, Effect};
    use parley_test_utils as fixtures;

    use crate::engine::DialogueEngine;

    fn engine() -> DialogueEngine {
        DialogueEngine::new(EngineConfig::default())
    }

    fn manual() -> DialogueEngine {
        DialogueEngine::new(EngineConfig::default().with_step_mode(StepMode::Manual))
    }

    #[test]
    fn test_false_flag_auto_advances_past_choice() {
        let session = engine()
            .start_dialogue(fixtures::flag_scenario(), fixtures::binding(false, 0), Some(1))
            .unwrap();

        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(3) }));
        assert!(!session.history().has_visited(NodeId(2)));
        assert_eq!(
            session.trace(),
            &[
                TraceEntry { node: NodeId(0), edge: EdgeId(0) },
                TraceEntry { node: NodeId(1), edge: EdgeId(2) },
            ]
        );
        assert!(session.current_turn().is_empty());
    }

    #[test]
    fn test_true_flag_offers_both_branches() {
        let session = engine()
            .start_dialogue(fixtures::flag_scenario(), fixtures::binding(true, 0), Some(1))
            .unwrap();

        assert_eq!(session.state(), SessionState::AwaitingChoice);
        let turn = session.current_turn();
        assert_eq!(turn.node, Some(NodeId(1)));
        assert_eq!(turn.speaker.as_deref(), Some("npc"));
        assert_eq!(turn.text.as_deref(), Some("A"));
        let texts: Vec<_> = turn.choices.iter().map(|c| c.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["To B", "To C"]);
        assert_eq!(turn.choices[1].index, 1);
        assert_eq!(turn.choices[1].target, NodeId(3));
    }

    #[test]
    fn test_invalid_choice_leaves_session_untouched() {
        let mut session = engine()
            .start_dialogue(fixtures::two_choices(), fixtures::binding(false, 0), Some(1))
            .unwrap();
        let before = session.history().clone();

        let err = session.select_choice(5).unwrap_err();
        assert_eq!(err, DialogueError::InvalidChoice { index: 5, available: 2 });
        assert_eq!(session.state(), SessionState::AwaitingChoice);
        assert_eq!(session.history(), &before);
        assert_eq!(session.current_turn().choices.len(), 2);

        session.select_choice(1).unwrap();
        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(3) }));
    }

    #[test]
    fn test_gate_without_exit_ends_session() {
        let mut session = engine()
            .start_dialogue(fixtures::gate_stuck(), fixtures::binding(false, 0), Some(1))
            .unwrap();

        assert_eq!(session.state(), SessionState::Ended);
        let reason = session.end_reason().cloned().unwrap();
        assert_eq!(reason, EndReason::Stuck { node: NodeId(1) });
        assert_eq!(
            reason.error(),
            Some(DialogueError::NoSatisfiedEdge { node: NodeId(1) })
        );
        assert!(matches!(
            session.select_choice(0),
            Err(DialogueError::NotAwaitingChoice { .. })
        ));
    }

    #[test]
    fn test_manual_mode_rests_on_single_exit_speech() {
        let mut session = manual()
            .start_dialogue(fixtures::flag_scenario(), fixtures::binding(false, 0), Some(1))
            .unwrap();

        assert_eq!(session.state(), SessionState::AtNode);
        let turn = session.current_turn();
        assert_eq!(turn.text.as_deref(), Some("A"));
        assert!(turn.choices.is_empty());
        assert_eq!(turn.all_options.len(), 1);
        assert!(turn.all_options[0].satisfied);
        assert!(matches!(
            session.select_choice(0),
            Err(DialogueError::NotAwaitingChoice { .. })
        ));

        session.advance().unwrap();
        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(3) }));
        assert!(matches!(
            session.advance(),
            Err(DialogueError::NotAdvanceable { .. })
        ));
    }

    #[test]
    fn test_advance_while_awaiting_choice_rejected() {
        let mut session = manual()
            .start_dialogue(fixtures::two_choices(), fixtures::binding(false, 0), Some(1))
            .unwrap();
        assert_eq!(
            session.advance(),
            Err(DialogueError::NotAdvanceable {
                state: "awaiting_choice".into()
            })
        );
    }

    #[test]
    fn test_random_selector_replays_with_same_seed() {
        let graph = fixtures::random_selector([1.0, 2.0, 3.0]);
        for seed in 0..20 {
            let a = engine()
                .start_dialogue(graph.clone(), fixtures::binding(false, 0), Some(seed))
                .unwrap();
            let b = engine()
                .start_dialogue(graph.clone(), fixtures::binding(false, 0), Some(seed))
                .unwrap();
            assert_eq!(a.trace(), b.trace());
            assert_eq!(a.seed(), seed);
        }
    }

    #[test]
    fn test_random_selector_respects_weights() {
        let graph = fixtures::random_selector([0.0, 1.0, 0.0]);
        for seed in 0..20 {
            let session = engine()
                .start_dialogue(graph.clone(), fixtures::binding(false, 0), Some(seed))
                .unwrap();
            assert!(session.history().has_visited(NodeId(3)));
            assert!(!session.history().has_visited(NodeId(2)));
            assert!(!session.history().has_visited(NodeId(4)));
        }

        // All-zero weights still pick a branch.
        let graph = fixtures::random_selector([0.0, 0.0, 0.0]);
        let session = engine()
            .start_dialogue(graph, fixtures::binding(false, 0), Some(3))
            .unwrap();
        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(9) }));
    }

    #[test]
    fn test_first_selector_is_deterministic() {
        let graph = fixtures::graph(
            "first",
            vec![
                Node::root(0).with_edges(vec![EdgeId(0)]),
                Node::new(1, NodeKind::SelectorFirst { expose_choices: false })
                    .with_edges(vec![EdgeId(1), EdgeId(2), EdgeId(3)]),
                Node::end(2),
                Node::end(3),
            ],
            vec![
                Edge::new(0, 0, 1),
                Edge::guarded(1, 1, 2, parley_core::Condition::Always { value: false }),
                Edge::new(2, 1, 3),
                Edge::new(3, 1, 2),
            ],
        );
        for seed in 0..10 {
            let session = engine()
                .start_dialogue(graph.clone(), fixtures::binding(false, 0), Some(seed))
                .unwrap();
            assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(3) }));
        }
    }

    #[test]
    fn test_exposed_selector_offers_choices() {
        let graph = fixtures::graph(
            "exposed",
            vec![
                Node::root(0).with_edges(vec![EdgeId(0)]),
                Node::new(1, NodeKind::SelectorRandom { expose_choices: true })
                    .with_edges(vec![EdgeId(1), EdgeId(2)]),
                Node::end(2),
                Node::end(3),
            ],
            vec![Edge::new(0, 0, 1), Edge::new(1, 1, 2), Edge::new(2, 1, 3)],
        );
        let session = engine()
            .start_dialogue(graph, fixtures::binding(false, 0), Some(1))
            .unwrap();
        let turn = session.current_turn();
        assert_eq!(session.state(), SessionState::AwaitingChoice);
        assert_eq!(turn.speaker, None);
        assert_eq!(turn.choices.len(), 2);
    }

    #[test]
    fn test_shop_loop_once_edges_and_events() {
        let player = fixtures::shared(fixtures::player(false, 12));
        let npc = fixtures::shared(fixtures::merchant());
        let binding = ParticipantBinding::new()
            .with("player", player.clone())
            .with("npc", npc.clone());
        let mut session = engine()
            .start_dialogue(fixtures::shop_loop(), binding, Some(1))
            .unwrap();

        let offered = |s: &Session| -> Vec<EdgeId> {
            s.current_turn().choices.iter().map(|c| c.edge).collect()
        };
        assert_eq!(offered(&session), vec![EdgeId(1), EdgeId(2), EdgeId(3)]);

        let mut trace_len = session.trace().len();
        session.select_choice(0).unwrap();
        assert!(session.trace().len() > trace_len);
        trace_len = session.trace().len();
        assert_eq!(player.lock().unwrap().variable("gold"), Some(Value::Int(7)));

        session.select_choice(1).unwrap();
        assert!(session.trace().len() > trace_len);
        assert!(session.history().is_once_consumed(EdgeId(2)));
        assert_eq!(player.lock().unwrap().variable("samples"), Some(Value::Int(1)));
        // The sample is gone; buying is still affordable.
        assert_eq!(offered(&session), vec![EdgeId(1), EdgeId(3)]);

        session.select_choice(0).unwrap();
        // Two gold left: only "leave" remains, so the merchant's line auto-advances.
        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(4) }));
        assert_eq!(player.lock().unwrap().variable("gold"), Some(Value::Int(2)));
        assert_eq!(npc.lock().unwrap().variable("greetings"), Some(Value::Int(4)));
        let handed: Vec<_> = npc
            .lock()
            .unwrap()
            .invocations
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        assert_eq!(handed, vec!["hand_over", "hand_over"]);
    }

    #[test]
    fn test_unaffordable_option_shown_greyed_out() {
        let session = engine()
            .start_dialogue(fixtures::shop_loop(), fixtures::binding(false, 3), Some(1))
            .unwrap();
        let turn = session.current_turn();

        assert_eq!(turn.choices.len(), 2);
        assert_eq!(turn.all_options.len(), 3);
        let buy = &turn.all_options[0];
        assert_eq!(buy.edge, EdgeId(1));
        assert!(!buy.satisfied);
    }

    #[test]
    fn test_end_dialogue_cancels_without_events() {
        let npc = fixtures::shared(fixtures::merchant());
        let binding = ParticipantBinding::new()
            .with("player", fixtures::player(false, 12))
            .with("npc", npc.clone());
        let mut session = engine()
            .start_dialogue(fixtures::shop_loop(), binding, Some(1))
            .unwrap();
        let trace_len = session.trace().len();

        session.end_dialogue();
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(session.end_reason(), Some(&EndReason::Cancelled));
        assert!(session.current_turn().is_empty());
        assert_eq!(session.trace().len(), trace_len);
        assert_eq!(npc.lock().unwrap().variable("greetings"), Some(Value::Int(1)));

        session.end_dialogue();
        assert_eq!(session.end_reason(), Some(&EndReason::Cancelled));
        assert!(session.resume_point().is_none());
    }

    #[test]
    fn test_endless_auto_traversal_hits_step_limit() {
        let engine = DialogueEngine::new(EngineConfig::default().with_max_auto_steps(50));
        let session = engine
            .start_dialogue(fixtures::endless_gates(), fixtures::binding(false, 0), Some(1))
            .unwrap();

        assert_eq!(session.state(), SessionState::Ended);
        let reason = session.end_reason().cloned().unwrap();
        assert!(matches!(reason, EndReason::StepLimit { limit: 50, .. }));
        assert_eq!(reason.error(), Some(DialogueError::AutoAdvanceLimit { limit: 50 }));
        assert_eq!(session.trace().len(), 50);
    }

    #[test]
    fn test_skipped_effects_reported_and_traversal_continues() {
        let graph = fixtures::graph(
            "skips",
            vec![
                Node::root(0)
                    .with_edges(vec![EdgeId(0)])
                    .with_on_exit(vec![Effect::set("ghost", "x", 1)]),
                Node::speech(1, "npc", "Still here")
                    .with_edges(vec![EdgeId(1)])
                    .with_on_enter(vec![
                        Effect::set("npc", "seen", true),
                        Effect::invoke("nobody", "wave", vec![]),
                    ]),
                Node::end(2),
            ],
            vec![Edge::new(0, 0, 1), Edge::new(1, 1, 2)],
        );
        let binding = ParticipantBinding::new()
            .with("npc", MemoryParticipant::new("Npc").with_variable("seen", false));
        let session = engine().start_dialogue(graph, binding, Some(1)).unwrap();

        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(2) }));
        let report = session.last_report();
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(session.binding().variable("npc", "seen"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_virtual_parent_offers_child_options() {
        let graph = fixtures::graph(
            "rumours",
            vec![
                Node::root(0).with_edges(vec![EdgeId(0)]),
                Node::speech(1, "npc", "What'll it be?")
                    .with_edges(vec![EdgeId(1), EdgeId(2)])
                    .with_on_enter(vec![Effect::modify("npc", "greetings", ModifyOp::Add, 1)]),
                Node::speech(2, "npc", "They say the pass is open.")
                    .with_virtual_parent()
                    .with_edges(vec![EdgeId(3)])
                    .with_on_exit(vec![Effect::modify("npc", "greetings", ModifyOp::Add, 10)]),
                Node::end(3),
            ],
            vec![
                Edge::new(0, 0, 1),
                Edge::new(1, 1, 2).with_text("Any rumours?"),
                Edge::new(2, 1, 3).with_text("Leave"),
                Edge::new(3, 2, 1),
            ],
        );
        let npc = fixtures::shared(fixtures::merchant());
        let binding = ParticipantBinding::new().with("npc", npc.clone());
        let mut session = engine().start_dialogue(graph, binding, Some(1)).unwrap();
        session.select_choice(0).unwrap();

        // Resting on the virtual parent, offering the hub's options.
        assert_eq!(session.state(), SessionState::AwaitingChoice);
        let turn = session.current_turn();
        assert_eq!(turn.node, Some(NodeId(2)));
        assert_eq!(turn.text.as_deref(), Some("They say the pass is open."));
        let texts: Vec<Option<&str>> = turn.choices.iter().map(|c| c.text.as_deref()).collect();
        assert_eq!(texts, vec![Some("Any rumours?"), Some("Leave")]);
        assert_eq!(turn.all_options.len(), 2);

        session.select_choice(1).unwrap();
        assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(3) }));
        // The hub was entered once; the last step left from the virtual parent.
        assert_eq!(
            session.trace(),
            &[
                TraceEntry { node: NodeId(0), edge: EdgeId(0) },
                TraceEntry { node: NodeId(1), edge: EdgeId(1) },
                TraceEntry { node: NodeId(2), edge: EdgeId(2) },
            ]
        );
        assert_eq!(npc.lock().unwrap().variable("greetings"), Some(Value::Int(11)));
    }

    #[test]
    fn test_virtual_parent_without_satisfied_child_is_stuck() {
        let graph = fixtures::graph(
            "mute",
            vec![
                Node::root(0).with_edges(vec![EdgeId(0)]),
                Node::speech(1, "npc", "...")
                    .with_virtual_parent()
                    .with_edges(vec![EdgeId(1)]),
                Node::end(2),
            ],
            vec![
                Edge::new(0, 0, 1),
                Edge::guarded(1, 1, 2, Condition::Always { value: false }),
            ],
        );
        let session = engine()
            .start_dialogue(graph, fixtures::binding(false, 0), Some(1))
            .unwrap();
        assert_eq!(session.end_reason(), Some(&EndReason::Stuck { node: NodeId(1) }));
    }

    #[test]
    fn test_virtual_parent_cycle_ends_session() {
        let graph = fixtures::graph(
            "echo",
            vec![
                Node::root(0).with_edges(vec![EdgeId(0)]),
                Node::speech(1, "npc", "Echo")
                    .with_virtual_parent()
                    .with_edges(vec![EdgeId(1)]),
                Node::speech(2, "npc", "Echo echo")
                    .with_virtual_parent()
                    .with_edges(vec![EdgeId(2)]),
            ],
            vec![Edge::new(0, 0, 1), Edge::new(1, 1, 2), Edge::new(2, 2, 1)],
        );
        let session = engine()
            .start_dialogue(graph, fixtures::binding(false, 0), Some(1))
            .unwrap();
        assert!(session.is_ended());
        assert_eq!(session.end_reason(), Some(&EndReason::Stuck { node: NodeId(1) }));
    }
}
