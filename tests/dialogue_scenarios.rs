use std::sync::Arc;
use std::thread;

use parley_core::config::EngineConfig;
use parley_core::graph::{EdgeId, Graph, NodeId};
use parley_core::participant::{MemoryParticipant, Participant, ParticipantBinding};
use parley_core::value::Value;
use parley_engine::{DialogueEngine, EndReason, SessionState};
use parley_test_utils as fixtures;

fn gatekeeper() -> Arc<Graph> {
    Arc::new(Graph::load(fixtures::SAMPLE_JSON).expect("sample graph loads"))
}

fn cast(has_pass: bool, patience: i64) -> (ParticipantBinding, Arc<std::sync::Mutex<MemoryParticipant>>) {
    let guard = fixtures::shared(MemoryParticipant::new("Guard").with_variable("patience", patience));
    let binding = ParticipantBinding::new()
        .with("guard", guard.clone())
        .with(
            "traveler",
            MemoryParticipant::new("Traveler").with_variable("has_pass", has_pass),
        );
    (binding, guard)
}

#[test]
fn test_pass_holder_is_welcomed() {
    let (binding, guard) = cast(true, 2);
    let mut session = DialogueEngine::default()
        .start_dialogue(gatekeeper(), binding, Some(1))
        .unwrap();

    let turn = session.current_turn();
    assert_eq!(turn.speaker.as_deref(), Some("guard"));
    assert_eq!(turn.choices.len(), 3);

    session.select_choice(0).unwrap();
    assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(5) }));
    assert!(session.history().has_visited(NodeId(4)));
    assert_eq!(guard.lock().unwrap().invocations[0].0, "open_gate");
    assert_eq!(guard.lock().unwrap().variable("patience"), Some(Value::Int(2)));
}

#[test]
fn test_gate_falls_through_without_pass() {
    let (binding, guard) = cast(false, 2);
    let mut session = DialogueEngine::default()
        .start_dialogue(gatekeeper(), binding, Some(1))
        .unwrap();

    session.select_choice(0).unwrap();
    assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(5) }));
    assert!(session.history().has_visited(NodeId(3)));
    assert!(!session.history().has_visited(NodeId(4)));
    assert!(guard.lock().unwrap().invocations.is_empty());
    assert_eq!(guard.lock().unwrap().variable("patience"), Some(Value::Int(1)));
}

#[test]
fn test_guarded_choice_hidden_when_false() {
    let (binding, _) = cast(false, 0);
    let session = DialogueEngine::default()
        .start_dialogue(gatekeeper(), binding, Some(1))
        .unwrap();

    let edges: Vec<EdgeId> = session.current_turn().choices.iter().map(|c| c.edge).collect();
    assert_eq!(edges, vec![EdgeId(1), EdgeId(2)]);
}

#[test]
fn test_round_trip_preserves_graph() {
    let graph = Graph::load(fixtures::SAMPLE_JSON).unwrap();
    let reloaded = Graph::load(&graph.to_json().unwrap()).unwrap();
    assert_eq!(reloaded, graph);
}

#[test]
fn test_trace_grows_monotonically() {
    let (binding, _) = cast(false, 5);
    let mut session = DialogueEngine::default()
        .start_dialogue(gatekeeper(), binding, Some(1))
        .unwrap();

    let mut last = session.trace().len();
    while session.state() == SessionState::AwaitingChoice {
        session.select_choice(1).unwrap();
        assert!(session.trace().len() > last);
        last = session.trace().len();
    }
    assert!(session.is_ended());
}

#[test]
fn test_sessions_share_graph_across_threads() {
    let graph = fixtures::random_selector([1.0, 1.0, 1.0]);
    let engine = DialogueEngine::new(EngineConfig::default());

    let handles: Vec<_> = (0..4u64)
        .map(|seed| {
            let graph = graph.clone();
            let engine = engine.clone();
            thread::spawn(move || {
                let session = engine
                    .start_dialogue(graph, fixtures::binding(false, 0), Some(seed))
                    .unwrap();
                (seed, session.trace().to_vec())
            })
        })
        .collect();

    for handle in handles {
        let (seed, trace) = handle.join().unwrap();
        let replay = engine
            .start_dialogue(graph.clone(), fixtures::binding(false, 0), Some(seed))
            .unwrap();
        assert_eq!(replay.trace(), trace.as_slice());
    }
}

#[test]
fn test_session_moves_between_threads() {
    let (binding, _) = cast(true, 1);
    let session = DialogueEngine::default()
        .start_dialogue(gatekeeper(), binding, Some(1))
        .unwrap();

    let session = thread::spawn(move || {
        let mut session = session;
        session.select_choice(0).unwrap();
        session
    })
    .join()
    .unwrap();

    assert_eq!(session.end_reason(), Some(&EndReason::Completed { node: NodeId(5) }));
}
