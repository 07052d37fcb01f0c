//! Shared fixtures for Parley tests: small graphs with known shapes and
//! participants whose state can be inspected after a run.

use std::sync::{Arc, Mutex};

use parley_core::condition::Condition;
use parley_core::effect::Effect;
use parley_core::graph::{Edge, EdgeId, Graph, GraphAsset, Node, NodeKind, SelectionPolicy};
use parley_core::participant::{MemoryParticipant, ParticipantBinding};
use parley_core::value::{CompareOp, ModifyOp};

/// Build a validated graph from nodes and edges, panicking on invalid input.
pub fn graph(name: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Arc<Graph> {
    let asset = GraphAsset {
        schema_version: "1.0".into(),
        name: name.into(),
        nodes,
        edges,
    };
    Arc::new(Graph::from_asset(asset).expect("fixture graph should be valid"))
}

/// A participant the test keeps a handle to after handing it to a session.
pub fn shared(participant: MemoryParticipant) -> Arc<Mutex<MemoryParticipant>> {
    Arc::new(Mutex::new(participant))
}

/// Root → Speech(A) with `[player.flag == true → B, unguarded → C]`;
/// B and C are end nodes.
pub fn flag_scenario() -> Arc<Graph> {
    graph(
        "flag",
        vec![
            Node::root(0).with_edges(vec![EdgeId(0)]),
            Node::speech(1, "npc", "A").with_edges(vec![EdgeId(1), EdgeId(2)]),
            Node::end(2),
            Node::end(3),
        ],
        vec![
            Edge::new(0, 0, 1),
            Edge::guarded(1, 1, 2, Condition::compare("player", "flag", CompareOp::Eq, true))
                .with_text("To B"),
            Edge::new(2, 1, 3).with_text("To C"),
        ],
    )
}

/// Root → Gate whose only edge is guarded by an always-false condition.
pub fn gate_stuck() -> Arc<Graph> {
    graph(
        "gate_stuck",
        vec![
            Node::root(0).with_edges(vec![EdgeId(0)]),
            Node::gate(1, SelectionPolicy::First).with_edges(vec![EdgeId(1)]),
            Node::end(2),
        ],
        vec![
            Edge::new(0, 0, 1),
            Edge::guarded(1, 1, 2, Condition::Always { value: false }),
        ],
    )
}

/// Root → Speech with two open choices, each leading to its own end.
pub fn two_choices() -> Arc<Graph> {
    graph(
        "two_choices",
        vec![
            Node::root(0).with_edges(vec![EdgeId(0)]),
            Node::speech(1, "npc", "Well?").with_edges(vec![EdgeId(1), EdgeId(2)]),
            Node::end(2),
            Node::end(3),
        ],
        vec![
            Edge::new(0, 0, 1),
            Edge::new(1, 1, 2).with_text("Yes"),
            Edge::new(2, 1, 3).with_text("No"),
        ],
    )
}

/// Root → non-exposing selector over three weighted branches, each a speech
/// line ending the dialogue.
pub fn random_selector(weights: [f64; 3]) -> Arc<Graph> {
    let mut nodes = vec![
        Node::root(0).with_edges(vec![EdgeId(0)]),
        Node::new(
            1,
            NodeKind::SelectorRandom {
                expose_choices: false,
            },
        )
        .with_edges(vec![EdgeId(1), EdgeId(2), EdgeId(3)]),
    ];
    let mut edges = vec![Edge::new(0, 0, 1)];
    for (i, weight) in weights.iter().enumerate() {
        let branch = 2 + i as u32;
        let exit = 10 + i as u32;
        nodes.push(Node::speech(branch, "npc", format!("Branch {}", i)).with_edges(vec![EdgeId(exit)]));
        edges.push(Edge::new(1 + i as u32, 1, branch).with_weight(*weight));
        edges.push(Edge::new(exit, branch, 9));
    }
    nodes.push(Node::end(9));
    graph("random_selector", nodes, edges)
}

/// A shop loop. The merchant offers `buy` (5 gold, loops back, shown greyed
/// out when unaffordable), a fire-once free sample, and `leave`. Every
/// return to the counter bumps `npc.greetings`.
pub fn shop_loop() -> Arc<Graph> {
    graph(
        "shop",
        vec![
            Node::root(0).with_edges(vec![EdgeId(0)]),
            Node::speech(1, "npc", "What'll it be?")
                .with_edges(vec![EdgeId(1), EdgeId(2), EdgeId(3)])
                .with_on_enter(vec![Effect::modify("npc", "greetings", ModifyOp::Add, 1)]),
            Node::speech(2, "npc", "Pleasure doing business.")
                .with_edges(vec![EdgeId(4)])
                .with_on_enter(vec![
                    Effect::modify("player", "gold", ModifyOp::Subtract, 5),
                    Effect::invoke("npc", "hand_over", vec!["potion".into()]),
                ]),
            Node::speech(3, "npc", "Here, on the house.")
                .with_edges(vec![EdgeId(5)])
                .with_on_exit(vec![Effect::modify("player", "samples", ModifyOp::Add, 1)]),
            Node::end(4),
        ],
        vec![
            Edge::new(0, 0, 1),
            Edge::guarded(1, 1, 2, Condition::compare("player", "gold", CompareOp::Ge, 5))
                .with_text("Buy a potion")
                .with_show_when_unsatisfied(),
            Edge::new(2, 1, 3).with_once().with_text("Free sample?"),
            Edge::new(3, 1, 4).with_text("Leave"),
            Edge::new(4, 2, 1),
            Edge::new(5, 3, 1),
        ],
    )
}

/// Two gates that feed each other forever.
pub fn endless_gates() -> Arc<Graph> {
    graph(
        "endless",
        vec![
            Node::root(0).with_edges(vec![EdgeId(0)]),
            Node::gate(1, SelectionPolicy::First).with_edges(vec![EdgeId(1)]),
            Node::gate(2, SelectionPolicy::First).with_edges(vec![EdgeId(2)]),
        ],
        vec![Edge::new(0, 0, 1), Edge::new(1, 1, 2), Edge::new(2, 2, 1)],
    )
}

pub fn player(flag: bool, gold: i64) -> MemoryParticipant {
    MemoryParticipant::new("Hero")
        .with_variable("flag", flag)
        .with_variable("gold", gold)
        .with_variable("samples", 0)
}

pub fn merchant() -> MemoryParticipant {
    MemoryParticipant::new("Merchant").with_variable("greetings", 0)
}

/// `player` and `npc` bound to fresh participants.
pub fn binding(flag: bool, gold: i64) -> ParticipantBinding {
    ParticipantBinding::new()
        .with("player", player(flag, gold))
        .with("npc", merchant())
}

/// The gatekeeper demo asset in its on-disk JSON format.
pub const SAMPLE_JSON: &str = include_str!("../../../demos/gatekeeper.json");
