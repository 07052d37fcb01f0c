use std::collections::{HashSet, VecDeque};

use parley_core::graph::{check_version, Graph, NodeId, NodeKind, SchemaVersion, SelectionPolicy};

pub struct CheckResult {
    pub label: String,
    pub ok: bool,
    pub detail: String,
}

/// Load a graph asset and lint it. Returns `true` when every check passed.
pub fn run_validate(json: &str, min_version: SchemaVersion) -> bool {
    let checks = collect_checks(json, min_version);

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
    fail_count == 0
}

pub fn collect_checks(json: &str, min_version: SchemaVersion) -> Vec<CheckResult> {
    let graph = match Graph::load(json) {
        Ok(g) => g,
        Err(e) => {
            return vec![CheckResult {
                label: "Structure".into(),
                ok: false,
                detail: e.to_string(),
            }]
        }
    };

    let reachable = reachable_from_root(&graph);

    vec![
        CheckResult {
            label: "Structure".into(),
            ok: true,
            detail: format!(
                "'{}': {} nodes, {} edges",
                graph.name(),
                graph.nodes().len(),
                graph.edges().len()
            ),
        },
        check_schema(&graph, min_version),
        check_reachability(&graph, &reachable),
        check_endings(&graph, &reachable),
        check_choice_text(&graph),
        check_random(&graph),
        check_once(&graph),
    ]
}

fn reachable_from_root(graph: &Graph) -> HashSet<NodeId> {
    let mut seen = HashSet::from([graph.root()]);
    let mut queue = VecDeque::from([graph.root()]);
    while let Some(id) = queue.pop_front() {
        for edge in graph.outgoing_edges(id) {
            if seen.insert(edge.target) {
                queue.push_back(edge.target);
            }
        }
    }
    seen
}

fn check_schema(graph: &Graph, min_version: SchemaVersion) -> CheckResult {
    let version = graph.schema_version();
    match check_version(&version.to_string(), min_version) {
        Ok(_) => CheckResult {
            label: "Schema".into(),
            ok: true,
            detail: format!("version {}", version),
        },
        Err(e) => CheckResult {
            label: "Schema".into(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

fn check_reachability(graph: &Graph, reachable: &HashSet<NodeId>) -> CheckResult {
    let mut unreachable: Vec<NodeId> = graph
        .nodes()
        .iter()
        .map(|n| n.id)
        .filter(|id| !reachable.contains(id))
        .collect();
    unreachable.sort();

    if unreachable.is_empty() {
        CheckResult {
            label: "Reachability".into(),
            ok: true,
            detail: "All nodes reachable from root".into(),
        }
    } else {
        let ids: Vec<String> = unreachable.iter().map(|id| id.to_string()).collect();
        CheckResult {
            label: "Reachability".into(),
            ok: false,
            detail: format!("Unreachable nodes: {}", ids.join(", ")),
        }
    }
}

fn check_endings(graph: &Graph, reachable: &HashSet<NodeId>) -> CheckResult {
    let ends = graph
        .nodes()
        .iter()
        .filter(|n| n.is_end() && reachable.contains(&n.id))
        .count();
    CheckResult {
        label: "Endings".into(),
        ok: ends > 0,
        detail: if ends > 0 {
            format!("{} reachable end node(s)", ends)
        } else {
            "No end node is reachable; the dialogue can only be cancelled".into()
        },
    }
}

fn check_choice_text(graph: &Graph) -> CheckResult {
    let mut bad = Vec::new();
    for node in graph.nodes() {
        let offers_choices = match node.kind {
            NodeKind::Speech { .. } => !node.is_virtual_parent() && node.edges.len() > 1,
            NodeKind::SelectorFirst { expose_choices } | NodeKind::SelectorRandom { expose_choices } => {
                expose_choices && node.edges.len() > 1
            }
            _ => false,
        };
        if offers_choices && graph.outgoing_edges(node.id).any(|e| e.text.is_none()) {
            bad.push(node.id.to_string());
        }
    }

    if bad.is_empty() {
        CheckResult {
            label: "Choice text".into(),
            ok: true,
            detail: "Every offered choice has text".into(),
        }
    } else {
        CheckResult {
            label: "Choice text".into(),
            ok: false,
            detail: format!("Choices without text at nodes: {}", bad.join(", ")),
        }
    }
}

fn check_random(graph: &Graph) -> CheckResult {
    let random: Vec<NodeId> = graph
        .nodes()
        .iter()
        .filter(|n| {
            matches!(
                n.kind,
                NodeKind::SelectorRandom { .. }
                    | NodeKind::Gate {
                        policy: SelectionPolicy::Random
                    }
            )
        })
        .map(|n| n.id)
        .collect();
    let uniform = random
        .iter()
        .filter(|id| graph.outgoing_edges(**id).all(|e| e.weight == 0.0))
        .count();

    CheckResult {
        label: "Random branches".into(),
        ok: true,
        detail: if uniform > 0 {
            format!(
                "{} node(s), {} with all-zero weights (picked uniformly)",
                random.len(),
                uniform
            )
        } else {
            format!("{} node(s)", random.len())
        },
    }
}

fn check_once(graph: &Graph) -> CheckResult {
    let once = graph.edges().iter().filter(|e| e.once).count();
    CheckResult {
        label: "Once edges".into(),
        ok: true,
        detail: format!("{} fire-once edge(s)", once),
    }
}
