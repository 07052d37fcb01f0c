use std::sync::Arc;

use anyhow::{bail, Result};
use dialoguer::{Confirm, Select};
use serde::Serialize;
use tracing::info;

use parley_core::graph::{Graph, NodeId, NodeKind};
use parley_core::participant::ParticipantBinding;
use parley_engine::{
    DialogueEngine, EndReason, Session, SessionState, SkippedEffect, TraceEntry, Turn,
};

/// A line of dialogue as the player sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Line {
    pub node: NodeId,
    pub speaker: String,
    pub text: String,
}

fn line_at(graph: &Graph, node: NodeId) -> Option<Line> {
    match &graph.node(node)?.kind {
        NodeKind::Speech { speaker, text, .. } => Some(Line {
            node,
            speaker: speaker.clone(),
            text: text.clone(),
        }),
        _ => None,
    }
}

/// Speech lines the session passed through since trace position `from`.
///
/// `presented` is the node whose line the host already showed before the
/// step; it is the first trace entry after that step and is not repeated.
fn passed_lines(session: &Session, from: usize, presented: Option<NodeId>) -> Vec<Line> {
    session.trace()[from..]
        .iter()
        .enumerate()
        .filter(|(i, entry)| !(*i == 0 && presented == Some(entry.node)))
        .filter_map(|(_, entry)| line_at(session.graph(), entry.node))
        .collect()
}

fn print_line(line: &Line) {
    println!("{}: {}", line.speaker, line.text);
}

fn print_turn(turn: &Turn) {
    if let (Some(speaker), Some(text)) = (&turn.speaker, &turn.text) {
        println!("{}: {}", speaker, text);
    }
    for option in turn.all_options.iter().filter(|o| !o.satisfied) {
        println!(
            "  (unavailable) {}",
            option.text.as_deref().unwrap_or("...")
        );
    }
}

fn describe_end(reason: Option<&EndReason>) -> String {
    match reason {
        Some(EndReason::Completed { node }) => format!("Dialogue complete (end node {})", node),
        Some(EndReason::Cancelled) => "Dialogue cancelled".to_string(),
        Some(EndReason::Stuck { node }) => {
            format!("Dialogue stuck: node {} has no satisfied edge", node)
        }
        Some(EndReason::StepLimit { node, limit }) => {
            format!("Dialogue stopped at node {} after {} automatic steps", node, limit)
        }
        None => "Dialogue ended".to_string(),
    }
}

fn summary(session: &Session) -> Vec<String> {
    vec![
        describe_end(session.end_reason()),
        format!("Seed: {}", session.seed()),
    ]
}

fn print_summary(session: &Session) {
    println!();
    for line in summary(session) {
        println!("{}", line);
    }
}

/// Pass a step's error through, printing the end summary first when the
/// step ended the dialogue.
fn settle(session: &Session, step: parley_core::Result<()>) -> Result<()> {
    if let Err(e) = step {
        if session.is_ended() {
            print_summary(session);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Interactive play-through on the terminal.
pub fn play(
    engine: &DialogueEngine,
    graph: Arc<Graph>,
    binding: ParticipantBinding,
    seed: Option<u64>,
) -> Result<()> {
    let mut session = engine.start_dialogue(graph, binding, seed)?;
    info!(session = %session.id(), seed = session.seed(), "Playing dialogue");

    let mut cursor = 0;
    let mut presented: Option<NodeId> = None;

    loop {
        for line in passed_lines(&session, cursor, presented) {
            print_line(&line);
        }
        cursor = session.trace().len();

        let turn = session.current_turn();
        presented = turn.node;

        let step = match session.state() {
            SessionState::AwaitingChoice => {
                print_turn(&turn);
                let items: Vec<String> = turn
                    .choices
                    .iter()
                    .map(|c| c.text.clone().unwrap_or_else(|| format!("[{}]", c.target)))
                    .collect();
                let index = Select::new()
                    .with_prompt("Your choice")
                    .items(&items)
                    .default(0)
                    .interact()?;
                session.select_choice(index)
            }
            SessionState::AtNode => {
                print_turn(&turn);
                let go_on = Confirm::new()
                    .with_prompt("Continue?")
                    .default(true)
                    .interact()?;
                if go_on {
                    session.advance()
                } else {
                    session.end_dialogue();
                    Ok(())
                }
            }
            SessionState::Ended | SessionState::Idle => break,
        };
        settle(&session, step)?;
    }

    print_summary(&session);
    Ok(())
}

/// Machine-readable outcome of a scripted run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub graph: String,
    pub seed: u64,
    pub state: SessionState,
    pub end_reason: Option<EndReason>,
    pub lines: Vec<Line>,
    pub trace: Vec<TraceEntry>,
    /// Present when the script ran out of choices before the dialogue ended.
    pub turn: Option<Turn>,
    pub skipped_effects: Vec<SkippedEffect>,
}

/// Run a dialogue non-interactively, answering choices from `choices` in order.
///
/// Speech lines resting in manual mode are advanced automatically.
pub fn run_script(
    engine: &DialogueEngine,
    graph: Arc<Graph>,
    binding: ParticipantBinding,
    choices: &[usize],
    seed: Option<u64>,
) -> Result<RunReport> {
    let name = graph.name().to_string();
    let mut session = engine.start_dialogue(graph, binding, seed)?;
    let mut script = choices.iter();
    let mut skipped = session.last_report().skipped.clone();

    loop {
        match session.state() {
            SessionState::AwaitingChoice => match script.next() {
                Some(&index) => session.select_choice(index)?,
                None => break,
            },
            SessionState::AtNode => session.advance()?,
            SessionState::Ended | SessionState::Idle => break,
        }
        skipped.extend(session.last_report().skipped.iter().cloned());
    }

    if script.next().is_some() {
        bail!(
            "dialogue ended before all scripted choices were used ({})",
            describe_end(session.end_reason())
        );
    }

    let lines = session
        .trace()
        .iter()
        .filter_map(|entry| line_at(session.graph(), entry.node))
        .collect();

    Ok(RunReport {
        graph: name,
        seed: session.seed(),
        state: session.state(),
        end_reason: session.end_reason().cloned(),
        lines,
        trace: session.trace().to_vec(),
        turn: (!session.is_ended()).then(|| session.current_turn()),
        skipped_effects: skipped,
    })
}
