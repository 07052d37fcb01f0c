mod cast;
mod play;
mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use parley_core::config::{AppConfig, StepMode};
use parley_core::graph::Graph;
use parley_engine::DialogueEngine;

#[derive(Parser)]
#[command(name = "parley", version, about = "Branching dialogue runner")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "parley.toml", env = "PARLEY_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a dialogue interactively
    Play {
        /// Dialogue graph (JSON)
        graph: PathBuf,
        /// Participants to bind (TOML)
        #[arg(long)]
        cast: Option<PathBuf>,
        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
        /// Stop on every line instead of auto-advancing
        #[arg(long)]
        manual: bool,
    },
    /// Run a dialogue with scripted choices and print the outcome as JSON
    Run {
        /// Dialogue graph (JSON)
        graph: PathBuf,
        /// Participants to bind (TOML)
        #[arg(long)]
        cast: Option<PathBuf>,
        /// Comma-separated choice indices, answered in order
        #[arg(long, value_delimiter = ',')]
        choices: Vec<usize>,
        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Check a dialogue graph for structural and authoring problems
    Validate {
        /// Dialogue graph (JSON)
        graph: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_env("PARLEY_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.with_target)
        .with_writer(std::io::stderr)
        .init();
}

fn load_graph(path: &Path) -> anyhow::Result<Arc<Graph>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dialogue graph {}", path.display()))?;
    let graph = Graph::load(&json)
        .with_context(|| format!("Failed to load dialogue graph {}", path.display()))?;
    Ok(Arc::new(graph))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(&cli.config)?;
    init_tracing(&config);
    debug!(path = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Play {
            graph,
            cast,
            seed,
            manual,
        } => {
            if manual {
                config.engine.step_mode = StepMode::Manual;
            }
            let engine = DialogueEngine::new(config.engine.clone());
            let graph = load_graph(&graph)?;
            let binding = cast::load_binding(cast.as_deref())?;
            info!(graph = %graph.name(), roles = binding.len(), "Starting play-through");
            play::play(&engine, graph, binding, seed)?;
        }
        Commands::Run {
            graph,
            cast,
            choices,
            seed,
        } => {
            let engine = DialogueEngine::new(config.engine.clone());
            let graph = load_graph(&graph)?;
            let binding = cast::load_binding(cast.as_deref())?;
            let report = play::run_script(&engine, graph, binding, &choices, seed)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Validate { graph } => {
            let json = std::fs::read_to_string(&graph)
                .with_context(|| format!("Failed to read dialogue graph {}", graph.display()))?;
            let min_version = config.engine.min_version()?;
            println!("Validating {}", graph.display());
            println!();
            if !validate::run_validate(&json, min_version) {
                bail!("{} failed validation", graph.display());
            }
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        // Handled before config loading
        Commands::Completions { .. } => {}
    }

    Ok(())
}
