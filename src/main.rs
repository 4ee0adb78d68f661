use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowrun_core::config::AppConfig;
use flowrun_core::error::FlowError;
use flowrun_core::graph::Graph;
use flowrun_core::types::Run;
use flowrun_engine::{write_jsonl, CapabilityRegistry, Engine};

#[derive(Parser)]
#[command(name = "flowrun", version, about = "Run workflow graphs to completion")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowrun.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a graph and print the run record
    Run {
        /// Graph definition (JSON)
        graph: PathBuf,
        /// Initial payload: inline JSON, or @path to a JSON file
        #[arg(short, long)]
        input: Option<String>,
        /// Tolerate node failures that exhaust their retries
        #[arg(long)]
        continue_on_error: bool,
        /// Per-attempt node timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Retries per failing node
        #[arg(long)]
        max_retries: Option<u32>,
        /// Base retry backoff in milliseconds
        #[arg(long)]
        backoff_ms: Option<u64>,
        /// Write the run log as JSONL into this directory
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Validate a graph and print its execution levels
    Validate {
        /// Graph definition (JSON)
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowrun=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "flowrun", &mut std::io::stdout());
        return Ok(());
    }

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "No config file, using defaults");
        AppConfig::default()
    };

    let engine = Engine::new(Arc::new(CapabilityRegistry::with_builtins()));

    match cli.command {
        Commands::Run {
            graph,
            input,
            continue_on_error,
            timeout_ms,
            max_retries,
            backoff_ms,
            log_dir,
        } => {
            let graph = load_graph(&graph)?;
            let initial = match input {
                Some(raw) => parse_input(&raw)?,
                None => serde_json::Value::Null,
            };

            let mut options = config.engine.clone();
            options.continue_on_error |= continue_on_error;
            if let Some(ms) = timeout_ms {
                options.timeout_ms = ms;
            }
            if let Some(n) = max_retries {
                options.retry.max_retries = n;
            }
            if let Some(ms) = backoff_ms {
                options.retry.backoff_ms = ms;
            }
            let log_dir = log_dir.or_else(|| config.log.log_dir());

            match engine.execute_with(&graph, initial, &options).await {
                Ok(run) => {
                    finish_run(&run, log_dir.as_deref()).await?;
                    Ok(())
                }
                Err(FlowError::Aborted { run, source }) => {
                    finish_run(&run, log_dir.as_deref()).await?;
                    Err(anyhow::Error::new(*source).context(format!("run {} aborted", run.id)))
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Validate { graph } => {
            let graph = load_graph(&graph)?;
            let plan = engine.prepare(&graph)?;
            println!("Graph '{}' is valid ({} nodes)", graph.id, graph.nodes.len());
            for (i, level) in plan.levels()?.iter().enumerate() {
                println!("  level {}: {}", i, level.join(", "));
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config).context("render config")?);
            Ok(())
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read graph {}", path.display()))?;
    Ok(Graph::from_json(&content)?)
}

/// Inline JSON, or `@path` to read it from a file.
fn parse_input(raw: &str) -> anyhow::Result<serde_json::Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("read input {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("parse input JSON")
}

async fn finish_run(run: &Run, log_dir: Option<&Path>) -> anyhow::Result<()> {
    if let Some(dir) = log_dir {
        match write_jsonl(dir, &run.id, &run.logs).await {
            Ok(path) => info!(path = %path.display(), "Run log written"),
            Err(e) => warn!(error = %e, "Failed to write run log"),
        }
    }
    println!("{}", serde_json::to_string_pretty(run)?);
    Ok(())
}
