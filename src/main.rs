use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flowsmith_core::config::AppConfig;
use flowsmith_core::template::Template;
use flowsmith_core::types::{NodeId, NodeParams, Phase};
use flowsmith_exec::{BuilderSession, ExecutionSnapshot, ResultDownload};
use flowsmith_gateway::HttpGateway;
use flowsmith_graph::{check_acyclic, execution_order, inspect, layout};

const DEFAULT_LOG_FILTER: &str = "flowsmith=info,warn";

#[derive(Parser)]
#[command(name = "flowsmith", version, about = "Build, lay out and run AI workflow graphs")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowsmith.toml", env = "FLOWSMITH_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute node positions as a layered diagram
    Layout {
        /// Template file
        template: PathBuf,
        /// Write the result back to the template file
        #[arg(long)]
        write: bool,
    },
    /// Print the execution order
    Order {
        /// Template file
        template: PathBuf,
    },
    /// Report integrity warnings; fails on a dependency cycle
    Check {
        /// Template file
        template: PathBuf,
    },
    /// Execute a template through the configured gateway
    Run {
        /// Template file
        template: PathBuf,
        /// JSON file of run-time inputs keyed by node id
        #[arg(long)]
        params: Option<PathBuf>,
        /// Directory for the produced file
        #[arg(long, default_value = ".")]
        out: PathBuf,
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

/// Per-node inputs as written in a `--params` file. Files are paths.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunParams {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    files: Vec<PathBuf>,
    #[serde(default)]
    extra_instructions: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "flowsmith", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;
    init_tracing(&config);

    match cli.command {
        Commands::Layout { template, write } => {
            let tpl = Template::load(&template)?;
            let mut graph = tpl.to_graph();
            let laid_out = layout(graph.nodes(), graph.edges());
            graph.apply_positions(&laid_out);
            let json = Template::from_graph(tpl.meta(), &graph).to_json_pretty()?;
            if write {
                std::fs::write(&template, json)
                    .with_context(|| format!("writing {}", template.display()))?;
                info!(path = %template.display(), "Layout written");
            } else {
                println!("{}", json);
            }
        }
        Commands::Order { template } => {
            let graph = Template::load(&template)?.to_graph();
            for (i, id) in execution_order(&graph).iter().enumerate() {
                let node = graph.node(id);
                println!(
                    "{:>3}. {}  {} ({})",
                    i + 1,
                    id,
                    node.map(|n| n.label.as_str()).unwrap_or(""),
                    node.map(|n| n.kind.as_str()).unwrap_or("?"),
                );
            }
        }
        Commands::Check { template } => {
            let graph = Template::load(&template)?.to_graph();
            let warnings = inspect(&graph);
            for w in &warnings {
                println!("warning: {}", w);
            }
            check_acyclic(&graph)?;
            println!(
                "{} nodes, {} edges, {} warning(s)",
                graph.nodes().len(),
                graph.edges().len(),
                warnings.len()
            );
        }
        Commands::Run { template, params, out } => {
            run(&config, &template, params.as_deref(), &out).await?;
        }
        Commands::Config => {
            let mut shown = config.clone();
            if let Some(gw) = shown.gateway.as_mut() {
                if gw.api_key.is_some() {
                    gw.api_key = Some("********".to_string());
                }
            }
            println!("{}", toml::to_string_pretty(&shown)?);
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let default = config.log.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FLOWSMITH_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(
    config: &AppConfig,
    template: &Path,
    params: Option<&Path>,
    out: &Path,
) -> anyhow::Result<()> {
    let gateway = HttpGateway::new(config.require_gateway()?.clone())?;
    let mut session = BuilderSession::new(Arc::new(gateway), config.execution.clone());
    session.load_template(&Template::load(template)?);

    if let Some(path) = params {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let inputs: HashMap<NodeId, RunParams> = serde_json::from_str(&raw)?;
        for (node_id, input) in inputs {
            if !session.graph().contains(&node_id) {
                warn!(node_id = %node_id, "Ignoring parameters for unknown node");
                continue;
            }
            let seeded = session.params().get(&node_id).cloned().unwrap_or_default();
            session.params_mut().insert(
                node_id.clone(),
                NodeParams {
                    data: input.data,
                    files: Vec::new(),
                    extra_instructions: input.extra_instructions.or(seeded.extra_instructions),
                    model_id: input.model_id.or(seeded.model_id),
                },
            );
            if !input.files.is_empty() {
                session.params_mut().attach_files(&node_id, &input.files).await?;
            }
        }
    }

    let mut progress = session.watch();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snap = progress.borrow_and_update().clone();
            print_progress(&snap);
            if snap.is_terminal() {
                break;
            }
        }
    });

    // Validation and cycle errors surface before anything is sent.
    if let Err(e) = session.start_execution().await {
        printer.abort();
        return Err(e.into());
    }

    let finished = tokio::select! {
        snap = session.wait() => Some(snap),
        _ = tokio::signal::ctrl_c() => None,
    };
    let snapshot = match finished {
        Some(snap) => snap?,
        None => {
            session.teardown().await;
            printer.abort();
            bail!("Execution cancelled");
        }
    };
    let _ = printer.await;

    match snapshot.phase {
        Phase::Complete => {}
        _ => bail!(
            "Execution failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        ),
    }

    if let Some(result) = &snapshot.result {
        if let Some(download) = result.download()? {
            let path = download.save_to(out).await?;
            println!("Saved {}", path.display());
        }
        if let Some(markdown) = result.markdown_text() {
            println!("{}", markdown);
        }
    }
    Ok(())
}

fn print_progress(snap: &ExecutionSnapshot) {
    let node = snap
        .current_node_id
        .as_ref()
        .map(|id| format!(" [{}]", id))
        .unwrap_or_default();
    let elapsed = (chrono::Utc::now() - snap.started_at).num_milliseconds() as f64 / 1000.0;
    eprintln!(
        "{:>5.1}s {:>3.0}% {}{} ({} done)",
        elapsed,
        snap.progress,
        snap.phase,
        node,
        snap.completed_nodes.len()
    );
}
