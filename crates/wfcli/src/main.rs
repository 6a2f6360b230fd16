// crates/wfcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wfcore::{ExecutionEvent, NodeEvent, NodeSpec, RunStatus, Workflow};
use wfengine::{EngineConfig, ExecutionRecord, NodeRegistry, WorkflowEngine};

#[derive(Parser)]
#[command(name = "wf")]
#[command(about = "Workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Default per-node timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Write the execution record as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            config,
            timeout_ms,
            output,
            verbose,
        } => {
            init_logging(verbose);

            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => EngineConfig::default(),
            };
            if timeout_ms.is_some() {
                config.node_timeout_ms = timeout_ms;
            }

            run_workflow(file, config, output).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    wfnodes::register_all(&mut registry);
    registry
}

fn load_config(path: &Path) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn load_workflow(path: &Path) -> Result<Workflow> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading workflow {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing workflow {}", path.display()))
}

async fn run_workflow(file: PathBuf, config: EngineConfig, output: Option<PathBuf>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.name.as_deref().unwrap_or(&workflow.id));
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let engine = WorkflowEngine::with_config(Arc::new(standard_registry()), config);

    // Subscribe to events for real-time output
    let mut events = engine.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            print_event(event);
        }
    });

    // Ctrl-C cancels the run, interrupting the node in flight if it listens
    let cancellation = CancellationToken::new();
    let signal_token = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let started_at = chrono::Utc::now();
    let outcome = engine.run_with_cancel(&workflow, cancellation).await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let (record, duration_ms) = match outcome {
        Ok(result) => {
            let duration_ms = result.duration_ms();
            (ExecutionRecord::from(result), Some(duration_ms))
        }
        Err(err) => (ExecutionRecord::failed(workflow.id.clone(), started_at, err), None),
    };

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", record.execution_id);
    println!("   Status: {:?}", record.status);
    println!("   Completed: {}/{} nodes", record.state.completed.len(), workflow.nodes.len());
    if let Some(ms) = duration_ms {
        println!("   Duration: {}ms", ms);
    }
    if let Some(last) = &record.state.last_completed {
        println!("   Last completed: {}", last);
    }
    let waiting = record.state.waiting_nodes();
    if !waiting.is_empty() {
        println!("   Never ready: {}", waiting.join(", "));
    }

    if let Some(path) = &output {
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("   Record written to: {}", path.display());
    }

    if let Some(error) = &record.error {
        anyhow::bail!(
            "node {} failed: {}",
            record.failed_node.as_deref().unwrap_or("?"),
            error
        );
    }

    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { start_node, .. } => {
            println!("▶️  Run started at {}", start_node);
        }
        ExecutionEvent::NodeStarted { node_id, node_type, .. } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            items,
            duration_ms,
            ..
        } => {
            println!("  ✅ Node {} completed in {}ms, items per port {:?}", node_id, duration_ms, items);
        }
        ExecutionEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        ExecutionEvent::NodeWaiting {
            node_id,
            received,
            required,
            ..
        } => {
            println!("  ⏳ Node {} waiting: ports {:?} of {:?}", node_id, received, required);
        }
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
        },
        ExecutionEvent::RunFinished {
            status, duration_ms, ..
        } => match status {
            RunStatus::Done => println!("✨ Run completed in {}ms", duration_ms),
            RunStatus::Cancelled => println!("🛑 Run cancelled after {}ms", duration_ms),
            _ => println!("💥 Run failed after {}ms", duration_ms),
        },
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let engine = WorkflowEngine::new(Arc::new(standard_registry()));

    let graph = engine.validate(&workflow)?;
    let joins: Vec<&str> = workflow
        .nodes
        .iter()
        .filter(|n| graph.is_join(&n.id))
        .map(|n| n.id.as_str())
        .collect();

    println!("✅ Workflow structure is valid:");
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    if let Some(start) = workflow.start_node() {
        println!("   Start node: {} ({})", start.id, start.node_type);
    }
    if !joins.is_empty() {
        println!("   Join nodes: {}", joins.join(", "));
    }

    let missing = engine.missing_node_types(&workflow);
    if !missing.is_empty() {
        println!("⚠️  Unregistered node types: {}", missing.join(", "));
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = standard_registry();

    for node_type in registry.list_node_types() {
        if let Some(info) = registry.describe(&node_type) {
            println!("  • {} ({})", node_type, info.category);
            println!("    {}", info.description);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let mut workflow = Workflow::new("example").with_name("Example price routing workflow");

    let trigger = workflow.add_node(
        NodeSpec::trigger("start", "trigger.manual")
            .with_metadata(
                "payload",
                serde_json::json!([{ "asset": "SOL", "price": 180 }, { "asset": "BTC", "price": 90 }]),
            )
            .with_position(100.0, 100.0),
    );
    let check = workflow.add_node(
        NodeSpec::new("check", "flow.if")
            .with_metadata("field", "price")
            .with_metadata("op", "gt")
            .with_metadata("value", 100)
            .with_position(300.0, 100.0),
    );
    let high = workflow.add_node(
        NodeSpec::new("high", "transform.set")
            .with_metadata("fields", serde_json::json!({ "band": "high" }))
            .with_position(500.0, 50.0),
    );
    let low = workflow.add_node(
        NodeSpec::new("low", "transform.set")
            .with_metadata("fields", serde_json::json!({ "band": "low" }))
            .with_position(500.0, 150.0),
    );
    let merge = workflow.add_node(NodeSpec::new("merge", "flow.merge").with_position(700.0, 100.0));
    let log = workflow.add_node(NodeSpec::new("log", "debug.log").with_position(900.0, 100.0));

    workflow.connect(&trigger, 0, &check, 0);
    workflow.connect(&check, 0, &high, 0);
    workflow.connect(&check, 1, &low, 0);
    workflow.connect(&high, 0, &merge, 0);
    workflow.connect(&low, 0, &merge, 1);
    workflow.connect(&merge, 0, &log, 0);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  wf run --file {}", output.display());

    Ok(())
}
