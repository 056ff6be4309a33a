use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use noteflow_core::config::AppConfig;
use noteflow_core::event::{EventBus, WorkflowEvent};
use noteflow_core::state::WorkflowState;
use noteflow_core::types::{SessionId, Topology};
use noteflow_engine::{build_response, WorkflowCatalog, WorkflowEngine};
use noteflow_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "noteflow", version, about = "Clinical note analysis pipeline")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "noteflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve,
    /// Process a single note and print the response as JSON
    Run {
        /// The clinical note text
        #[arg(long)]
        note: String,
        /// Workflow topology: linear or branching
        #[arg(long, default_value = "linear")]
        topology: Topology,
        /// Session ID (auto-generated if not provided)
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("noteflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Serve => {
            let runtime = Runtime::build(&config)?;
            spawn_trace_logger(runtime.event_bus.clone());

            let server = GatewayServer::new(config.gateway.clone(), runtime.engine, runtime.catalog);

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
                signal.cancel();
            });

            server.run(shutdown).await
        }
        Commands::Run {
            note,
            topology,
            session,
        } => {
            let runtime = Runtime::build(&config)?;
            spawn_trace_logger(runtime.event_bus.clone());

            let session_id = session.map(SessionId::from_string).unwrap_or_default();
            let definition = runtime.catalog.get(topology);
            let state = WorkflowState::new(session_id, note);

            let final_state = runtime.engine.run(definition, state).await;
            let response = build_response(final_state, definition);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

/// Engine, catalog, and event bus built once with injected dependencies.
struct Runtime {
    engine: Arc<WorkflowEngine>,
    catalog: Arc<WorkflowCatalog>,
    event_bus: Arc<EventBus>,
}

impl Runtime {
    fn build(config: &AppConfig) -> anyhow::Result<Self> {
        let model = noteflow_llm::create_model(&config.model);
        let event_bus = Arc::new(EventBus::new(config.engine.event_capacity));
        let catalog = Arc::new(WorkflowCatalog::new(model)?);
        let engine = Arc::new(WorkflowEngine::new(config.engine.clone(), event_bus.clone()));
        Ok(Self {
            engine,
            catalog,
            event_bus,
        })
    }
}

/// Log node traces as they are published; durable storage is a
/// downstream consumer's concern.
fn spawn_trace_logger(event_bus: Arc<EventBus>) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(WorkflowEvent::NodeTraced(trace)) => {
                    debug!(
                        session_id = %trace.session_id,
                        node = %trace.node,
                        confidence = ?trace.confidence,
                        "node trace"
                    );
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
