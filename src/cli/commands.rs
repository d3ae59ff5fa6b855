use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{
    app::{init_config, load_config, AppState, BackendSelection, Config},
    knowledge::KnowledgeStore,
    models::ModelFactory,
    server::serve,
    utils::log_progress,
};

use super::Commands;

/// Dispatch a subcommand
pub async fn handle_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Serve { host, port } => run_server(config_path, host, port).await,
        Commands::Init => {
            println!("Initializing chatbridge configuration...");
            init_config()?;
            Ok(())
        }
        Commands::Status => show_status(config_path).await,
        Commands::Version => {
            show_version();
            Ok(())
        }
    }
}

/// Show version information
pub fn show_version() {
    println!("chatbridge v{}", env!("CARGO_PKG_VERSION"));
    println!("   Websocket chat front-end for local and hosted language models");
}

/// Load config, resolve the backend, and serve until Ctrl-C.
///
/// Any configuration failure aborts before the listener is bound.
pub async fn run_server(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    const STEPS: usize = 4;

    log_progress(1, STEPS, "Loading configuration");
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    log_progress(2, STEPS, "Resolving model backend");
    let selection = BackendSelection::resolve(&config).context("Cannot select a model backend")?;
    let backend = ModelFactory::create(&selection, &config).context("Cannot start model backend")?;
    info!(
        mode = %config.deployment_mode,
        backend = %backend.name(),
        endpoint = %selection.endpoint(),
        "Backend selected"
    );

    match backend.validate_connection().await {
        Ok(true) => info!(backend = %backend.name(), "Backend reachable"),
        Ok(false) => warn!(backend = %backend.name(), "Backend responded but the model is not available"),
        Err(e) => warn!(backend = %backend.name(), error = %e, "Backend not reachable yet"),
    }

    log_progress(3, STEPS, "Loading knowledge store");
    let knowledge = Arc::new(open_knowledge(&config));

    let state = AppState::new(&config, backend, knowledge);

    log_progress(4, STEPS, "Starting server");
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    println!(
        "chatbridge listening on {} ({} mode, {})",
        addr.green(),
        config.deployment_mode,
        state.backend_name().cyan()
    );

    serve(listener, state, shutdown_signal()).await
}

fn open_knowledge(config: &Config) -> KnowledgeStore {
    match &config.knowledge.path {
        Some(path) => KnowledgeStore::open(path),
        None => KnowledgeStore::in_memory(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

/// Show the resolved backend and probe it
async fn show_status(config_path: Option<&Path>) -> Result<()> {
    println!("chatbridge Status:");
    println!();

    let config = load_config(config_path)?;
    println!("  Deployment mode: {}", config.deployment_mode);
    println!(
        "  Listen address:  {}:{}",
        config.server.host, config.server.port
    );

    let selection = match BackendSelection::resolve(&config) {
        Ok(selection) => selection,
        Err(e) => {
            println!("  [ERROR] Backend: {}", e.to_string().red());
            return Ok(());
        }
    };

    println!("  Backend kind:    {}", selection.kind());
    println!("  Model:           {}", selection.model_id());
    println!("  Endpoint:        {}", selection.endpoint());

    match ModelFactory::create(&selection, &config) {
        Ok(backend) => match backend.validate_connection().await {
            Ok(true) => println!("  [OK] {} is reachable", backend.name().green()),
            Ok(false) => println!(
                "  [WARNING] {} responded but the model is not available",
                backend.name().yellow()
            ),
            Err(e) => println!("  [ERROR] {}: {}", backend.name(), e.to_string().red()),
        },
        Err(e) => println!("  [ERROR] {}", e.to_string().red()),
    }

    match &config.knowledge.path {
        Some(path) => {
            let store = KnowledgeStore::open(path);
            println!("  Knowledge:       {} items in {}", store.len(), path.display());
        }
        None => println!("  Knowledge:       in-memory (not persisted)"),
    }

    println!();
    Ok(())
}
