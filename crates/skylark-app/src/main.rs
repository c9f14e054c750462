//! Skylark application binary - composition root.
//!
//! Ties together all Skylark crates into a single executable:
//! 1. Parse CLI args and load configuration from TOML
//! 2. Construct the session store and the offline collaborator set
//! 3. Build the dialogue orchestrator with its circuit breakers
//! 4. Start the background maintenance worker (fare watch, reminders, sweep)
//! 5. Start the axum REST API server

mod cli;

use std::sync::Arc;

use clap::Parser;

use skylark_api::{create_router, AppState};
use skylark_core::config::SkylarkConfig;
use skylark_dialogue::{MaintenanceWorker, Orchestrator};
use skylark_providers::{
    ApprovingGateway, LogNotifier, MemoryBookingStore, OfflineOracle, StaticFlightIndex,
};
use skylark_session::SessionStore;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log level may come from it.
    let config_file = args.resolve_config_path();
    let mut config = SkylarkConfig::load_or_default(&config_file);
    config.general.api_port = args.resolve_port(config.general.api_port);

    // Tracing. Priority: RUST_LOG env > --log-level flag > config value.
    let default_level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("Starting Skylark v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Session store, swept on a timer by the maintenance worker.
    let sessions = Arc::new(SessionStore::new(config.session.ttl_minutes));

    // Collaborators. The offline set serves a deterministic local catalog,
    // answers with keyword heuristics, records bookings in memory, approves
    // every charge, and dispatches notifications to the log — the whole
    // assistant runs without network access. Swap these for live clients
    // behind the same traits.
    let search = Arc::new(StaticFlightIndex::new());
    let oracle = Arc::new(OfflineOracle::new());
    let bookings = Arc::new(MemoryBookingStore::new());
    let payments = Arc::new(ApprovingGateway::new());
    let notifier = Arc::new(LogNotifier::new());

    let orchestrator = Arc::new(Orchestrator::new(
        &config,
        Arc::clone(&sessions),
        oracle,
        search.clone(),
        bookings.clone(),
        payments,
        notifier.clone(),
    ));
    tracing::info!("Dialogue orchestrator ready");

    // Background maintenance: fare watch, reminder scheduling and dispatch,
    // session sweep. Shares the orchestrator's breakers so an outage seen by
    // conversations also pauses background calls to the same collaborator.
    let worker = Arc::new(MaintenanceWorker::new(
        &config,
        Arc::clone(&sessions),
        search,
        bookings,
        notifier,
        orchestrator.search_breaker(),
        orchestrator.notify_breaker(),
    ));
    let worker_task = Arc::clone(&worker);
    tokio::spawn(async move {
        worker_task.run().await;
    });
    tracing::info!("Maintenance worker started");

    // === API server ===

    let port = config.general.api_port;
    let addr = format!("127.0.0.1:{}", port);
    let state = AppState::new(config, orchestrator);
    let router = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind — is another instance running?");
            tracing::error!("Try: skylark --port {}", port + 1);
            return Err(e.into());
        }
    };

    tracing::info!(addr = %addr, "API server listening");

    axum::serve(listener, router).await?;

    worker.shutdown();
    Ok(())
}
