use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conductor_core::{
    load_config, validate_config, CompletionWatcher, FsCompletionInbox, LifecycleEngine,
    PlaneTrackerClient, PollingScheduler, SchedulerTimings, SessionService, SessionServiceClient,
    TicketTracker,
};
use conductor_server::api::create_router;
use conductor_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("CONDUCTOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    // Fingerprint of the effective config
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Conductor {} starting (config {})",
        VERSION,
        &config_hash[..16]
    );
    info!(
        "Tracker: {} (workspace {}, {} project(s))",
        config.tracker.api_url,
        config.tracker.workspace_slug,
        config.tracker.project_ids.len()
    );
    info!("Session service: {}", config.session_service.url);
    info!("Completion artifacts in {:?}", config.completion.dir);

    // External collaborators
    let tracker: Arc<dyn TicketTracker> =
        Arc::new(PlaneTrackerClient::new(config.tracker.clone()));
    let sessions: Arc<dyn SessionService> =
        Arc::new(SessionServiceClient::new(config.session_service.clone()));

    if !sessions.health_check().await {
        warn!("Session service at {} is not reachable", config.session_service.url);
    }

    let engine = Arc::new(LifecycleEngine::new(
        config.automation.clone(),
        tracker,
        sessions,
    ));
    let watcher = Arc::new(CompletionWatcher::new(Arc::new(FsCompletionInbox::new(
        &config.completion.dir,
    ))));

    // Background loops
    let scheduler = PollingScheduler::new(
        SchedulerTimings::from(&config.scheduler),
        config.triggers.clone(),
        Arc::clone(&engine),
        Arc::clone(&watcher),
    );
    scheduler.start().await;

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), engine, watcher));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    info!("Server shutting down...");
    scheduler.stop().await;

    served
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
