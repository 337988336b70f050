use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediathek_core::{
    load_config, validate_config, Downloader, Fetcher, HttpFetcher, QueryEngine, ResultWindow,
    SettingsStore, SqliteDatabase, SqliteSettings, UpdateOrchestrator,
};
use mediathek_server::{api::create_router, state::AppState, tasks::spawn_event_listener};

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
    let config_path = std::env::var("MEDIATHEK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Mirror list URL: {}", config.update.mirror_list_url);

    // Create SQLite show database
    let database: Arc<dyn QueryEngine> = Arc::new(
        SqliteDatabase::new(&config.database.path).context("Failed to open show database")?,
    );
    info!("Show database initialized");

    // Create SQLite settings store
    let settings: Arc<dyn SettingsStore> = Arc::new(
        SqliteSettings::new(&config.database.path).context("Failed to open settings store")?,
    );
    info!("Settings store initialized");

    // Create HTTP fetcher (shared by updates and downloads)
    let fetcher: Arc<dyn Fetcher> = Arc::new(
        HttpFetcher::new(config.update.fetcher_config()).context("Failed to create HTTP client")?,
    );

    // Create result window over the stored catalog
    let window = ResultWindow::with_sizes(
        Arc::clone(&database),
        config.view.window_size,
        config.view.cache_capacity,
    )
    .context("Failed to query show database")?;
    info!(total = window.total(), "Result window initialized");

    // Create update orchestrator
    let orchestrator = Arc::new(UpdateOrchestrator::new(
        config.update.clone(),
        Arc::clone(&fetcher),
        Arc::clone(&settings),
        Arc::clone(&database),
    ));

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        window,
        Arc::clone(&orchestrator),
        settings,
        Arc::new(Downloader::new(fetcher)),
    ));

    // Refresh the window whenever the catalog changes
    let listener_handle = spawn_event_listener(Arc::clone(&state));

    if config.update.enabled {
        orchestrator.start();
        info!(
            interval_secs = config.update.update_interval_secs,
            "Periodic update check started"
        );
    } else {
        info!("Periodic update check disabled in config");
    }

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if config.update.enabled {
        orchestrator.stop();
    }
    listener_handle.abort();
    info!("Shutdown complete");

    Ok(())
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
