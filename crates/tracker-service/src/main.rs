//! Tracking service binary.
//!
//! Seeds the account store, connects to the bus, and serves the ingestion
//! endpoint until SIGINT/SIGTERM. Loss of the store or bus at startup is
//! fatal.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracker_bus::{Bus, RedisBus};
use tracker_db::AccountStore;
use tracker_service::config::{self, Config};
use tracker_service::gate::IngestionGate;
use tracker_service::publisher::spawn_publisher;
use tracker_service::startup::{self, StartupError};
use tracker_service::{app, AppState};
use tracker_types::TRACKING_EVENTS_CHANNEL;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("TRACKER_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().unwrap_or("tracker.toml");

    let config = match config::load_config(Some(selected_config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path,
        "resolved startup configuration path"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "tracking service failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let store: Arc<dyn AccountStore> = Arc::new(startup::open_account_store(&config.database)?);
    startup::seed_accounts(Arc::clone(&store), config.accounts.clone()).await?;

    let bus: Arc<dyn Bus> = Arc::new(RedisBus::connect(&config.bus.url).await?);
    startup::check_bus(bus.as_ref()).await?;
    tracing::info!(url = %config.bus.url, "connected to bus");

    let (publisher, publisher_task) = spawn_publisher(
        bus,
        TRACKING_EVENTS_CHANNEL,
        config.publisher.queue_capacity,
    );
    let app = app(AppState {
        gate: IngestionGate::new(store, publisher),
    });

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
    tracing::info!(%addr, "tracking service listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server error");
    }

    // The router (and with it every publisher handle) is gone; let the
    // worker flush what is still queued.
    let drain_timeout = Duration::from_millis(config.publisher.drain_timeout_ms);
    if let Some(stats) = publisher_task.join_with_timeout(drain_timeout).await {
        tracing::info!(
            published = stats.published,
            failed = stats.failed,
            "publisher drained"
        );
    }

    tracing::info!("tracking service shut down");
    Ok(())
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
