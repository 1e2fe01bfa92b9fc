//! CLI client binary: prints tracking events for the allow-listed accounts
//! until interrupted.

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracker_bus::{Bus, RedisBus};
use tracker_client::config::{self, Config};
use tracker_client::{FilterDedupe, Subscriber, WriterSink};
use tracker_types::TRACKING_EVENTS_CHANNEL;

fn resolve_config_path() -> String {
    std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            std::env::var("TRACKER_CLIENT_CONFIG_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
        })
        .unwrap_or_else(|| "client.toml".to_string())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Logs go to stderr so stdout carries only displayed events.
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = resolve_config_path();
    let config = match config::load_config(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    let bus = match RedisBus::connect(&config.bus.url).await {
        Ok(bus) => bus,
        Err(e) => {
            tracing::error!(url = %config.bus.url, error = %e, "failed to connect to bus");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = bus.ping().await {
        tracing::error!(url = %config.bus.url, error = %e, "bus did not answer ping");
        return ExitCode::FAILURE;
    }

    let subscriber = match Subscriber::connect(&bus, TRACKING_EVENTS_CHANNEL).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            tracing::error!(error = %e, "failed to subscribe");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    println!("CLI client started. Listening for events...");

    let mut filter = FilterDedupe::default();
    let mut sink = WriterSink::stdout();
    match subscriber.run(&mut filter, &mut sink, cancel).await {
        Ok(_) => {
            println!("Terminating CLI client...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "subscriber stopped");
            ExitCode::FAILURE
        }
    }
}

/// Cancels `token` on SIGINT (Ctrl+C) or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
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
        () = ctrl_c => { tracing::info!("received SIGINT"); }
        () = terminate => { tracing::info!("received SIGTERM"); }
    }
    token.cancel();
}
