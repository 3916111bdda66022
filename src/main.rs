//! Hotel booking backend entry point.
//!
//! Loads configuration, builds the structured logger and metrics, wraps the
//! business routes in the observability pipeline and serves until SIGINT or
//! SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_observability::config::validation::validate_config;
use booking_observability::config::{load_config, ConfigError};
use booking_observability::lifecycle::spawn_signal_listener;
use booking_observability::observability::ProcessInfo;
use booking_observability::{AppState, HttpServer, Shutdown, StructuredLogger};

#[derive(Parser, Debug)]
#[command(name = "booking-observability")]
#[command(about = "Hotel booking backend with request observability")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port, overrides the file and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let process = Arc::new(ProcessInfo::new());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_observability=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    tracing::info!(
        bind_address = %config.bind_address(),
        environment = %config.server.environment,
        metrics_path = %config.metrics.path,
        "Configuration loaded"
    );

    let logger = Arc::new(StructuredLogger::from_config(&config.logging));
    let state = AppState::new(&config, logger.clone(), process)?;

    let routes = Router::new().route("/", get(|| async { "API is working" }));

    let listener = TcpListener::bind(config.bind_address()).await?;
    logger.info(
        &format!("Server running on port {}", config.server.port),
        json!({ "port": config.server.port, "environment": config.server.environment }),
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    spawn_signal_listener(shutdown);

    HttpServer::new(state, routes)
        .run(listener, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
