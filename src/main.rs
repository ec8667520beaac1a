//! API gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ axum router ──▶ Pipeline ──────────────────────────────▶ Backend
//!                 │               │ CredentialValidator (TokenVerifier)
//!                 │               │ RouteResolver (ArcSwap<RoutingSnapshot>: table + registry)
//!                 │               │ RequestForwarder (Transport, retry policy)
//!                 │               ▼
//!                 └── /health   GatewayResult ──▶ relayed response or JSON error
//!
//!     ConfigWatcher ──▶ reload routes and services
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_gateway::config::{load_config, validation::validate_config, ConfigError, ConfigWatcher};
use api_gateway::lifecycle::{wait_for_signal, Shutdown};
use api_gateway::observability::{init_logging, init_metrics};
use api_gateway::{GatewayConfig, HttpServer};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about = "Authenticating API gateway")]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    if cli.check {
        println!(
            "configuration OK: {} routes, {} services, {} tokens",
            config.routes.len(),
            config.services.len(),
            config.auth.tokens.len()
        );
        return Ok(());
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        services = config.services.len(),
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone())?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            wait_for_signal().await;
            shutdown.trigger();
        }
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
