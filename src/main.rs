//! Vectara MCP server
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                   VECTARA MCP SERVER                 │
//!                      │                                                      │
//!   Probe / Tool call  │  ┌─────────┐    ┌──────────┐    ┌─────────────────┐  │
//!   ───────────────────┼─▶│  http   │───▶│ security │───▶│ tools / health  │  │
//!                      │  │ server  │    │ auth+rl  │    │                 │  │
//!                      │  └─────────┘    └──────────┘    └────────┬────────┘  │
//!                      │                                          │           │
//!                      │                                          ▼           │
//!                      │  ┌────────────────────────────────────────────────┐  │
//!                      │  │ upstream::ConnectionManager                     │  │
//!                      │  │   retry (backoff+jitter) → circuit breaker      │──┼──▶ Vectara API
//!                      │  └────────────────────────────────────────────────┘  │
//!                      │                                                      │
//!                      │  config · observability · lifecycle (cross-cutting)  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use vectara_mcp::config::{self, LogFormat, ServerConfig};
use vectara_mcp::lifecycle::{self, signals, Shutdown};
use vectara_mcp::observability::{logging, metrics};
use vectara_mcp::security::{OriginPolicy, TokenAuth};
use vectara_mcp::{ConnectionManager, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "vectara-mcp", version, about = "Vectara MCP server with resilient upstream access")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Disable bearer token authentication on tool endpoints
    #[arg(long)]
    no_auth: bool,

    /// Log output format: pretty or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

fn apply_cli(mut config: ServerConfig, cli: &Cli) -> ServerConfig {
    if cli.host.is_some() || cli.port.is_some() {
        let (current_host, current_port) = config
            .server
            .bind_address
            .rsplit_once(':')
            .map(|(h, p)| (h.to_string(), p.to_string()))
            .unwrap_or_else(|| ("127.0.0.1".to_string(), "8000".to_string()));
        let host = cli.host.clone().unwrap_or(current_host);
        let port = cli.port.map(|p| p.to_string()).unwrap_or(current_port);
        config.server.bind_address = format!("{}:{}", host, port);
    }
    if cli.no_auth {
        config.server.auth_required = false;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };
    let config = apply_cli(config, &cli);

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vectara-mcp starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        upstream = %config.upstream.base_url,
        auth_required = config.server.auth_required,
        api_key_configured = config.upstream.api_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let manager = Arc::new(ConnectionManager::new(&config));
    if let Err(e) = manager.initialize().await {
        tracing::warn!(error = %e, "Connection manager initialization deferred");
    }

    let auth = TokenAuth::from_env(config.server.auth_required, config.upstream.api_key.as_deref());
    let server = HttpServer::new(&config, manager.clone(), auth, OriginPolicy::from_env());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    signals::install(shutdown.clone());

    let result = server.run(listener, shutdown.wait()).await;

    lifecycle::cleanup(&manager).await;
    tracing::info!("Shutdown complete");
    result.map_err(Into::into)
}
