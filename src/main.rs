//! Deadline demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id + trace ──▶ root Deadline (per request)
//!                                                   │
//!               ┌───────────────────┬───────────────┼────────────────────┐
//!               ▼                   ▼               ▼                    ▼
//!          /hello,            derive_deadline   timeout_handler     timeout_handler
//!          /slow-hello        (inline, 1s)      (racing, 2s)        (racing, 2s)
//!               │                   │               │                    │
//!               ▼                   ▼               ▼                    ▼
//!          blocking work      blocking work     blocking work       Store::query_one_
//!                             (ignores token)   (keeps running      cancellable
//!                                               after timeout)          │
//!                                                                       ▼
//!                                                                 pool ─▶ Postgres
//!                                                                 abort on cancel
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use deadline_server::config::{self, ServerConfig};
use deadline_server::lifecycle::{signals, Shutdown};
use deadline_server::observability::{logging, metrics};
use deadline_server::remote::PgStore;
use deadline_server::HttpServer;

#[derive(Parser)]
#[command(name = "deadline-server")]
#[command(about = "HTTP server demonstrating deadline propagation and timeouts", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URI, overrides `database.url`.
    #[arg(long)]
    dburi: Option<String>,

    /// Bind address, overrides `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(url) = cli.dburi {
        config.database.url = url;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    let config = config::finalize(config)?;

    logging::init(&config.observability);
    tracing::info!("deadline-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        deadline_secs = config.timeouts.deadline_secs,
        handler_secs = config.timeouts.handler_secs,
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

    let store = Arc::new(PgStore::new(&config.database)?);
    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { signals::shutdown_on_ctrl_c(&shutdown).await }
    });

    let server = HttpServer::new(config, store);
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
