//! mount-proxy
//!
//! Serves one backend under a mount path on this host.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ http::handler ──▶ routing (target)
//!                                          │
//!                                          ├─▶ http::request (headers, cookies, URL)
//!                                          ├─▶ http::client ──────────────▶ Backend
//!                                          ├─▶ http::response (Location, Set-Cookie)
//!     Client Response                      │
//!     ◀────────────── http::stream ◀───────┘
//!
//!     Cross-cutting: config, observability, lifecycle, net (connection slots)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use tokio::net::TcpListener;

use mount_proxy::config::{load_with_overrides, ConfigOverrides};
use mount_proxy::lifecycle::{spawn_signal_handler, Shutdown};
use mount_proxy::observability::{logging, metrics};
use mount_proxy::{HttpServer, HyperBackendClient, ProxyService};

#[derive(Parser)]
#[command(name = "mount-proxy")]
#[command(version, about = "Reverse proxy that mounts one backend under a path", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "MOUNT_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Backend target URI, overrides `target.uri`
    #[arg(long, env = "MOUNT_PROXY_TARGET")]
    target: Option<String>,

    /// Listen address, overrides `listener.bind_address`
    #[arg(long, env = "MOUNT_PROXY_LISTEN")]
    listen: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace, -vvv include dependencies)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        target: args.target,
        bind_address: args.listen,
    };
    let config = load_with_overrides(args.config.as_deref(), &overrides)?;

    logging::init_logging(&config.observability, args.verbose)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mount-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mount_path = %config.listener.mount_path,
        target = %config.target.uri,
        mode = ?config.target.mode,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = HyperBackendClient::new(&config.client, &config.forwarding);
    let config = Arc::new(config);
    let service = ProxyService::new(config.clone(), client)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    HttpServer::new(service)
        .run(listener, shutdown.signalled())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
