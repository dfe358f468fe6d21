//! MBTA arrival-time proxy.
//!
//! Forwards every inbound GET to the MBTA v3 API and answers with the first
//! prediction's arrival time.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!   Client Request       │  ┌─────────┐    ┌──────────┐                  │
//!   ─────────────────────┼─▶│  http   │───▶│ upstream │──── GET ─────────┼──▶ MBTA API
//!                        │  │ server  │    │  client  │◀─────────────────┼───
//!                        │  └─────────┘    └────┬─────┘                  │
//!                        │                      ▼                        │
//!   Client Response      │  ┌─────────┐    ┌──────────┐                  │
//!   ◀────────────────────┼──│response │◀───│ payload  │                  │
//!                        │  └─────────┘    └──────────┘                  │
//!                        │                                               │
//!                        │   config · observability · lifecycle          │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use mbta_proxy::config::{self, ConfigError, Overrides, ProxyConfig};
use mbta_proxy::config::watcher::ConfigWatcher;
use mbta_proxy::http::HttpServer;
use mbta_proxy::lifecycle::Shutdown;
use mbta_proxy::observability::{logging, metrics};

const LOGGING_HELP: &str = "\
Logging: each request logs its path and completion at info level. The raw
upstream response body is logged at debug level only; set
`observability.log_level = \"debug\"` or RUST_LOG=mbta_proxy=debug to see it.";

#[derive(Parser)]
#[command(name = "mbta-proxy")]
#[command(about = "Proxy that reshapes MBTA prediction responses into {\"datetime\": ...}", long_about = None)]
#[command(after_help = LOGGING_HELP)]
struct Cli {
    /// TOML configuration file (watched for changes)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, replacing the port of listener.bind_address
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream origin, e.g. https://api-v3.mbta.com
    #[arg(short, long)]
    upstream: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            upstream: self.upstream.clone(),
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let base = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.overrides().apply(base)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init(&config.observability);

    tracing::info!("mbta-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        max_connections = config.listener.max_connections,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    // Reloaded files get the same command-line overrides as the initial load.
    let (update_tx, config_updates) = mpsc::unbounded_channel();
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut file_updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let overrides = cli.overrides();
            tokio::spawn(async move {
                while let Some(reloaded) = file_updates.recv().await {
                    match overrides.apply(reloaded) {
                        Ok(config) => {
                            if update_tx.send(config).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Reloaded configuration rejected"),
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server = HttpServer::new(config)?;

    shutdown.trigger_on_signal();

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn help_explains_where_upstream_bodies_are_logged() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("upstream response body is logged at debug level"), "{}", help);
    }

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::parse_from(["mbta-proxy", "--port", "8080", "--upstream", "http://localhost:3000"]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.upstream.base_url, "http://localhost:3000");
    }
}
