//! cnxmd-proxy
//!
//! Accepts TCP connections, dials the configured destination, writes a
//! CNXMD header carrying the configured metadata, then relays raw bytes in
//! both directions.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                    CNXMD PROXY                        │
//!                 │                                                       │
//!   Client        │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐  │
//!   ──────────────┼─▶│   net    │──▶│ session  │──▶│ protocol (header │──┼──▶ Destination
//!                 │  │ listener │   │  dial    │   │  encode + write) │  │
//!                 │  └──────────┘   └────┬─────┘   └──────────────────┘  │
//!                 │                      ▼                                │
//!   ◀─────────────┼──────────────── relay (duplex copy, half-close, ─────┼──▶
//!                 │                        bounded teardown)              │
//!                 │                                                       │
//!                 │  config · observability · lifecycle · resilience      │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use cnxmd_proxy::config::watcher::ConfigWatcher;
use cnxmd_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use cnxmd_proxy::lifecycle::{signals, Shutdown};
use cnxmd_proxy::observability::{logging, metrics};
use cnxmd_proxy::server::ProxyServer;

#[derive(Parser, Debug)]
#[command(name = "cnxmd-proxy")]
#[command(about = "TCP proxy that injects a connection metadata header", long_about = None)]
struct Cli {
    /// TOML configuration file; watched for changes when given.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:9090.
    #[arg(short, long)]
    bind: Option<String>,

    /// Destination host.
    #[arg(long)]
    dest_host: Option<String>,

    /// Destination port.
    #[arg(long)]
    dest_port: Option<u16>,

    /// Header entry as key=value; may be repeated.
    #[arg(short, long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    meta: Vec<(String, String)>,

    /// Seconds to wait for the second direction after the first closed.
    #[arg(long)]
    teardown_secs: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(host) = &self.dest_host {
            config.destination.host = host.clone();
        }
        if let Some(port) = self.dest_port {
            config.destination.port = port;
        }
        for (key, value) in &self.meta {
            config.metadata.insert(key.clone(), value.clone());
        }
        if let Some(secs) = self.teardown_secs {
            config.relay.teardown_secs = secs;
        }
    }
}

fn parse_meta(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;
    tracing::info!("cnxmd-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        destination_host = %config.destination.host,
        destination_port = config.destination.port,
        entries = config.metadata.len(),
        teardown_secs = config.relay.teardown_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Reloads go through the same CLI overrides as the initial load.
    let (reload_tx, config_updates) = mpsc::unbounded_channel();
    let config_path = cli.config.clone();
    let _watcher = match &config_path {
        Some(path) => {
            let (watcher, mut file_updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(async move {
                while let Some(mut reloaded) = file_updates.recv().await {
                    cli.apply(&mut reloaded);
                    match validate_config(&reloaded) {
                        Ok(()) => {
                            if reload_tx.send(reloaded).is_err() {
                                break;
                            }
                        }
                        Err(errors) => tracing::error!(
                            error = %ConfigError::Validation(errors),
                            "Reloaded configuration invalid after overrides"
                        ),
                    }
                }
            });
            Some(handle)
        }
        None => None,
    };

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(config);
    let mut server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    let finished = tokio::select! {
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            None
        }
        result = &mut server_task => Some(result),
    };
    match finished {
        Some(result) => result??,
        None => server_task.await??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
