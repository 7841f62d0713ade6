use anyhow::{Context, Result};
use clap::Parser;
use jellyfin_exporter::prelude::*;
use jellyfin_exporter::{server, util::logging};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jellyfin-exporter: {}", e);
            std::process::exit(1);
        }
    };

    let (level, level_error) = match config.log_level() {
        Ok(level) => (level, None),
        Err(e) => (LogLevel::default(), Some(e)),
    };
    logging::init(level);
    if let Some(e) = level_error {
        warn!("invalid log level: {}", e);
    }
    info!("jellyfin-exporter version {}", jellyfin_exporter::VERSION);

    let client = ApiClient::new(config.host.as_str(), &config.api_key)?;
    let collector = Arc::new(JellyfinCollector::new(client.clone(), &config.namespace));

    let mut registry = Registry::new();
    registry.register_collector(collector)?;

    // Advisory only: the exporter serves even if Jellyfin is down right now
    match client.system_info().await {
        Ok(info) => info!("jellyfin version {}", info.version),
        Err(e) => warn!("failed to get jellyfin version: {}", e),
    }

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {}", addr))?;
    info!("serving metrics at {}", config.listen);

    if let Err(e) = server::serve(listener, Arc::new(registry), shutdown_signal()).await {
        error!("server error: {}", e);
        return Err(e.into());
    }

    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
