// SPDX-License-Identifier: GPL-3.0-only
mod api;
mod config;
mod content;
mod error;
mod extractor;
mod game;
mod logging;
mod map_vault;
mod policy;
mod registry;
mod utils;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use api::{ApiHandlers, HttpServer};
use config::Config;
use game::GameService;
use logging::setup_logging;
use map_vault::MapService;
use registry::SqliteRegistry;
use utils::create_dirs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    setup_logging(&config.log_level, config.log_format)?;

    info!("Starting MapVaultDaemon v{}", env!("CARGO_PKG_VERSION"));

    // Initialize registry
    let registry = Arc::new(SqliteRegistry::new(&config.registry_db_path).await?);
    info!("Registry initialized at {}", config.registry_db_path.display());

    for dir in [
        &config.temp_dir,
        &config.map.target_directory,
        &config.map.preview_directory,
        &config.game_logs.target_directory,
    ] {
        create_dirs(dir).await?;
    }

    let maps = Arc::new(MapService::new(&config, registry.clone()));
    let games = Arc::new(GameService::new(&config));
    let handlers = ApiHandlers::new(maps, games, registry);

    let http_server = HttpServer::new(handlers, config.api_bind);
    let shutdown = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal (Ctrl+C)"),
            Err(err) => error!(error = %err, "Unable to listen for shutdown signal"),
        }
    };

    if let Err(e) = http_server.serve(shutdown).await {
        error!(error = %e, "HTTP server error");
        return Err(e);
    }

    info!("Shutdown complete");
    Ok(())
}
