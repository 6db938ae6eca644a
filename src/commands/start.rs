use anyhow::Result;
use colored::Colorize;
use flow_query_gateway::{config, init_tracing, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// Tracing is initialized only once the configuration is loaded, so that the
/// configured level and format apply from the first line.
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting flow query gateway...".green());

    let cfg = config::load_config(config_path)?;
    init_tracing(&cfg.server.log_level, cfg.server.log_format == "json");

    info!(config = %config_path.display(), "Configuration loaded");

    server::start_server(cfg).await
}
