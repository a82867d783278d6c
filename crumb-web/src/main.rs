//! Crumb Web Server
//!
//! Serves the session demo API backed by the configured session store.

use clap::Parser;
use crumb_core::default_config_paths;
use crumb_web::{init_logging, CrumbConfig, CrumbServer};
use std::path::PathBuf;
use tracing::info;

/// Crumb session demo server
#[derive(Parser)]
#[command(name = "crumb-web")]
#[command(about = "Signed-cookie session demo server")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CrumbConfig> {
    let mut config = match path {
        Some(path) => CrumbConfig::from_file(path)?,
        None => match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => CrumbConfig::from_file(path)?,
            None => CrumbConfig::default(),
        },
    };
    config.apply_env_overrides()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let mut config = load_config(args.config.as_ref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting crumb-web v{}", env!("CARGO_PKG_VERSION"));

    CrumbServer::new(config, args.host, args.port).run().await
}
