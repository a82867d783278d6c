//! Crumb CLI - maintenance commands for crumb session stores
//!
//! Inspects and prunes a file-backed session store, and signs or verifies
//! session ids with the configured cookie secret.

use clap::{Parser, Subcommand};
use crumb_core::{
    config_error, default_config_paths, init_logging, log_operation_error, log_operation_start,
    log_operation_success, CrumbConfig, CrumbError, CrumbResult, ErrorContext, LoggingConfig,
};
use crumb_session::{FileHandler, SessionHandler, TimestampSigner};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "crumb")]
#[command(about = "Maintenance commands for crumb session stores")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session directory, overriding storage.data_dir
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored session ids
    List,

    /// Print the data of a session
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session
    Clear {
        /// Session id
        id: String,
    },

    /// Remove every expired session
    Flush,

    /// Show storage statistics
    Stats,

    /// Sign a session id as it would appear in the cookie
    Sign {
        /// Session id
        id: String,
    },

    /// Verify a signed cookie value and print the session id
    Verify {
        /// Signed cookie value
        signed: String,
    },

    /// Manage configuration
    Config {
        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> CrumbResult<()> {
    let cli = Cli::parse();

    let mut logging_config = LoggingConfig::default();
    logging_config.level = if cli.verbose { "debug" } else { "warn" }.to_string();
    // Command output goes to stdout; keep library info logs out of it
    logging_config.filter_directives.clear();

    init_logging(&logging_config).map_err(|e| CrumbError::Config {
        message: format!("Failed to initialize logging: {}", e),
        source: Some(e),
        context: ErrorContext::new("cli")
            .with_operation("init_logging")
            .with_suggestion("Check logging configuration"),
    })?;

    info!("Starting crumb CLI v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = Some(data_dir);
    }

    match cli.command {
        Commands::List => handle_list(&open_store(&config)?).await?,
        Commands::Show { id } => handle_show(&open_store(&config)?, &id).await?,
        Commands::Clear { id } => handle_clear(&open_store(&config)?, &id).await?,
        Commands::Flush => handle_flush(&open_store(&config)?).await?,
        Commands::Stats => handle_stats(&open_store(&config)?).await?,
        Commands::Sign { id } => println!("{}", sign_id(&config, &id)?),
        Commands::Verify { signed } => println!("{}", verify_id(&config, &signed)?),
        Commands::Config {
            init,
            show,
            validate,
        } => handle_config(cli.config.as_deref(), &config, init, show, validate)?,
    }

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> CrumbResult<CrumbConfig> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            CrumbConfig::from_file(path)?
        }
        None => match default_config_paths().into_iter().find(|path| path.exists()) {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                CrumbConfig::from_file(path)?
            }
            None => {
                info!("No configuration file found, using defaults");
                CrumbConfig::default()
            }
        },
    };

    config.apply_env_overrides()?;
    Ok(config)
}

/// Open the session directory regardless of the configured backend
fn open_store(config: &CrumbConfig) -> CrumbResult<FileHandler> {
    let data_dir = config.storage.data_dir.as_ref().ok_or_else(|| {
        config_error!("No session directory configured; pass --data-dir", "cli")
    })?;
    FileHandler::new(data_dir, config.storage.delta)
}

async fn handle_list(store: &FileHandler) -> CrumbResult<()> {
    let mut session_ids = store.session_ids().await?;
    session_ids.sort();

    for session_id in &session_ids {
        println!("{}", session_id);
    }
    println!("{} session(s)", session_ids.len());
    Ok(())
}

async fn handle_show(store: &FileHandler, session_id: &str) -> CrumbResult<()> {
    let data = store.get(session_id).await.map_err(|e| {
        log_operation_error!("show_session", e, session_id = %session_id);
        e
    })?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

async fn handle_clear(store: &FileHandler, session_id: &str) -> CrumbResult<()> {
    log_operation_start!("clear_session", session_id = %session_id);
    store.clear(session_id).await?;
    log_operation_success!("clear_session", session_id = %session_id);
    println!("Cleared session {}", session_id);
    Ok(())
}

async fn handle_flush(store: &FileHandler) -> CrumbResult<()> {
    log_operation_start!("flush_expired_sessions");
    let flushed = store.flush_expired_sessions().await.map_err(|e| {
        log_operation_error!("flush_expired_sessions", e);
        e
    })?;
    log_operation_success!("flush_expired_sessions", flushed = flushed);
    println!("Flushed {} expired session(s)", flushed);
    Ok(())
}

async fn handle_stats(store: &FileHandler) -> CrumbResult<()> {
    let stats = store.storage_stats().await?;
    println!("{}", stats.summary());
    println!("Session lifetime: {}s", store.delta());
    Ok(())
}

fn signer(config: &CrumbConfig) -> CrumbResult<TimestampSigner> {
    if config.cookie.secret.is_empty() {
        return Err(config_error!("Cookie signing secret must not be empty", "cli"));
    }
    Ok(TimestampSigner::new(&config.cookie.secret))
}

fn sign_id(config: &CrumbConfig, session_id: &str) -> CrumbResult<String> {
    Ok(signer(config)?.sign(session_id))
}

fn verify_id(config: &CrumbConfig, signed: &str) -> CrumbResult<String> {
    signer(config)?.unsign(signed, Some(config.storage.delta))
}

fn handle_config(
    config_path: Option<&Path>,
    config: &CrumbConfig,
    init: bool,
    show: bool,
    validate: bool,
) -> CrumbResult<()> {
    if init {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => default_config_paths().into_iter().next().ok_or_else(|| {
                config_error!("Cannot determine a configuration directory", "cli")
            })?,
        };
        CrumbConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {:?}", path);
        println!("Set cookie.secret before serving sessions.");
    }

    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| CrumbError::Config {
            message: format!("Failed to render configuration: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("cli").with_operation("show_config"),
        })?;
        println!("{}", rendered);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
