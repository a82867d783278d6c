//! Server assembly: handler selection, background flushing, serving

use crate::create_app;
use crumb_core::{CrumbConfig, CrumbResult, StorageBackend};
use crumb_session::{CookieSessionManager, FileHandler, MemoryHandler, SessionHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Build the session handler selected by the `[storage]` section
pub fn build_handler(config: &CrumbConfig) -> CrumbResult<Arc<dyn SessionHandler>> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryHandler::new(storage.delta))),
        StorageBackend::File => {
            let data_dir = storage.data_dir.as_ref().ok_or_else(|| {
                crumb_core::config_error!("File storage requires storage.data_dir", "server")
            })?;
            Ok(Arc::new(FileHandler::new(data_dir, storage.delta)?))
        }
    }
}

/// Periodically remove expired sessions from the handler
pub fn spawn_flush_task(handler: Arc<dyn SessionHandler>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            match handler.flush_expired_sessions().await {
                Ok(0) => debug!("No expired sessions to flush"),
                Ok(flushed) => info!(flushed, "Flushed expired sessions"),
                Err(e) => warn!("Flushing expired sessions failed: {}", e),
            }
        }
    })
}

/// Session demo server
pub struct CrumbServer {
    config: CrumbConfig,
    host: String,
    port: u16,
}

impl CrumbServer {
    pub fn new(config: CrumbConfig, host: impl Into<String>, port: u16) -> Self {
        Self {
            config,
            host: host.into(),
            port,
        }
    }

    /// Validate the configuration, bind and serve until the process stops
    pub async fn run(self) -> anyhow::Result<()> {
        self.config.validate()?;

        let handler = build_handler(&self.config)?;
        let manager = Arc::new(CookieSessionManager::from_config(
            &self.config.cookie,
            Arc::clone(&handler),
        )?);

        let flush_every = Duration::from_secs(self.config.storage.flush_interval_secs.max(1));
        let flush_task = spawn_flush_task(handler, flush_every);

        let address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&address).await?;
        info!(
            address = %address,
            cookie = manager.cookie_name(),
            delta = manager.delta(),
            backend = ?self.config.storage.backend,
            "Session server listening"
        );

        let result = axum::serve(listener, create_app(manager)).await;
        flush_task.abort();
        result?;
        Ok(())
    }
}
