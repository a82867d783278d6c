//! Reference session handlers

pub mod file;
pub mod memory;

pub use file::{FileHandler, StorageStats};
pub use memory::MemoryHandler;

use crate::SessionData;
use chrono::{DateTime, Duration, Utc};

/// Session data together with its idle-expiry timestamp
#[derive(Debug, Clone)]
pub(crate) struct StoredSession {
    pub data: SessionData,
    pub last_access: DateTime<Utc>,
}

impl StoredSession {
    pub fn new(data: SessionData) -> Self {
        Self {
            data,
            last_access: Utc::now(),
        }
    }

    /// Idle for at least `delta` seconds
    pub fn is_expired(&self, delta: u64, now: DateTime<Utc>) -> bool {
        let delta = i64::try_from(delta)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        now - self.last_access >= delta
    }
}
