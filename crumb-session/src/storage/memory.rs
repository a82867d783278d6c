//! In-process session handler

use super::StoredSession;
use crate::{SessionData, SessionHandler};
use async_trait::async_trait;
use chrono::Utc;
use crumb_core::{not_found_error, CrumbResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Keeps sessions in a map guarded by an async `RwLock`.
///
/// Data lives as long as the handler does, which makes it suitable for tests and
/// single-process servers.
pub struct MemoryHandler {
    delta: u64,
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl MemoryHandler {
    pub fn new(delta: u64) -> Self {
        Self {
            delta,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored sessions, expired ones included
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionHandler for MemoryHandler {
    fn delta(&self) -> u64 {
        self.delta
    }

    async fn get(&self, session_id: &str) -> CrumbResult<SessionData> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(stored) if !stored.is_expired(self.delta, now) => {
                    return Ok(stored.data.clone());
                }
                Some(_) => {}
                None => return Err(not_found_error!(session_id, "memory_handler")),
            }
        }

        // Expired: evict before reporting it missing
        self.sessions.write().await.remove(session_id);
        debug!(session_id, "Evicted expired session");
        Err(not_found_error!(session_id, "memory_handler"))
    }

    async fn set(&self, session_id: &str, data: &SessionData) -> CrumbResult<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), StoredSession::new(data.clone()));
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> CrumbResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> CrumbResult<()> {
        if let Some(stored) = self.sessions.write().await.get_mut(session_id) {
            stored.last_access = Utc::now();
        }
        Ok(())
    }

    async fn flush_expired_sessions(&self) -> CrumbResult<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| !stored.is_expired(self.delta, now));
        let flushed = before - sessions.len();
        if flushed > 0 {
            debug!(flushed, "Flushed expired sessions");
        }
        Ok(flushed)
    }

    async fn session_ids(&self) -> CrumbResult<Vec<String>> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }
}
