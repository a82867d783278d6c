//! Session - lazily loaded key/value data with change tracking
//!
//! Data is fetched from the handler on first access only. Writes mark the
//! session as modified; [`Session::persist`] then decides between storing the
//! data, refreshing its idle expiry, or doing nothing at all.

use crate::{SessionData, SessionHandler};
use crumb_core::{CrumbError, CrumbResult};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Load state of the session mapping
#[derive(Debug, Clone, Default)]
enum SessionState {
    #[default]
    Unloaded,
    Loaded(SessionData),
}

/// What [`Session::persist`] asked the handler to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    /// `handler.set` was called
    Stored,
    /// `handler.touch` was called
    Touched,
    /// No handler call
    Skipped,
}

/// A single session, owned by one request
pub struct Session {
    id: String,
    is_new: bool,
    modified: bool,
    state: SessionState,
    handler: Arc<dyn SessionHandler>,
}

impl Session {
    /// Create a session around `id` without loading anything.
    ///
    /// New sessions start out modified so that the first persist stores them.
    pub fn new(id: impl Into<String>, is_new: bool, handler: Arc<dyn SessionHandler>) -> Self {
        Self {
            id: id.into(),
            is_new,
            modified: is_new,
            state: SessionState::Unloaded,
            handler,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether the mapping has been loaded
    pub fn accessed(&self) -> bool {
        matches!(self.state, SessionState::Loaded(_))
    }

    async fn data(&mut self) -> CrumbResult<&mut SessionData> {
        if let SessionState::Unloaded = self.state {
            let data = if self.is_new {
                self.handler.new_session().await?
            } else {
                self.handler.get(&self.id).await?
            };
            debug!(
                session_id = %self.id,
                is_new = self.is_new,
                keys = data.len(),
                "Loaded session data"
            );
            self.state = SessionState::Loaded(data);
        }

        match &mut self.state {
            SessionState::Loaded(data) => Ok(data),
            SessionState::Unloaded => Err(CrumbError::internal("session data was not loaded")),
        }
    }

    /// Deserialize the value stored under `key`
    pub async fn get<T: DeserializeOwned>(&mut self, key: &str) -> CrumbResult<Option<T>> {
        let data = self.data().await?;
        data.get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(CrumbError::from)
    }

    /// Like [`get`](Self::get), falling back to `default` for a missing key
    pub async fn get_or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> CrumbResult<T> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Raw JSON value stored under `key`
    pub async fn get_value(&mut self, key: &str) -> CrumbResult<Option<Value>> {
        Ok(self.data().await?.get(key).cloned())
    }

    /// Store `value` under `key`, returning the previous value
    pub async fn insert<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> CrumbResult<Option<Value>> {
        let value = serde_json::to_value(value)?;
        let previous = self.data().await?.insert(key.into(), value);
        self.modified = true;
        Ok(previous)
    }

    /// Remove `key`. Only an actual removal marks the session as modified.
    pub async fn remove(&mut self, key: &str) -> CrumbResult<Option<Value>> {
        let removed = self.data().await?.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        Ok(removed)
    }

    pub async fn contains_key(&mut self, key: &str) -> CrumbResult<bool> {
        Ok(self.data().await?.contains_key(key))
    }

    pub async fn keys(&mut self) -> CrumbResult<Vec<String>> {
        Ok(self.data().await?.keys().cloned().collect())
    }

    pub async fn len(&mut self) -> CrumbResult<usize> {
        Ok(self.data().await?.len())
    }

    pub async fn is_empty(&mut self) -> CrumbResult<bool> {
        Ok(self.data().await?.is_empty())
    }

    /// Copy of the whole mapping
    pub async fn snapshot(&mut self) -> CrumbResult<SessionData> {
        Ok(self.data().await?.clone())
    }

    /// Mark the session for storage without writing a key.
    ///
    /// Needed after mutating a nested value obtained from the session, which
    /// change tracking cannot see.
    pub fn mark_dirty(&mut self) {
        self.modified = true;
    }

    /// Write the session back through the handler.
    ///
    /// Stores the data when `force` is set or the session was modified, refreshes
    /// idle expiry when it was only read, and does nothing when it was never
    /// touched.
    pub async fn persist(&mut self, force: bool) -> CrumbResult<PersistAction> {
        if force || self.modified {
            let handler = Arc::clone(&self.handler);
            let id = self.id.clone();
            let data = self.data().await?;
            handler.set(&id, data).await?;
            self.modified = false;
            debug!(session_id = %id, force, "Stored session");
            Ok(PersistAction::Stored)
        } else if self.accessed() {
            self.handler.touch(&self.id).await?;
            debug!(session_id = %self.id, "Touched session");
            Ok(PersistAction::Touched)
        } else {
            Ok(PersistAction::Skipped)
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("is_new", &self.is_new)
            .field("modified", &self.modified)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
