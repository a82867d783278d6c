//! Request-scoped access to the session

use crate::SessionError;
use axum::{extract::FromRequestParts, http::request::Parts};
use crumb_core::{CrumbError, CrumbResult};
use crumb_session::{Session, SessionData};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Shared handle to the current request's session.
///
/// The middleware and the route handler hold clones of the same handle; the
/// mutex only serializes those two, never separate requests.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<Session>>,
    /// Set when loading found no stored data for a signed id
    lost: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            lost: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Direct access to the session
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Whether the signed id pointed at a session the handler no longer has
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Relaxed)
    }

    fn track<T>(&self, result: CrumbResult<T>) -> CrumbResult<T> {
        if let Err(CrumbError::SessionNotFound { .. }) = &result {
            self.lost.store(true, Ordering::Relaxed);
        }
        result
    }

    pub async fn id(&self) -> String {
        self.lock().await.id().to_string()
    }

    pub async fn is_new(&self) -> bool {
        self.lock().await.is_new()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CrumbResult<Option<T>> {
        let result = self.lock().await.get(key).await;
        self.track(result)
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: T) -> CrumbResult<Option<Value>> {
        let result = self.lock().await.insert(key, value).await;
        self.track(result)
    }

    pub async fn remove(&self, key: &str) -> CrumbResult<Option<Value>> {
        let result = self.lock().await.remove(key).await;
        self.track(result)
    }

    pub async fn snapshot(&self) -> CrumbResult<SessionData> {
        let result = self.lock().await.snapshot().await;
        self.track(result)
    }

    pub async fn mark_dirty(&self) {
        self.lock().await.mark_dirty();
    }
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = SessionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(SessionError::MissingLayer)
    }
}
