//! Session handler - the storage collaborator behind every session
//!
//! A [`Session`](crate::Session) never talks to storage directly. Everything goes
//! through a handler, which owns the data and decides how idle expiry works.

use crate::SessionData;
use async_trait::async_trait;
use crumb_core::CrumbResult;

/// Storage backend for session data, keyed by the raw (unsigned) session id.
///
/// Implementations must allow `get`, `set` and `touch` to run concurrently for
/// different ids. Concurrent `set` calls for the same id are last-writer-wins
/// unless the implementation documents otherwise.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Session lifetime in seconds. The manager uses it as the signature max age
    /// and as the cookie expiry.
    fn delta(&self) -> u64;

    /// Fresh data for a session that has never been stored
    async fn new_session(&self) -> CrumbResult<SessionData> {
        Ok(SessionData::new())
    }

    /// Load the data stored for `session_id`.
    ///
    /// Fails with `CrumbError::SessionNotFound` when the id is absent or expired.
    async fn get(&self, session_id: &str) -> CrumbResult<SessionData>;

    /// Store `data` under `session_id`, replacing what was there
    async fn set(&self, session_id: &str, data: &SessionData) -> CrumbResult<()>;

    /// Remove the session
    async fn clear(&self, session_id: &str) -> CrumbResult<()>;

    /// Refresh idle expiry without rewriting the data.
    ///
    /// Backends without such a concept can keep the default no-op.
    async fn touch(&self, _session_id: &str) -> CrumbResult<()> {
        Ok(())
    }

    /// Remove every expired session, returning how many were removed
    async fn flush_expired_sessions(&self) -> CrumbResult<usize>;

    /// Ids of the stored sessions, if the backend can enumerate them
    async fn session_ids(&self) -> CrumbResult<Vec<String>> {
        Ok(Vec::new())
    }
}
