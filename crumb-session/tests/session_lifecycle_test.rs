//! Persist behaviour and the cookie round trip, observed through a recording handler

use async_trait::async_trait;
use crumb_core::{not_found_error, CrumbError, CrumbResult};
use crumb_session::{
    CookieSessionManager, MemoryHandler, PersistAction, Session, SessionData, SessionHandler,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    New,
    Get(String),
    Set(String, SessionData),
    Touch(String),
}

/// Wraps a memory handler and records every call made to it
struct RecordingHandler {
    inner: MemoryHandler,
    calls: Mutex<Vec<Call>>,
}

impl RecordingHandler {
    fn new(delta: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryHandler::new(delta),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn sets(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Set(..)))
            .count()
    }

    fn touches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Touch(..)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SessionHandler for RecordingHandler {
    fn delta(&self) -> u64 {
        self.inner.delta()
    }

    async fn new_session(&self) -> CrumbResult<SessionData> {
        self.record(Call::New);
        self.inner.new_session().await
    }

    async fn get(&self, session_id: &str) -> CrumbResult<SessionData> {
        self.record(Call::Get(session_id.to_string()));
        self.inner.get(session_id).await
    }

    async fn set(&self, session_id: &str, data: &SessionData) -> CrumbResult<()> {
        self.record(Call::Set(session_id.to_string(), data.clone()));
        self.inner.set(session_id, data).await
    }

    async fn clear(&self, session_id: &str) -> CrumbResult<()> {
        self.inner.clear(session_id).await
    }

    async fn touch(&self, session_id: &str) -> CrumbResult<()> {
        self.record(Call::Touch(session_id.to_string()));
        self.inner.touch(session_id).await
    }

    async fn flush_expired_sessions(&self) -> CrumbResult<usize> {
        self.inner.flush_expired_sessions().await
    }
}

/// Handler whose backend is down
struct UnavailableHandler;

#[async_trait]
impl SessionHandler for UnavailableHandler {
    fn delta(&self) -> u64 {
        60
    }

    async fn get(&self, _session_id: &str) -> CrumbResult<SessionData> {
        Err(crumb_core::handler_error!("connection refused", "test"))
    }

    async fn set(&self, _session_id: &str, _data: &SessionData) -> CrumbResult<()> {
        Err(crumb_core::handler_error!("connection refused", "test"))
    }

    async fn clear(&self, session_id: &str) -> CrumbResult<()> {
        Err(not_found_error!(session_id, "test"))
    }

    async fn flush_expired_sessions(&self) -> CrumbResult<usize> {
        Ok(0)
    }
}

async fn stored_session(handler: &Arc<RecordingHandler>, id: &str) -> Session {
    let mut data = SessionData::new();
    data.insert("user".to_string(), json!("alice"));
    handler.set(id, &data).await.unwrap();
    handler.reset();
    Session::new(id, false, handler.clone())
}

fn cookie_pair(set_cookie: &str) -> &str {
    set_cookie.split(';').next().unwrap()
}

#[tokio::test]
async fn untouched_session_makes_no_handler_calls() {
    let handler = RecordingHandler::new(3600);
    let mut session = stored_session(&handler, "abc").await;

    assert_eq!(session.persist(false).await.unwrap(), PersistAction::Skipped);
    assert!(handler.calls().is_empty());
}

#[tokio::test]
async fn read_only_session_is_touched_once() {
    let handler = RecordingHandler::new(3600);
    let mut session = stored_session(&handler, "abc").await;

    assert!(session.contains_key("user").await.unwrap());
    assert_eq!(session.persist(false).await.unwrap(), PersistAction::Touched);

    assert_eq!(
        handler.calls(),
        vec![Call::Get("abc".to_string()), Call::Touch("abc".to_string())]
    );
}

#[tokio::test]
async fn written_session_is_stored_once_then_touched() {
    let handler = RecordingHandler::new(3600);
    let mut session = stored_session(&handler, "abc").await;

    session.insert("theme", "dark").await.unwrap();
    assert_eq!(session.persist(false).await.unwrap(), PersistAction::Stored);
    assert!(!session.is_modified());
    assert_eq!(handler.sets(), 1);
    assert_eq!(handler.touches(), 0);

    let expected = json!({"user": "alice", "theme": "dark"});
    assert!(handler
        .calls()
        .contains(&Call::Set("abc".to_string(), expected.as_object().unwrap().clone())));

    // Still accessed, no longer modified: only a touch
    assert_eq!(session.persist(false).await.unwrap(), PersistAction::Touched);
    assert_eq!(handler.sets(), 1);
    assert_eq!(handler.touches(), 1);
}

#[tokio::test]
async fn forced_persist_always_stores() {
    let handler = RecordingHandler::new(3600);
    let mut session = stored_session(&handler, "abc").await;

    assert_eq!(session.persist(true).await.unwrap(), PersistAction::Stored);
    assert_eq!(session.persist(true).await.unwrap(), PersistAction::Stored);
    assert_eq!(handler.sets(), 2);
    assert_eq!(handler.touches(), 0);
}

#[tokio::test]
async fn new_session_loads_from_handler_new() {
    let handler = RecordingHandler::new(3600);
    let mut session = Session::new("fresh", true, handler.clone());

    assert!(session.is_empty().await.unwrap());
    assert_eq!(handler.calls(), vec![Call::New]);
}

#[tokio::test]
async fn handler_failures_propagate() {
    let handler = Arc::new(UnavailableHandler);

    let mut existing = Session::new("abc", false, handler.clone());
    assert!(matches!(
        existing.get_value("user").await,
        Err(CrumbError::HandlerUnavailable { .. })
    ));

    let mut fresh = Session::new("fresh", true, handler);
    let err = fresh.persist(false).await.unwrap_err();
    assert!(matches!(err, CrumbError::HandlerUnavailable { .. }));
    // A failed store keeps the session dirty
    assert!(fresh.is_modified());
}

#[tokio::test]
async fn evicted_session_surfaces_not_found() {
    let handler = RecordingHandler::new(3600);
    let manager = CookieSessionManager::new("s3cr3t", handler.clone(), "sid");

    let signed = manager.refresh_id("evicted").signed_id;
    let mut session = manager.build_session(Some(&format!("sid={}", signed)));
    assert!(!session.is_new());

    assert!(matches!(
        session.get_value("user").await,
        Err(CrumbError::SessionNotFound { .. })
    ));
}

#[tokio::test]
async fn end_to_end_two_requests() {
    let handler = RecordingHandler::new(3600);
    let manager = CookieSessionManager::new("s3cr3t", handler.clone(), "sid");

    // First request: no cookie
    let mut session = manager.build_session(None);
    assert!(session.is_new());
    let u1 = session.id().to_string();
    assert!(session.is_empty().await.unwrap());
    session.insert("user", "alice").await.unwrap();

    let set_cookie = manager.finalize(&mut session, "/", "localhost").await.unwrap();
    let expected = json!({"user": "alice"}).as_object().unwrap().clone();
    assert!(handler.calls().contains(&Call::Set(u1.clone(), expected.clone())));
    assert!(set_cookie.starts_with(&format!("sid={}.", u1)));

    // Second request replays the cookie
    handler.reset();
    let header = cookie_pair(&set_cookie);
    assert_eq!(manager.derive_id(Some(header)), (false, u1.clone()));

    let mut session = manager.build_session(Some(header));
    assert_eq!(session.snapshot().await.unwrap(), expected);
    assert_eq!(handler.calls(), vec![Call::Get(u1)]);
}
