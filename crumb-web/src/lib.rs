//! Crumb Web - axum integration for crumb sessions
//!
//! [`with_sessions`] installs [`session_middleware`] on a router. Route handlers
//! take a [`SessionHandle`] extractor; once they return, the middleware persists
//! the session and appends the signed `Set-Cookie` header.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use crumb_core::{init_logging, CrumbConfig, LoggingConfig};
pub use error::SessionError;
pub use extract::SessionHandle;
pub use middleware::session_middleware;
pub use server::{build_handler, spawn_flush_task, CrumbServer};

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use crumb_session::CookieSessionManager;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Wrap every route of `router` with session handling
pub fn with_sessions<S>(router: Router<S>, manager: Arc<CookieSessionManager>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(manager, session_middleware))
}

/// Create the demo application router
pub fn create_app(manager: Arc<CookieSessionManager>) -> Router {
    let api = Router::new()
        .route("/session", get(handlers::get_session))
        .route("/session/save", post(handlers::save_session))
        .route(
            "/session/{key}",
            put(handlers::put_value).delete(handlers::delete_value),
        );

    Router::new()
        .route("/api/health", get(handlers::health_check))
        .nest("/api", with_sessions(api, manager))
        .layer(TraceLayer::new_for_http())
}
