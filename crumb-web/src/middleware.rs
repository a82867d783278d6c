//! Session middleware
//!
//! Runs the inner handler first and finalizes afterwards: the session is persisted
//! and only then is the re-signed cookie rendered and appended to the response.

use crate::SessionHandle;
use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, HOST, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    middleware::Next,
    response::Response,
};
use crumb_session::CookieSessionManager;
use std::sync::Arc;
use tracing::{debug, warn};

/// Join every `Cookie` header into one `; `-separated list
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}

/// Host the request was addressed to, without the port
fn request_domain(request: &Request) -> Option<String> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())?;

    let domain = if host.starts_with('[') {
        // IPv6 literal, keep the brackets
        host.split_inclusive(']').next().unwrap_or(host)
    } else {
        host.split(':').next().unwrap_or(host)
    };

    (!domain.is_empty()).then(|| domain.to_string())
}

/// Attach a session to the request and emit its cookie on the response
pub async fn session_middleware(
    State(manager): State<Arc<CookieSessionManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session = manager.build_session(cookie_header(request.headers()).as_deref());

    let path = manager.cookie_path().unwrap_or("/").to_string();
    let domain = manager
        .cookie_domain()
        .map(str::to_string)
        .or_else(|| request_domain(&request))
        .unwrap_or_else(|| "localhost".to_string());

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let set_cookie = if handle.is_lost() {
        // Signed id without stored data: drop the cookie so the next request starts over
        debug!("Expiring cookie of a session missing from the store");
        manager.render_removal_cookie(&path, &domain)
    } else {
        let mut session = handle.lock().await;
        manager
            .finalize(&mut session, &path, &domain)
            .await
            .map_err(|e| {
                e.log();
                StatusCode::INTERNAL_SERVER_ERROR
            })?
    };

    let value = HeaderValue::from_str(&set_cookie).map_err(|e| {
        warn!("Rendered session cookie is not a valid header value: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    response.headers_mut().append(SET_COOKIE, value);

    Ok(response)
}
