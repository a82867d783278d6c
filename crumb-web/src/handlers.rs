//! Demo endpoints operating on the current session

use crate::{SessionError, SessionHandle};
use axum::{extract::Path, http::StatusCode, Json};
use serde_json::{json, Value};

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Return the session id and its data
pub async fn get_session(session: SessionHandle) -> Result<Json<Value>, SessionError> {
    let data = session.snapshot().await?;
    Ok(Json(json!({
        "id": session.id().await,
        "is_new": session.is_new().await,
        "data": data,
    })))
}

/// Store the JSON body under `key`
pub async fn put_value(
    session: SessionHandle,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, SessionError> {
    let previous = session.insert(&key, value).await?;
    Ok(Json(json!({ "key": key, "previous": previous })))
}

/// Remove `key` from the session
pub async fn delete_value(
    session: SessionHandle,
    Path(key): Path<String>,
) -> Result<Json<Value>, SessionError> {
    match session.remove(&key).await? {
        Some(removed) => Ok(Json(json!({ "key": key, "removed": removed }))),
        None => Err(SessionError::KeyNotFound(key)),
    }
}

/// Force the session to be stored at the end of this request
pub async fn save_session(session: SessionHandle) -> StatusCode {
    session.mark_dirty().await;
    StatusCode::NO_CONTENT
}
