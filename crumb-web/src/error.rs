//! HTTP mapping for session errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crumb_core::CrumbError;
use serde_json::json;

/// Errors surfaced to route handlers using the session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session layer is not installed")]
    MissingLayer,
    #[error("Session key not found: {0}")]
    KeyNotFound(String),
    #[error(transparent)]
    Storage(#[from] CrumbError),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            SessionError::MissingLayer => {
                (StatusCode::INTERNAL_SERVER_ERROR, "session_layer_missing")
            }
            SessionError::KeyNotFound(_) => (StatusCode::NOT_FOUND, "key_not_found"),
            SessionError::Storage(err) => {
                err.log();
                match err {
                    CrumbError::SessionNotFound { .. } => {
                        (StatusCode::UNAUTHORIZED, "session_not_found")
                    }
                    CrumbError::HandlerUnavailable { .. } | CrumbError::Io(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "session_store_unavailable")
                    }
                    CrumbError::Serialization(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_session_value")
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, "session_error"),
                }
            }
        };

        let body = Json(json!({
            "error": error_code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
