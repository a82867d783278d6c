//! Unified error handling for session handling
//!
//! Signature failures are expected at the cookie boundary and are usually
//! swallowed by the manager. Everything else carries an [`ErrorContext`] so that
//! handler and configuration problems can be traced back to where they happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type CrumbResult<T> = Result<T, CrumbError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for session handling
#[derive(Error, Debug)]
pub enum CrumbError {
    /// Bad or missing signature, or a secret mismatch
    #[error("Invalid signature: {message}")]
    SignatureInvalid { message: String },

    /// The signature verified but is older than the allowed max age
    #[error("Signature expired: age {age_secs}s exceeds {max_age_secs}s")]
    SignatureExpired { age_secs: i64, max_age_secs: u64 },

    #[error("Session not found: {session_id}")]
    SessionNotFound {
        session_id: String,
        context: ErrorContext,
    },

    /// Storage backend failure (connectivity, permissions, corrupt data)
    #[error("Session handler unavailable: {message}")]
    HandlerUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Invalid session id: {session_id:?}")]
    InvalidSessionId { session_id: String },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CrumbError {
    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid signature error
    pub fn signature_invalid<S: Into<String>>(message: S) -> Self {
        Self::SignatureInvalid {
            message: message.into(),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            CrumbError::SessionNotFound { context, .. } => Some(context),
            CrumbError::HandlerUnavailable { context, .. } => Some(context),
            CrumbError::Config { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Signature failures are downgraded to "no valid session" at the cookie boundary
    pub fn is_signature_failure(&self) -> bool {
        matches!(
            self,
            CrumbError::SignatureInvalid { .. } | CrumbError::SignatureExpired { .. }
        )
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            CrumbError::HandlerUnavailable { .. } => true,
            CrumbError::Io(_) => true,
            CrumbError::SignatureInvalid { .. } | CrumbError::SignatureExpired { .. } => true,
            CrumbError::SessionNotFound { .. } => false,
            CrumbError::Config { .. } => false,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            CrumbError::SignatureInvalid { .. } | CrumbError::SignatureExpired { .. } => {
                debug!(error = %self, "Rejected session signature");
            }
            CrumbError::HandlerUnavailable { .. } | CrumbError::Io(_) => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Session storage error (may be recoverable)"
                );
            }
            CrumbError::Config { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration error"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! handler_error {
    ($msg:expr, $component:expr) => {
        $crate::CrumbError::HandlerUnavailable {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::CrumbError::HandlerUnavailable {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the session store is reachable and writable"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::CrumbError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'crumb config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($session_id:expr, $component:expr) => {
        $crate::CrumbError::SessionNotFound {
            session_id: $session_id.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("The session may have expired or been evicted"),
        }
    };
}
