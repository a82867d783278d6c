//! Crumb Core - Shared infrastructure for signed-cookie sessions
//!
//! This crate holds the error type, configuration model and logging setup used by
//! the session, web and CLI crates.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
