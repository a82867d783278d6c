//! Crumb Sessions - server-side sessions behind signed, expiring cookies
//!
//! The moving parts:
//!
//! - [`Session`]: per-request key/value data, loaded on first access, with
//!   change tracking that decides whether [`Session::persist`] stores, touches
//!   or skips
//! - [`SessionHandler`]: the storage collaborator; [`MemoryHandler`] and
//!   [`FileHandler`] are provided
//! - [`CookieSessionManager`]: turns a `Cookie` header into a session and a
//!   session back into a `Set-Cookie` value, signing ids with a
//!   [`TimestampSigner`]
//!
//! ## Example
//!
//! ```
//! use crumb_session::{CookieSessionManager, MemoryHandler};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> crumb_core::CrumbResult<()> {
//! let manager = CookieSessionManager::new("s3cr3t", Arc::new(MemoryHandler::new(3600)), "sid");
//!
//! let mut session = manager.build_session(None);
//! session.insert("user", "alice").await?;
//! let set_cookie = manager.finalize(&mut session, "/", "localhost").await?;
//! assert!(set_cookie.starts_with("sid="));
//! # Ok(())
//! # }
//! ```

pub mod handler;
pub mod manager;
pub mod session;
pub mod signer;
pub mod storage;

pub use handler::SessionHandler;
pub use manager::{CookieSessionManager, SessionFactory};
pub use session::{PersistAction, Session};
pub use signer::{SignedIdentity, TimestampSigner};
pub use storage::{FileHandler, MemoryHandler, StorageStats};

/// Session payload: string keys to JSON values
pub type SessionData = serde_json::Map<String, serde_json::Value>;
