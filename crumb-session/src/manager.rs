//! Cookie session manager - maps signed cookies to sessions and back
//!
//! Inbound, the manager reads its cookie from the `Cookie` header and verifies the
//! signed id against the handler's `delta`. Any verification failure means "no
//! valid session" and a fresh id is minted. Outbound, the id is re-signed with the
//! current time and serialized as a `Set-Cookie` value.

use crate::{Session, SessionHandler, SignedIdentity, TimestampSigner};
use chrono::{DateTime, Duration, Utc};
use cookie::Cookie;
use crumb_core::{config_error, CookieConfig, CrumbResult};
use std::fmt;
use std::sync::Arc;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;
use uuid::Uuid;

/// Builds the [`Session`] for a derived id: `(id, is_new, handler)`
pub type SessionFactory =
    Arc<dyn Fn(String, bool, Arc<dyn SessionHandler>) -> Session + Send + Sync>;

/// `expires_at` as a cookie date, saturating at the representable range
fn cookie_expiry(expires_at: DateTime<Utc>) -> OffsetDateTime {
    let timestamp = expires_at.timestamp();
    OffsetDateTime::from_unix_timestamp(timestamp).unwrap_or_else(|_| {
        if timestamp > 0 {
            PrimitiveDateTime::MAX.assume_utc()
        } else {
            PrimitiveDateTime::MIN.assume_utc()
        }
    })
}

fn default_session(id: String, is_new: bool, handler: Arc<dyn SessionHandler>) -> Session {
    Session::new(id, is_new, handler)
}

/// Signed-cookie session manager
pub struct CookieSessionManager {
    handler: Arc<dyn SessionHandler>,
    /// Lifespan in seconds, taken from the handler
    delta: u64,
    cookie_name: String,
    signer: TimestampSigner,
    cookie_path: Option<String>,
    cookie_domain: Option<String>,
    http_only: bool,
    secure: bool,
    session_factory: SessionFactory,
}

impl CookieSessionManager {
    pub fn new(
        secret: impl AsRef<[u8]>,
        handler: Arc<dyn SessionHandler>,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            delta: handler.delta(),
            handler,
            cookie_name: cookie_name.into(),
            signer: TimestampSigner::new(secret),
            cookie_path: None,
            cookie_domain: None,
            http_only: false,
            secure: false,
            session_factory: Arc::new(default_session),
        }
    }

    /// Create a manager from the `[cookie]` configuration section
    pub fn from_config(
        config: &CookieConfig,
        handler: Arc<dyn SessionHandler>,
    ) -> CrumbResult<Self> {
        if config.secret.is_empty() {
            return Err(config_error!(
                "Cookie signing secret must not be empty",
                "session_manager"
            ));
        }

        let mut manager = Self::new(&config.secret, handler, config.name.clone())
            .with_http_only(config.http_only)
            .with_secure(config.secure);
        manager.cookie_path = config.path.clone();
        manager.cookie_domain = config.domain.clone();
        Ok(manager)
    }

    /// Replace how sessions are constructed
    pub fn with_session_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(String, bool, Arc<dyn SessionHandler>) -> Session + Send + Sync + 'static,
    {
        self.session_factory = Arc::new(factory);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }

    pub fn delta(&self) -> u64 {
        self.delta
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Configured cookie path, if any
    pub fn cookie_path(&self) -> Option<&str> {
        self.cookie_path.as_deref()
    }

    /// Configured cookie domain, if any
    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    /// Fresh random session id (UUID v4, hex form)
    pub fn generate_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Sign `session_id` with the current time
    pub fn refresh_id(&self, session_id: &str) -> SignedIdentity {
        SignedIdentity {
            raw_id: session_id.to_string(),
            signed_id: self.signer.sign(session_id),
            max_age_secs: self.delta,
        }
    }

    /// Verify a signed id and return the raw id
    pub fn verify_id(&self, signed_id: &str) -> CrumbResult<String> {
        self.signer.unsign(signed_id, Some(self.delta))
    }

    /// Derive `(is_new, session_id)` from a raw `Cookie` header.
    ///
    /// A missing cookie or a signature that is invalid or expired yields a new id.
    pub fn derive_id(&self, cookie_header: Option<&str>) -> (bool, String) {
        if let Some(header) = cookie_header {
            let candidates = Cookie::split_parse(header)
                .filter_map(Result::ok)
                .filter(|cookie| cookie.name() == self.cookie_name);

            for cookie in candidates {
                match self.verify_id(cookie.value()) {
                    Ok(session_id) => return (false, session_id),
                    Err(e) => e.log(),
                }
            }
        }

        let session_id = self.generate_id();
        debug!(session_id = %session_id, "Issuing new session id");
        (true, session_id)
    }

    /// Build the session for an incoming request. Nothing is loaded yet.
    pub fn build_session(&self, cookie_header: Option<&str>) -> Session {
        let (is_new, session_id) = self.derive_id(cookie_header);
        (self.session_factory)(session_id, is_new, Arc::clone(&self.handler))
    }

    /// Serialize the session cookie for `session_id`.
    ///
    /// The signature covers the id and the current time; `expires_at` only sets
    /// the cookie's `Expires` attribute and is clamped to the dates a cookie can
    /// carry. An empty `domain` omits the attribute.
    pub fn render_cookie(
        &self,
        session_id: &str,
        expires_at: DateTime<Utc>,
        path: &str,
        domain: &str,
    ) -> String {
        let signed = self.refresh_id(session_id);

        let mut builder = Cookie::build((self.cookie_name.clone(), signed.signed_id))
            .path(path.to_string())
            .expires(cookie_expiry(expires_at))
            .http_only(self.http_only)
            .secure(self.secure);
        if !domain.is_empty() {
            builder = builder.domain(domain.to_string());
        }

        builder.build().to_string()
    }

    /// Cookie telling the client to discard the session cookie
    pub fn render_removal_cookie(&self, path: &str, domain: &str) -> String {
        let mut builder = Cookie::build((self.cookie_name.clone(), ""))
            .path(path.to_string())
            .http_only(self.http_only)
            .secure(self.secure);
        if !domain.is_empty() {
            builder = builder.domain(domain.to_string());
        }

        let mut cookie = builder.build();
        cookie.make_removal();
        cookie.to_string()
    }

    /// Response-completion hook: persist the session, then render its cookie
    /// expiring `delta` seconds from now.
    pub async fn finalize(
        &self,
        session: &mut Session,
        path: &str,
        domain: &str,
    ) -> CrumbResult<String> {
        let action = session.persist(false).await?;
        debug!(session_id = %session.id(), ?action, "Finalized session");
        Ok(self.render_cookie(session.id(), self.expires_at(), path, domain))
    }

    /// Cookie expiry for a cookie issued now
    pub fn expires_at(&self) -> DateTime<Utc> {
        let lifetime = i64::try_from(self.delta)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Utc::now()
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl fmt::Debug for CookieSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSessionManager")
            .field("cookie_name", &self.cookie_name)
            .field("delta", &self.delta)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_domain", &self.cookie_domain)
            .finish_non_exhaustive()
    }
}
