//! Timestamp signer for session ids
//!
//! Signed values look like `<value>.<timestamp>.<signature>`:
//!
//! - `timestamp` is the issue time in Unix seconds, big-endian with leading zero
//!   bytes stripped, base64url without padding
//! - `signature` is HMAC-SHA256 over `<value>.<timestamp>`, base64url without padding
//!
//! The HMAC key is `SHA-256(salt || "signer" || secret)`, so one secret can back
//! several signers that never accept each other's values.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use crumb_core::{CrumbError, CrumbResult};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Salt used by [`TimestampSigner::new`]
pub const DEFAULT_SALT: &str = "crumb.session";

const SEPARATOR: char = '.';

/// A session id together with its signed cookie form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIdentity {
    pub raw_id: String,
    pub signed_id: String,
    /// The signed form is only trusted this many seconds after issuance
    pub max_age_secs: u64,
}

/// Signs values together with the time they were signed
#[derive(Clone)]
pub struct TimestampSigner {
    key: Vec<u8>,
}

impl TimestampSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_salt(secret, DEFAULT_SALT)
    }

    pub fn with_salt(secret: impl AsRef<[u8]>, salt: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"signer");
        hasher.update(secret.as_ref());
        Self {
            key: hasher.finalize().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size")
    }

    /// Sign `value` with the current time
    pub fn sign(&self, value: &str) -> String {
        self.sign_at(value, Utc::now().timestamp())
    }

    /// Sign `value` as if issued at `timestamp` (Unix seconds)
    pub fn sign_at(&self, value: &str, timestamp: i64) -> String {
        let payload = format!("{}{}{}", value, SEPARATOR, encode_timestamp(timestamp));
        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}{}{}", payload, SEPARATOR, signature)
    }

    /// Verify `signed` and return the original value.
    ///
    /// With `max_age` set, values older than `max_age` seconds (or dated in the
    /// future) fail with `SignatureExpired`.
    pub fn unsign(&self, signed: &str, max_age: Option<u64>) -> CrumbResult<String> {
        self.unsign_at(signed, max_age, Utc::now().timestamp())
    }

    /// [`unsign`](Self::unsign) evaluated at `now` (Unix seconds)
    pub fn unsign_at(&self, signed: &str, max_age: Option<u64>, now: i64) -> CrumbResult<String> {
        let (payload, signature) = signed
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| CrumbError::signature_invalid("no separator found"))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| CrumbError::signature_invalid("malformed signature"))?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| CrumbError::signature_invalid("signature does not match"))?;

        let (value, timestamp) = payload
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| CrumbError::signature_invalid("timestamp missing"))?;
        let timestamp = decode_timestamp(timestamp)?;

        if let Some(max_age) = max_age {
            let age_secs = now.saturating_sub(timestamp);
            let too_old = u64::try_from(age_secs).map_or(true, |age| age > max_age);
            if too_old {
                return Err(CrumbError::SignatureExpired {
                    age_secs,
                    max_age_secs: max_age,
                });
            }
        }

        Ok(value.to_string())
    }

    /// Cheap structural and cryptographic check without an age limit
    pub fn validate(&self, signed: &str) -> bool {
        self.unsign(signed, None).is_ok()
    }
}

impl fmt::Debug for TimestampSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampSigner").finish_non_exhaustive()
    }
}

fn encode_timestamp(timestamp: i64) -> String {
    let bytes = u64::try_from(timestamp).unwrap_or(0).to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    URL_SAFE_NO_PAD.encode(&bytes[first..])
}

fn decode_timestamp(encoded: &str) -> CrumbResult<i64> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| CrumbError::signature_invalid("malformed timestamp"))?;
    if bytes.len() > 8 {
        return Err(CrumbError::signature_invalid("malformed timestamp"));
    }

    let mut buf = [0u8; 8];
    buf[8 - bytes.len()..].copy_from_slice(&bytes);
    i64::try_from(u64::from_be_bytes(buf))
        .map_err(|_| CrumbError::signature_invalid("malformed timestamp"))
}
