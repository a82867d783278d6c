//! Configuration management

use crate::error::{CrumbError, CrumbResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default lifetime of a session, in seconds
pub const DEFAULT_SESSION_DELTA: u64 = 3600;

/// Longest accepted session lifetime: 100 years, in seconds
pub const MAX_SESSION_DELTA: u64 = 100 * 365 * 24 * 3600;

/// Default name of the cookie carrying the signed session id
pub const DEFAULT_COOKIE_NAME: &str = "sid";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrumbConfig {
    pub cookie: CookieConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Cookie and signing settings used by the session manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Signing secret
    pub secret: String,
    /// Name of the session cookie
    pub name: String,
    /// Cookie path; the web layer falls back to `/`
    pub path: Option<String>,
    /// Cookie domain; the web layer falls back to the request host
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: None,
            domain: None,
            http_only: false,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

/// Session storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for the file backend
    pub data_dir: Option<PathBuf>,
    /// Session lifetime in seconds
    pub delta: u64,
    /// How often the web server flushes expired sessions, in seconds
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            data_dir: dirs::data_dir().map(|d| d.join("crumb").join("sessions")),
            delta: DEFAULT_SESSION_DELTA,
            flush_interval_secs: 300,
        }
    }
}

impl CrumbConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CrumbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CrumbError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: CrumbConfig = toml::from_str(&content).map_err(|e| CrumbError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> CrumbResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| CrumbError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| CrumbError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Override values from `CRUMB_SECRET`, `CRUMB_COOKIE_NAME` and `CRUMB_SESSION_DELTA`
    pub fn apply_env_overrides(&mut self) -> CrumbResult<()> {
        if let Ok(secret) = std::env::var("CRUMB_SECRET") {
            self.cookie.secret = secret;
        }
        if let Ok(name) = std::env::var("CRUMB_COOKIE_NAME") {
            self.cookie.name = name;
        }
        if let Ok(delta) = std::env::var("CRUMB_SESSION_DELTA") {
            self.storage.delta = delta.parse().map_err(|e| CrumbError::Config {
                message: format!("CRUMB_SESSION_DELTA is not a number: {}", delta),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config").with_operation("env_overrides"),
            })?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> CrumbResult<()> {
        if self.cookie.secret.is_empty() {
            return Err(CrumbError::Config {
                message: "Cookie signing secret must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set cookie.secret or the CRUMB_SECRET environment variable"),
            });
        }

        if !is_cookie_token(&self.cookie.name) {
            return Err(CrumbError::Config {
                message: format!("Invalid cookie name: {:?}", self.cookie.name),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use letters, digits and '-', '_', '.' only"),
            });
        }

        if self.storage.delta == 0 {
            return Err(CrumbError::Config {
                message: "Session delta must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set storage.delta to a positive number of seconds"),
            });
        }

        if self.storage.delta > MAX_SESSION_DELTA {
            return Err(CrumbError::Config {
                message: format!(
                    "Session delta of {}s exceeds the maximum of {}s",
                    self.storage.delta, MAX_SESSION_DELTA
                ),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Cookie expiry must stay a representable date"),
            });
        }

        if self.storage.backend == StorageBackend::File && self.storage.data_dir.is_none() {
            return Err(CrumbError::Config {
                message: "File storage requires storage.data_dir".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set storage.data_dir to a writable directory"),
            });
        }

        Ok(())
    }
}

/// Candidate locations for the configuration file, in lookup order
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|d| d.join("crumb").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".crumb").join("config.toml")),
        Some(PathBuf::from("crumb.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// RFC 6265 cookie-name token check
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> CrumbConfig {
        let mut config = CrumbConfig::default();
        config.cookie.secret = "s3cr3t".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = CrumbConfig::default();
        assert_eq!(config.cookie.name, "sid");
        assert_eq!(config.storage.delta, 3600);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let config = CrumbConfig::default();
        assert!(matches!(config.validate(), Err(CrumbError::Config { .. })));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_cookie_name() {
        let mut config = valid_config();
        config.cookie.name = "my session".to_string();
        assert!(config.validate().is_err());

        config.cookie.name = "sid=x".to_string();
        assert!(config.validate().is_err());

        config.cookie.name = "app_sid".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_delta() {
        let mut config = valid_config();
        config.storage.delta = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_delta() {
        let mut config = valid_config();
        config.storage.delta = MAX_SESSION_DELTA;
        assert!(config.validate().is_ok());

        config.storage.delta = MAX_SESSION_DELTA + 1;
        assert!(config.validate().is_err());

        config.storage.delta = 1_000_000_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_backend_needs_directory() {
        let mut config = valid_config();
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: CrumbConfig = toml::from_str(
            r#"
            [cookie]
            secret = "abc"
            domain = "example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.cookie.secret, "abc");
        assert_eq!(config.cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(config.cookie.name, "sid");
        assert_eq!(config.storage.delta, 3600);
    }
}
