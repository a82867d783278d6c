//! Integration tests for crumb-core infrastructure

use crumb_core::{
    config_error, handler_error, init_logging, not_found_error, CrumbConfig, CrumbError,
    LogFormat, LoggingConfig, StorageBackend,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_error_handling() {
    let error = handler_error!("Connection refused", "redis_handler");

    match &error {
        CrumbError::HandlerUnavailable {
            message, context, ..
        } => {
            assert_eq!(message, "Connection refused");
            assert_eq!(context.component, "redis_handler");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected HandlerUnavailable error"),
    }

    // Should not panic without a subscriber
    error.log();
    assert!(error.is_recoverable());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert!(!config_error.is_signature_failure());

    let missing = not_found_error!("abc123", "test");
    assert!(missing.context().is_some());
}

#[test]
fn test_config_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("crumb.toml");

    let mut config = CrumbConfig::default();
    config.cookie.secret = "s3cr3t".to_string();
    config.cookie.path = Some("/app".to_string());
    config.storage.backend = StorageBackend::File;
    config.storage.data_dir = Some(dir.path().join("sessions"));
    config.storage.delta = 120;
    config.logging.format = LogFormat::Json;

    config.save_to_file(&path).unwrap();
    let loaded = CrumbConfig::from_file(&path).unwrap();

    assert_eq!(loaded.cookie.secret, "s3cr3t");
    assert_eq!(loaded.cookie.path.as_deref(), Some("/app"));
    assert_eq!(loaded.storage.backend, StorageBackend::File);
    assert_eq!(loaded.storage.delta, 120);
    assert_eq!(loaded.logging.format, LogFormat::Json);
    assert!(loaded.validate().is_ok());
}

#[test]
fn test_missing_config_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let result = CrumbConfig::from_file(dir.path().join("absent.toml"));

    match result {
        Err(CrumbError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("read_file"));
        }
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_logging_requires_file_path() {
    let config = LoggingConfig {
        log_to_file: true,
        log_file_path: None,
        ..LoggingConfig::default()
    };

    assert!(init_logging(&config).is_err());
}
