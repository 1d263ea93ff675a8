//! Integration tests for sourcing-core infrastructure

use sourcing_core::{
    config_error, init_logging, storage_error, validation_error, AuthError, ClientConfig,
    ErrorContext, LogFormat, LoggingConfig, SourcingError,
};

#[test]
fn test_error_handling() {
    let error = config_error!("Test config error", "test_component");

    match &error {
        SourcingError::Config {
            message, context, ..
        } => {
            assert_eq!(message, "Test config error");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
            assert_eq!(context.recovery_suggestions.len(), 2);
        }
        _ => panic!("Expected Config error"),
    }

    // Should not panic
    error.log();
    assert!(!error.is_recoverable());

    let network_error = SourcingError::Network {
        message: "Connection failed".to_string(),
        source: None,
        context: ErrorContext::new("test").with_metadata("url", "http://127.0.0.1:9"),
    };
    assert!(network_error.is_recoverable());
    assert_eq!(
        network_error.context().unwrap().metadata.get("url").map(String::as_str),
        Some("http://127.0.0.1:9")
    );
}

#[test]
fn test_terminal_auth_errors_route_to_login() {
    let terminal: Vec<SourcingError> = vec![
        AuthError::NotAuthenticated.into(),
        AuthError::SessionExpired.into(),
        AuthError::RefreshFailed {
            reason: "Token is invalid or expired".to_string(),
        }
        .into(),
    ];
    for error in &terminal {
        assert!(error.requires_login(), "{} should require login", error);
        assert!(!error.is_recoverable());
    }

    let local: SourcingError = AuthError::InvalidCredentials {
        detail: "No active account found with the given credentials".to_string(),
    }
    .into();
    assert!(!local.requires_login());
    assert!(local.is_recoverable());
}

#[test]
fn test_error_macros() {
    let validation_err = validation_error!("Invalid field value", "email", "validator");
    match validation_err {
        SourcingError::Validation {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Invalid field value");
            assert_eq!(field, Some("email".to_string()));
            assert_eq!(context.component, "validator");
            assert!(!context.recovery_suggestions.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }

    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let storage_err = storage_error!("Failed to write session", "file_store", io);
    match storage_err {
        SourcingError::Storage { source, .. } => assert!(source.is_some()),
        _ => panic!("Expected Storage error"),
    }
}

#[test]
fn test_logging_initialization_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("client.log");

    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Json,
        include_location: false,
        include_thread: false,
        log_file_path: Some(log_path.to_string_lossy().to_string()),
        log_span_timings: false,
        filter_directives: vec!["sourcing_core=debug".to_string()],
    };

    assert!(init_logging(&config).is_ok());
    assert!(log_path.exists());

    // A global subscriber can only be installed once per process
    assert!(init_logging(&config).is_err());
}

#[test]
fn test_config_file_with_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sourcing.toml");

    let mut config = ClientConfig::for_base_url("https://staging.example.com");
    config.storage.session_file = Some(dir.path().join("session.json").display().to_string());
    config.save_to_file(&path).unwrap();

    let loaded = ClientConfig::from_file(&path).unwrap();
    assert_eq!(loaded.backend.base_url, "https://staging.example.com");
    assert_eq!(loaded.session_file(), Some(dir.path().join("session.json")));
    assert!(loaded.validate().is_ok());
}
