//! Client configuration

use crate::error::{ErrorContext, SourcingError, SourcingResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding `backend.base_url`
pub const BASE_URL_ENV: &str = "SOURCING_API_BASE_URL";

const MAX_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub endpoints: EndpointConfig,
    pub storage: StorageConfig,
}

/// Where the backend lives and how to talk to it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Client-side request timeout
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: HashMap<String, String>,
}

/// Paths of the authentication endpoints, relative to `backend.base_url`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub login: String,
    pub refresh: String,
    /// Federated login; `{provider}` is substituted with the provider name
    pub federated: String,
    pub whoami: String,
    /// Account creation
    pub register: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Session file; defaults to `<data_dir>/sourcing/session.json`
    pub session_file: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            endpoints: EndpointConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 30,
            user_agent: format!("sourcing-client/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            login: "/auth/jwt/login/".to_string(),
            refresh: "/auth/jwt/refresh/".to_string(),
            federated: "/auth/{provider}/".to_string(),
            whoami: "/auth/users/me/".to_string(),
            register: "/auth/users/".to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn federated_path(&self, provider: &str) -> String {
        self.federated.replace("{provider}", provider)
    }
}

impl BackendConfig {
    /// Join an endpoint path onto the base URL
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl ClientConfig {
    /// Configuration pointed at a specific backend, defaults elsewhere
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.backend.base_url = base_url.into();
        config
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SourcingResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SourcingError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        toml::from_str(&content).map_err(|e| SourcingError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SourcingResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SourcingError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| SourcingError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                debug!(base_url = %base_url, "Using backend URL from environment");
                self.backend.base_url = base_url;
            }
        }
    }

    /// Session file location, falling back to the platform data directory
    pub fn session_file(&self) -> Option<PathBuf> {
        self.storage
            .session_file
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| default_data_dir().map(|dir| dir.join("session.json")))
    }

    /// Validate configuration
    pub fn validate(&self) -> SourcingResult<()> {
        let base_url = self.backend.base_url.trim();
        if base_url.is_empty() {
            return Err(SourcingError::Config {
                message: "backend.base_url must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set backend.base_url or SOURCING_API_BASE_URL"),
            });
        }

        match url::Url::parse(base_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(SourcingError::Config {
                    message: format!("Unsupported URL scheme: {}", parsed.scheme()),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion("Use an http:// or https:// backend URL"),
                });
            }
            Err(e) => {
                return Err(SourcingError::Config {
                    message: format!("Invalid backend.base_url '{}': {}", base_url, e),
                    source: Some(Box::new(e)),
                    context: ErrorContext::new("config").with_operation("validate"),
                });
            }
        }

        if self.backend.timeout_seconds == 0 || self.backend.timeout_seconds > MAX_TIMEOUT_SECONDS
        {
            return Err(SourcingError::Config {
                message: format!(
                    "backend.timeout_seconds must be between 1 and {}",
                    MAX_TIMEOUT_SECONDS
                ),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("A value between 15 and 30 seconds works well"),
            });
        }

        let endpoints = [
            ("endpoints.login", &self.endpoints.login),
            ("endpoints.refresh", &self.endpoints.refresh),
            ("endpoints.federated", &self.endpoints.federated),
            ("endpoints.whoami", &self.endpoints.whoami),
            ("endpoints.register", &self.endpoints.register),
        ];
        for (field, path) in endpoints {
            if !path.starts_with('/') {
                return Err(crate::validation_error!(
                    format!("Endpoint path '{}' must start with '/'", path),
                    field,
                    "config"
                ));
            }
        }

        Ok(())
    }
}

/// Per-user data directory of the client
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".local").join("share")))
        .map(|d| d.join("sourcing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoints.refresh, "/auth/jwt/refresh/");
        assert_eq!(config.endpoints.federated_path("google"), "/auth/google/");
        assert_eq!(config.endpoints.register, "/auth/users/");
    }

    #[test]
    fn test_url_joining() {
        let config = ClientConfig::for_base_url("https://api.example.com/");
        assert_eq!(
            config.backend.url_for("/quotes/my/"),
            "https://api.example.com/quotes/my/"
        );
        assert_eq!(
            config.backend.url_for("quotes/my/"),
            "https://api.example.com/quotes/my/"
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ClientConfig::for_base_url("");
        assert!(config.validate().is_err());

        config.backend.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.backend.base_url = "https://example.com".to_string();
        config.backend.timeout_seconds = 0;
        assert!(config.validate().is_err());

        config.backend.timeout_seconds = 20;
        config.endpoints.login = "auth/jwt/login/".to_string();
        match config.validate() {
            Err(SourcingError::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("endpoints.login"));
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_toml_round_trip_with_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sourcing.toml");
        std::fs::write(
            &path,
            "[backend]\nbase_url = \"https://backend.test\"\ntimeout_seconds = 15\n",
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.backend.base_url, "https://backend.test");
        assert_eq!(config.backend.timeout_seconds, 15);
        assert_eq!(config.endpoints.whoami, "/auth/users/me/");

        let saved = dir.path().join("saved.toml");
        config.save_to_file(&saved).unwrap();
        let reloaded = ClientConfig::from_file(&saved).unwrap();
        assert_eq!(reloaded.backend.base_url, config.backend.base_url);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = ClientConfig::from_file("/nonexistent/sourcing.toml");
        assert!(matches!(result, Err(SourcingError::Config { .. })));
    }
}
