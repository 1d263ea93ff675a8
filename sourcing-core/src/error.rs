//! Unified error handling system
//!
//! Provides the authentication error taxonomy and the workspace-wide error type
//! with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type SourcingResult<T> = Result<T, SourcingError>;

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

/// Outcomes of the session lifecycle that callers must react to.
///
/// `InvalidCredentials` and `NetworkFailure` can be handled locally by
/// re-prompting. The remaining variants are terminal for the current session
/// and must reach the application shell, which sends the user to a login screen.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials: {detail}")]
    InvalidCredentials { detail: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("Token refresh failed: {reason}")]
    RefreshFailed { reason: String },

    #[error("Network failure: {message}")]
    NetworkFailure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AuthError {
    pub fn network<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AuthError::NetworkFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the user can recover without re-authenticating
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials { .. } | AuthError::NetworkFailure { .. }
        )
    }

    /// Whether the caller must route the user back to a login screen
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated | AuthError::SessionExpired | AuthError::RefreshFailed { .. }
        )
    }
}

/// Main error type for the sourcing client
#[derive(Error, Debug)]
pub enum SourcingError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SourcingError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            SourcingError::Config { context, .. } => Some(context),
            SourcingError::Storage { context, .. } => Some(context),
            SourcingError::Network { context, .. } => Some(context),
            SourcingError::Api { context, .. } => Some(context),
            SourcingError::Validation { context, .. } => Some(context),
            _ => None,
        }
    }

    /// The authentication outcome, when this error is one
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            SourcingError::Auth(auth) => Some(auth),
            _ => None,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SourcingError::Auth(auth) => auth.is_recoverable(),
            SourcingError::Network { .. } => true,
            SourcingError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the user has to log in again
    pub fn requires_login(&self) -> bool {
        self.auth_error().is_some_and(AuthError::requires_login)
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SourcingError::Auth(auth) if auth.requires_login() => {
                warn!(error = %self, "Session is no longer usable");
            }
            SourcingError::Auth(_) | SourcingError::Network { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Network or credential error (may be recoverable)"
                );
            }
            SourcingError::Config { .. } | SourcingError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
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
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::SourcingError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'sourcing config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::SourcingError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::SourcingError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check that the session file location is writable"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::SourcingError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
