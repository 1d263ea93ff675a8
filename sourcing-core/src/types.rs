//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair as persisted in client-side storage
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Informational expiry taken from the access token's `exp` claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

// Tokens are credentials; keep them out of debug output and logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Marketplace roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Supplier,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Supplier => "supplier",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" | "customer" => Ok(Role::Buyer),
            "supplier" => Ok(Role::Supplier),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated identity behind a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: Option<String>,
    pub role: Role,
}

/// What the login endpoints accept
#[derive(Clone)]
pub enum Credentials {
    Password { email: String, password: String },
    /// Assertion issued by an external identity provider, e.g. a Google ID token
    Federated { provider: String, assertion: String },
}

impl Credentials {
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn federated(provider: impl Into<String>, assertion: impl Into<String>) -> Self {
        Credentials::Federated {
            provider: provider.into(),
            assertion: assertion.into(),
        }
    }

    /// Identifier that is safe to log
    pub fn label(&self) -> String {
        match self {
            Credentials::Password { email, .. } => email.clone(),
            Credentials::Federated { provider, .. } => format!("{} assertion", provider),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Federated { provider, .. } => f
                .debug_struct("Federated")
                .field("provider", provider)
                .field("assertion", &"<redacted>")
                .finish(),
        }
    }
}

/// Sign-up form for a new buyer account
#[derive(Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub re_password: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
}

impl Registration {
    /// Username defaults to the local part of the email address
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        let email = email.into();
        let password = password.into();
        let username = email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .unwrap_or(email.as_str())
            .to_string();

        Self {
            re_password: password.clone(),
            email,
            username,
            password,
            first_name: String::new(),
            last_name: String::new(),
            company: String::new(),
        }
    }

    /// Split a full name into first and last name
    pub fn with_name(mut self, full_name: &str) -> Self {
        let mut parts = full_name.split_whitespace();
        self.first_name = parts.next().unwrap_or_default().to_string();
        self.last_name = parts.collect::<Vec<_>>().join(" ");
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    /// Credentials to log in with once the account exists
    pub fn credentials(&self) -> Credentials {
        Credentials::password(self.email.clone(), self.password.clone())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("company", &self.company)
            .finish()
    }
}

/// Lifecycle of a session as seen by the client
///
/// `Expired` is only ever inferred from a 401 response and `Refreshing` is only
/// entered while a request is being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Expired,
    Refreshing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated => "authenticated",
            SessionState::Expired => "expired",
            SessionState::Refreshing => "refreshing",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_storage_keys() {
        let session = Session::new("A1", Some("R1".to_string()));
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["accessToken"], "A1");
        assert_eq!(json["refreshToken"], "R1");
        assert!(json.get("expiresAt").is_none());

        let restored: Session = serde_json::from_value(json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = Session::new("secret-access", Some("secret-refresh".to_string()));
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));

        let creds = Credentials::password("a@b.com", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("a@b.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_empty_refresh_token_is_absent() {
        assert!(!Session::new("A", Some(String::new())).has_refresh_token());
        assert!(!Session::new("A", None).has_refresh_token());
        assert!(Session::new("A", Some("R".to_string())).has_refresh_token());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Supplier".parse::<Role>(), Ok(Role::Supplier));
        assert_eq!("customer".parse::<Role>(), Ok(Role::Buyer));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_registration_defaults() {
        let registration = Registration::new("jane.doe@acme.test", "s3cret")
            .with_name("Jane van Doe")
            .with_company("Acme");

        assert_eq!(registration.username, "jane.doe");
        assert_eq!(registration.re_password, "s3cret");
        assert_eq!(registration.first_name, "Jane");
        assert_eq!(registration.last_name, "van Doe");
        assert!(!format!("{:?}", registration).contains("s3cret"));

        let body = serde_json::to_value(&registration).unwrap();
        assert_eq!(body["company"], "Acme");
        assert_eq!(Registration::new("@odd", "x").username, "@odd");
    }
}
