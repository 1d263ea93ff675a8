//! Session Manager
//!
//! The single entry point for authenticated traffic to the marketplace
//! backend. It acquires token pairs, persists them, attaches the access token
//! to outgoing requests, and recovers from a 401 with at most one
//! refresh-and-retry per request.

use crate::http::{authorization_value, create_http_client, ensure_success, response_detail};
use crate::principal::{expiry_from_token, principal_from_profile, principal_from_token};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sourcing_core::{
    log_operation_error, log_operation_start, log_operation_success, AuthError, ClientConfig,
    Credentials, ErrorContext, Principal, Registration, Session, SessionState, SourcingError,
    SourcingResult, TokenStore,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// One call against the backend
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Fail fast with `NotAuthenticated` when no access token is stored
    pub require_auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            require_auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Send without requiring a session; a stored token is still attached
    pub fn anonymous(mut self) -> Self {
        self.require_auth = false;
        self
    }
}

/// Token payload of the login and refresh endpoints
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default, alias = "access_token")]
    access: Option<String>,
    #[serde(default, alias = "refresh_token")]
    refresh: Option<String>,
}

impl TokenResponse {
    fn access(&self) -> Option<&str> {
        self.access.as_deref().filter(|t| !t.is_empty())
    }

    fn refresh(&self) -> Option<String> {
        self.refresh.clone().filter(|t| !t.is_empty())
    }
}

#[derive(Debug)]
struct Shared {
    /// Bumped by every persist and clear; a refresh keeps it
    epoch: u64,
    state: SessionState,
    principal: Option<Principal>,
}

/// Shared, cloneable-by-`Arc` client for the marketplace backend
pub struct SessionManager {
    client: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    /// Single-flight guard: concurrent 401s share one refresh exchange
    refresh_lock: tokio::sync::Mutex<()>,
    /// Guards every storage write so epoch checks and writes are atomic
    shared: Mutex<Shared>,
}

impl SessionManager {
    /// Create a manager with its own HTTP client
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> SourcingResult<Self> {
        let client = create_http_client(&config.backend)?;
        Ok(Self::with_client(config, store, client))
    }

    /// Create a manager around an existing HTTP client
    pub fn with_client(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        client: reqwest::Client,
    ) -> Self {
        let state = match store.load() {
            Ok(Some(_)) => SessionState::Authenticated,
            _ => SessionState::Unauthenticated,
        };

        Self {
            client,
            config,
            store,
            refresh_lock: tokio::sync::Mutex::new(()),
            shared: Mutex::new(Shared {
                epoch: 0,
                state,
                principal: None,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Epoch and stored session, read together
    fn snapshot(&self) -> SourcingResult<(u64, Option<Session>)> {
        let shared = self.shared();
        let session = self.store.load()?;
        Ok((shared.epoch, session))
    }

    fn set_state_if_current(&self, epoch: u64, state: SessionState) {
        let mut shared = self.shared();
        if shared.epoch == epoch {
            shared.state = state;
        }
    }

    /// An accepted token means a session left `Expired` is usable again
    fn settle_expired(&self, epoch: u64) {
        let mut shared = self.shared();
        if shared.epoch == epoch && shared.state == SessionState::Expired {
            shared.state = SessionState::Authenticated;
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        let shared = self.shared();
        match shared.state {
            SessionState::Expired | SessionState::Refreshing => shared.state,
            // Storage may have been cleared behind our back
            _ => match self.store.load() {
                Ok(Some(_)) => SessionState::Authenticated,
                _ => SessionState::Unauthenticated,
            },
        }
    }

    /// Stored session, if any
    pub fn session(&self) -> SourcingResult<Option<Session>> {
        self.store.load()
    }

    /// Exchange credentials for a token pair. Does not persist.
    pub async fn acquire(&self, credentials: &Credentials) -> SourcingResult<Session> {
        let (path, body) = match credentials {
            Credentials::Password { email, password } => (
                self.config.endpoints.login.clone(),
                json!({ "email": email, "password": password }),
            ),
            Credentials::Federated {
                provider,
                assertion,
            } => (
                self.config.endpoints.federated_path(provider),
                json!({ "token": assertion }),
            ),
        };

        let account = credentials.label();
        log_operation_start!("acquire", account = %account);

        let url = self.config.backend.url_for(&path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                log_operation_error!("acquire", e, account = %account);
                AuthError::network(format!("Login request failed: {}", e), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response_detail(response).await;
            log_operation_error!("acquire", detail, account = %account, status = status.as_u16());

            return Err(match status {
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    AuthError::InvalidCredentials { detail }
                }
                _ => AuthError::NetworkFailure {
                    message: format!("Login failed with HTTP {}: {}", status.as_u16(), detail),
                    source: None,
                },
            }
            .into());
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::network(format!("Unreadable login response: {}", e), e))?;

        let access = tokens.access().ok_or_else(|| AuthError::NetworkFailure {
            message: "Login response did not contain an access token".to_string(),
            source: None,
        })?;

        log_operation_success!("acquire", account = %account);
        Ok(Session::new(access, tokens.refresh()).with_expiry(expiry_from_token(access)))
    }

    /// Write the session to storage, replacing whatever was there
    pub fn persist(&self, session: &Session) -> SourcingResult<()> {
        let mut shared = self.shared();
        self.store.save(session)?;
        shared.epoch += 1;
        shared.state = SessionState::Authenticated;
        shared.principal = None;
        debug!(epoch = shared.epoch, "Session persisted");
        Ok(())
    }

    /// Acquire and persist in one step
    pub async fn login(&self, credentials: &Credentials) -> SourcingResult<Session> {
        let session = self.acquire(credentials).await?;
        self.persist(&session)?;
        info!(account = %credentials.label(), "Logged in");
        Ok(session)
    }

    /// Create an account, then log in with it
    pub async fn register(&self, registration: &Registration) -> SourcingResult<Session> {
        log_operation_start!("register", account = %registration.email);

        let url = self.config.backend.url_for(&self.config.endpoints.register);
        let response = self
            .client
            .post(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| {
                log_operation_error!("register", e, account = %registration.email);
                AuthError::network(format!("Registration request failed: {}", e), e)
            })?;

        let status = response.status();
        if status.is_server_error() {
            let detail = response_detail(response).await;
            log_operation_error!("register", detail, status = status.as_u16());
            return Err(AuthError::NetworkFailure {
                message: format!("Registration failed with HTTP {}: {}", status.as_u16(), detail),
                source: None,
            }
            .into());
        }
        // Field errors such as a taken email come back as 400
        ensure_success(response, "register").await?;
        log_operation_success!("register", account = %registration.email);

        self.login(&registration.credentials()).await
    }

    /// Remove both tokens and the cached principal
    pub fn clear(&self) -> SourcingResult<()> {
        let mut shared = self.shared();
        Self::clear_locked(&mut shared, self.store.as_ref())
    }

    fn clear_locked(shared: &mut Shared, store: &dyn TokenStore) -> SourcingResult<()> {
        store.clear()?;
        shared.epoch += 1;
        shared.state = SessionState::Unauthenticated;
        shared.principal = None;
        Ok(())
    }

    /// Clear only if no newer session replaced the one we were working with
    fn clear_if_current(&self, epoch: u64) {
        let mut shared = self.shared();
        if shared.epoch != epoch {
            return;
        }
        if let Err(e) = Self::clear_locked(&mut shared, self.store.as_ref()) {
            warn!(error = %e, "Failed to clear session");
        }
    }

    pub fn logout(&self) -> SourcingResult<()> {
        self.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh(&self) -> SourcingResult<Session> {
        let _guard = self.refresh_lock.lock().await;
        let (epoch, session) = self.snapshot()?;
        let session = session.ok_or(AuthError::NotAuthenticated)?;
        self.refresh_locked(epoch, session).await
    }

    /// Refresh with `refresh_lock` held
    async fn refresh_locked(&self, epoch: u64, session: Session) -> SourcingResult<Session> {
        let Some(refresh_token) = session.refresh_token.clone().filter(|t| !t.is_empty()) else {
            return Err(AuthError::NotAuthenticated.into());
        };

        self.set_state_if_current(epoch, SessionState::Refreshing);
        log_operation_start!("refresh");

        let url = self.config.backend.url_for(&self.config.endpoints.refresh);
        let response = match self
            .client
            .post(&url)
            .json(&json!({ "refresh": refresh_token }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // The tokens are untouched, so the session is still usable
                self.set_state_if_current(epoch, SessionState::Authenticated);
                log_operation_error!("refresh", e);
                return Err(AuthError::network(format!("Refresh request failed: {}", e), e).into());
            }
        };

        let status = response.status();
        if status.is_server_error() {
            let detail = response_detail(response).await;
            self.set_state_if_current(epoch, SessionState::Authenticated);
            log_operation_error!("refresh", detail, status = status.as_u16());
            return Err(AuthError::NetworkFailure {
                message: format!("Refresh failed with HTTP {}: {}", status.as_u16(), detail),
                source: None,
            }
            .into());
        }

        let rejection = if status.is_success() {
            match response.json::<TokenResponse>().await {
                Ok(tokens) => match tokens.access() {
                    Some(access) => {
                        let refreshed = Session::new(
                            access,
                            tokens.refresh().or(Some(refresh_token)),
                        )
                        .with_expiry(expiry_from_token(access));
                        return self.commit_refresh(epoch, refreshed);
                    }
                    None => "Refresh response did not contain an access token".to_string(),
                },
                Err(e) => format!("Unreadable refresh response: {}", e),
            }
        } else {
            response_detail(response).await
        };

        log_operation_error!("refresh", rejection, status = status.as_u16());
        self.clear_if_current(epoch);
        Err(AuthError::RefreshFailed { reason: rejection }.into())
    }

    /// Store a refreshed session unless the session was replaced meanwhile
    fn commit_refresh(&self, epoch: u64, refreshed: Session) -> SourcingResult<Session> {
        let mut shared = self.shared();
        if shared.epoch != epoch {
            debug!("Discarding refresh result for a superseded session");
            return Err(AuthError::SessionExpired.into());
        }

        self.store.save(&refreshed)?;
        shared.state = SessionState::Authenticated;
        shared.principal = None;
        log_operation_success!("refresh");
        Ok(refreshed)
    }

    /// Send a request, attaching the access token and recovering from one 401
    pub async fn request(&self, request: ApiRequest) -> SourcingResult<reqwest::Response> {
        let (epoch, session) = self.snapshot()?;
        let access = session
            .map(|s| s.access_token)
            .filter(|t| !t.is_empty());

        let Some(access) = access else {
            if request.require_auth {
                debug!(path = %request.path, "No session for authenticated request");
                return Err(AuthError::NotAuthenticated.into());
            }
            return self.send(&request, None).await;
        };

        let response = self.send(&request, Some(&access)).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            self.settle_expired(epoch);
            return Ok(response);
        }

        debug!(method = %request.method, path = %request.path, "Access token rejected");
        self.set_state_if_current(epoch, SessionState::Expired);

        let fresh_access = self.recover_access(epoch, &access).await?;
        let retried = self.send(&request, Some(&fresh_access)).await?;

        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(path = %request.path, "Request rejected again after refresh");
            self.clear_if_current(epoch);
            return Err(AuthError::SessionExpired.into());
        }

        Ok(retried)
    }

    /// Obtain a usable access token after `rejected` drew a 401
    async fn recover_access(&self, epoch: u64, rejected: &str) -> SourcingResult<String> {
        let _guard = self.refresh_lock.lock().await;

        let (current_epoch, current) = self.snapshot()?;
        if current_epoch != epoch {
            debug!("Session changed while the request was in flight");
            return Err(AuthError::SessionExpired.into());
        }

        let Some(current) = current else {
            return Err(AuthError::SessionExpired.into());
        };

        if current.access_token != rejected {
            debug!("Access token already refreshed by a concurrent request");
            self.set_state_if_current(epoch, SessionState::Authenticated);
            return Ok(current.access_token);
        }

        if !current.has_refresh_token() {
            self.clear_if_current(epoch);
            return Err(AuthError::SessionExpired.into());
        }

        let refreshed = self.refresh_locked(epoch, current).await?;
        Ok(refreshed.access_token)
    }

    async fn send(
        &self,
        request: &ApiRequest,
        access_token: Option<&str>,
    ) -> SourcingResult<reqwest::Response> {
        let url = self.config.backend.url_for(&request.path);
        let mut builder = self.client.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access_token {
            builder = builder.header(AUTHORIZATION, authorization_value(token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("{} {} timed out", request.method, request.path)
            } else {
                format!("{} {} failed: {}", request.method, request.path, e)
            };
            AuthError::network(message, e).into()
        })
    }

    pub async fn get(&self, path: &str) -> SourcingResult<reqwest::Response> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> SourcingResult<reqwest::Response> {
        self.request(ApiRequest::post(path).json(body)).await
    }

    /// Principal of the current session: cached, decoded, or fetched
    pub async fn principal(&self) -> SourcingResult<Principal> {
        let (epoch, session) = {
            let shared = self.shared();
            if let Some(principal) = &shared.principal {
                return Ok(principal.clone());
            }
            (shared.epoch, self.store.load()?)
        };

        let session = session.ok_or(AuthError::NotAuthenticated)?;
        match principal_from_token(&session.access_token) {
            Some(principal) => {
                self.cache_principal(epoch, &principal);
                Ok(principal)
            }
            None => self.whoami().await,
        }
    }

    /// Ask the backend who the current session belongs to
    pub async fn whoami(&self) -> SourcingResult<Principal> {
        let response = self.get(&self.config.endpoints.whoami).await?;
        let response = ensure_success(response, "whoami").await?;
        let status = response.status().as_u16();

        let body: Value = response.json().await.map_err(|e| SourcingError::Api {
            status,
            message: format!("Unreadable profile response: {}", e),
            context: ErrorContext::new("session_manager").with_operation("whoami"),
        })?;

        let principal = principal_from_profile(&body).ok_or_else(|| SourcingError::Api {
            status,
            message: "Profile response did not identify a user".to_string(),
            context: ErrorContext::new("session_manager").with_operation("whoami"),
        })?;

        // The request may have refreshed but never replaces the session
        let epoch = self.shared().epoch;
        self.cache_principal(epoch, &principal);
        Ok(principal)
    }

    fn cache_principal(&self, epoch: u64, principal: &Principal) {
        let mut shared = self.shared();
        if shared.epoch == epoch {
            shared.principal = Some(principal.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTokenStore;

    fn manager(store: MemoryTokenStore) -> SessionManager {
        SessionManager::new(ClientConfig::for_base_url("http://127.0.0.1:9"), Arc::new(store))
            .unwrap()
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::get("/quotes/my/")
            .query("page", "2")
            .anonymous();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.query, vec![("page".to_string(), "2".to_string())]);
        assert!(!request.require_auth);

        let request = ApiRequest::post("/quotes/create/").json(json!({"name": "Bolts"}));
        assert!(request.require_auth);
        assert_eq!(request.body, Some(json!({"name": "Bolts"})));
    }

    #[test]
    fn test_token_response_aliases() {
        let tokens: TokenResponse =
            serde_json::from_value(json!({"access_token": "A", "refresh_token": ""})).unwrap();
        assert_eq!(tokens.access(), Some("A"));
        assert_eq!(tokens.refresh(), None);
    }

    #[test]
    fn test_initial_state_follows_storage() {
        let empty = manager(MemoryTokenStore::new());
        assert_eq!(empty.state(), SessionState::Unauthenticated);

        let stored = MemoryTokenStore::with_session(Session::new("A1", None));
        let manager = manager(stored.clone());
        assert_eq!(manager.state(), SessionState::Authenticated);

        stored.clear().unwrap();
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_persist_and_clear_transitions() {
        let store = MemoryTokenStore::new();
        let manager = manager(store.clone());

        manager
            .persist(&Session::new("A1", Some("R1".to_string())))
            .unwrap();
        assert_eq!(manager.state(), SessionState::Authenticated);
        assert_eq!(store.load().unwrap().unwrap().access_token, "A1");

        manager.clear().unwrap();
        manager.clear().unwrap();
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_request_without_session_fails_fast() {
        let manager = manager(MemoryTokenStore::new());
        let result = manager.get("/quotes/my/").await;
        assert!(matches!(
            result,
            Err(SourcingError::Auth(AuthError::NotAuthenticated))
        ));
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let manager = manager(MemoryTokenStore::with_session(Session::new("A1", None)));
        assert!(matches!(
            manager.refresh().await,
            Err(SourcingError::Auth(AuthError::NotAuthenticated))
        ));

        manager.clear().unwrap();
        assert!(matches!(
            manager.principal().await,
            Err(SourcingError::Auth(AuthError::NotAuthenticated))
        ));
    }
}
