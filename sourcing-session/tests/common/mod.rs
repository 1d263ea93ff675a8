//! Shared fixtures for session manager tests

#![allow(dead_code)]

use serde_json::json;
use sourcing_core::{ClientConfig, Session, TokenStore};
use sourcing_session::{MemoryTokenStore, SessionManager};
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN_PATH: &str = "/auth/jwt/login/";
pub const REFRESH_PATH: &str = "/auth/jwt/refresh/";
pub const WHOAMI_PATH: &str = "/auth/users/me/";
pub const REGISTER_PATH: &str = "/auth/users/";

/// Mock backend plus a manager wired to it through a shared memory store
pub struct TestBackend {
    pub server: MockServer,
    pub store: MemoryTokenStore,
    pub manager: SessionManager,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self::start_with(MemoryTokenStore::new(), |_| {}).await
    }

    pub async fn with_session(access: &str, refresh: Option<&str>) -> Self {
        let store =
            MemoryTokenStore::with_session(Session::new(access, refresh.map(str::to_string)));
        Self::start_with(store, |_| {}).await
    }

    pub async fn start_with(
        store: MemoryTokenStore,
        configure: impl FnOnce(&mut ClientConfig),
    ) -> Self {
        let server = MockServer::start().await;
        let mut config = ClientConfig::for_base_url(server.uri());
        configure(&mut config);

        let manager = SessionManager::new(config, Arc::new(store.clone()))
            .expect("manager should build");

        Self {
            server,
            store,
            manager,
        }
    }

    pub fn stored(&self) -> Option<Session> {
        self.store.load().expect("memory store never fails")
    }

    /// Number of requests the backend saw for `path`
    pub async fn hits(&self, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == path)
            .count()
    }

    /// Authorization headers sent to `path`, in arrival order
    pub async fn authorizations(&self, path: &str) -> Vec<Option<String>> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|request| request.url.path() == path)
            .map(|request| {
                request
                    .headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }

    pub async fn mount_refresh(&self, refresh: &str, response: ResponseTemplate, times: u64) {
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .and(body_json(json!({ "refresh": refresh })))
            .respond_with(response)
            .expect(times)
            .mount(&self.server)
            .await;
    }
}
