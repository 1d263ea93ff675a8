//! Sourcing Session - client-side session lifecycle
//!
//! Acquires, stores, attaches, refreshes and invalidates the JWT pair used to
//! talk to the marketplace backend

pub mod http;
pub mod manager;
pub mod principal;
pub mod storage;

pub use http::{authorization_value, create_http_client, ensure_success, error_detail, AUTH_SCHEME};
pub use manager::{ApiRequest, SessionManager};
pub use principal::{expiry_from_token, principal_from_profile, principal_from_token};
pub use storage::{FileTokenStore, MemoryTokenStore};
