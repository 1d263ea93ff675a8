//! Typed client over the session manager

use crate::parse::{parse_list, parse_record, read_json};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sourcing_core::{validation_error, SourcingResult};
use sourcing_session::{ApiRequest, SessionManager};
use std::sync::Arc;
use tracing::debug;

/// Marketplace backend client
///
/// Every call goes through the shared [`SessionManager`], so token attachment
/// and refresh-on-401 apply uniformly.
#[derive(Clone)]
pub struct MarketplaceClient {
    session: Arc<SessionManager>,
}

impl MarketplaceClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Send a request and return its JSON body
    pub(crate) async fn execute(&self, request: ApiRequest, operation: &str) -> SourcingResult<Value> {
        debug!(operation, method = %request.method, path = %request.path, "Calling backend");
        let response = self.session.request(request).await?;
        read_json(response, operation).await
    }

    pub(crate) async fn fetch_list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        resource: &str,
    ) -> SourcingResult<Vec<T>> {
        let body = self.execute(request, resource).await?;
        Ok(parse_list(body, resource))
    }

    pub(crate) async fn fetch_record<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        operation: &str,
    ) -> SourcingResult<T> {
        let body = self.execute(request, operation).await?;
        parse_record(body, operation)
    }
}

/// Validate an identifier before it is spliced into a path
pub(crate) fn path_segment<'a>(value: &'a str, field: &str) -> SourcingResult<&'a str> {
    let value = value.trim();
    // Dot segments and escapes would let the URL parser rewrite the path
    let is_dot_segment = value.chars().all(|c| c == '.');
    if value.is_empty() || is_dot_segment || value.contains(['/', '\\', '?', '#', '%']) {
        return Err(validation_error!(
            format!("Invalid {}: '{}'", field, value),
            field,
            "marketplace_client"
        ));
    }
    Ok(value)
}
