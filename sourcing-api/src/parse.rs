//! Defensive decoding of backend responses

use serde::de::DeserializeOwned;
use serde_json::Value;
use sourcing_core::{ErrorContext, SourcingError, SourcingResult};
use sourcing_session::ensure_success;
use tracing::warn;

/// Envelope keys that may wrap a list
const LIST_KEYS: &[&str] = &["results", "events", "messages", "notifications"];

/// Locate the array inside a list response
///
/// Accepts a bare array, a paginated `{"results": [..]}` body, or one of the
/// named envelopes. Anything else is treated as an empty list.
pub fn list_items(body: Value, resource: &str) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut fields) => {
            for key in LIST_KEYS {
                if let Some(Value::Array(items)) = fields.remove(*key) {
                    return items;
                }
            }
            warn!(resource, "Expected a list but got an object without one");
            Vec::new()
        }
        other => {
            warn!(resource, kind = value_kind(&other), "Expected a list");
            Vec::new()
        }
    }
}

/// Decode each item of a list response, skipping records that do not parse
pub fn parse_list<T: DeserializeOwned>(body: Value, resource: &str) -> Vec<T> {
    list_items(body, resource)
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            if !item.is_object() {
                warn!(resource, index, kind = value_kind(&item), "Skipping non-object record");
                return None;
            }
            match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(resource, index, error = %e, "Skipping malformed record");
                    None
                }
            }
        })
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check the status and read the body as JSON
pub async fn read_json(response: reqwest::Response, operation: &str) -> SourcingResult<Value> {
    let response = ensure_success(response, operation).await?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(|e| SourcingError::Network {
        message: format!("Failed to read {} response: {}", operation, e),
        source: Some(Box::new(e)),
        context: ErrorContext::new("marketplace_client").with_operation(operation),
    })?;

    // 204 and friends
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| SourcingError::Api {
        status,
        message: format!("Response to {} was not JSON: {}", operation, e),
        context: ErrorContext::new("marketplace_client").with_operation(operation),
    })
}

/// Decode a single record
pub fn parse_record<T: DeserializeOwned>(body: Value, operation: &str) -> SourcingResult<T> {
    if !body.is_object() {
        return Err(SourcingError::Api {
            status: 200,
            message: format!("Response to {} was not an object", operation),
            context: ErrorContext::new("marketplace_client").with_operation(operation),
        });
    }

    serde_json::from_value(body).map_err(|e| SourcingError::Api {
        status: 200,
        message: format!("Unexpected {} payload: {}", operation, e),
        context: ErrorContext::new("marketplace_client").with_operation(operation),
    })
}
