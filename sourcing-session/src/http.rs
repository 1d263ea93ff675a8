//! HTTP plumbing shared by the session manager and the typed API clients

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use sourcing_core::{BackendConfig, ErrorContext, SourcingError, SourcingResult};

/// Authorization scheme the backend expects. Not `Bearer`.
pub const AUTH_SCHEME: &str = "JWT";

const MAX_DETAIL_LEN: usize = 200;

/// `Authorization` header value for an access token
pub fn authorization_value(access_token: &str) -> String {
    format!("{} {}", AUTH_SCHEME, access_token)
}

/// Create the HTTP client with common configuration
pub fn create_http_client(config: &BackendConfig) -> SourcingResult<reqwest::Client> {
    let mut headers = HeaderMap::new();

    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).map_err(|e| SourcingError::Config {
            message: format!("Invalid user agent: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?,
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (key, value) in &config.headers {
        let header_name =
            HeaderName::from_bytes(key.as_bytes()).map_err(|e| SourcingError::Config {
                message: format!("Invalid header name '{}': {}", key, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("http_client").with_operation("create_client"),
            })?;

        let header_value = HeaderValue::from_str(value).map_err(|e| SourcingError::Config {
            message: format!("Invalid header value for '{}': {}", key, e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| SourcingError::Network {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

/// Pull a human-readable message out of a backend error body
///
/// Understands `{"detail": ..}`, `{"error": ..}`, `{"message": ..}`,
/// `{"non_field_errors": [..]}` and per-field error lists. Plain-text bodies are
/// returned truncated.
pub fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        // HTML error pages are noise
        if body.starts_with('<') {
            return None;
        }
        return Some(truncate(body));
    };

    for key in ["detail", "error", "message"] {
        if let Some(text) = value.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    if let Some(text) = first_string(value.get("non_field_errors")) {
        return Some(text);
    }

    value.as_object().and_then(|fields| {
        fields
            .iter()
            .find_map(|(field, errors)| first_string(Some(errors)).map(|e| format!("{}: {}", field, e)))
    })
}

fn first_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_DETAIL_LEN).collect();
        format!("{}...", cut)
    }
}

/// Detail text for a failed response, falling back to the status reason
pub(crate) async fn response_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error_detail(&body).unwrap_or_else(|| reason(status))
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

/// Turn a non-success response into an `Api` error; pass success through
pub async fn ensure_success(
    response: reqwest::Response,
    operation: &str,
) -> SourcingResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let message = response_detail(response).await;

    Err(SourcingError::Api {
        status: status.as_u16(),
        message,
        context: ErrorContext::new("api_client")
            .with_operation(operation)
            .with_metadata("path", &url)
            .with_suggestion(match status.as_u16() {
                403 => "Check that your account role may access this resource",
                404 => "The resource does not exist or is not visible to you",
                429 => "Slow down and try again later",
                500..=599 => "The backend is having trouble; try again later",
                _ => "Check the request parameters",
            }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_scheme_is_jwt() {
        assert_eq!(authorization_value("A1"), "JWT A1");
    }

    #[test]
    fn test_error_detail_shapes() {
        assert_eq!(
            error_detail(r#"{"detail": "Token is invalid or expired"}"#).as_deref(),
            Some("Token is invalid or expired")
        );
        assert_eq!(
            error_detail(r#"{"error": "Failed to send message."}"#).as_deref(),
            Some("Failed to send message.")
        );
        assert_eq!(
            error_detail(r#"{"non_field_errors": ["Unable to log in."]}"#).as_deref(),
            Some("Unable to log in.")
        );
        assert_eq!(
            error_detail(r#"{"email": ["This field is required."]}"#).as_deref(),
            Some("email: This field is required.")
        );
        assert_eq!(error_detail("").as_deref(), None);
        assert_eq!(error_detail("<html>502</html>").as_deref(), None);
        assert_eq!(error_detail("Bad Gateway").as_deref(), Some("Bad Gateway"));
    }

    #[test]
    fn test_long_plain_bodies_are_truncated() {
        let body = "x".repeat(500);
        let detail = error_detail(&body).unwrap();
        assert!(detail.len() < 250);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn test_http_client_creation() {
        let mut config = BackendConfig::default();
        assert!(create_http_client(&config).is_ok());

        config
            .headers
            .insert("bad header".to_string(), "value".to_string());
        assert!(matches!(
            create_http_client(&config),
            Err(SourcingError::Config { .. })
        ));
    }
}
