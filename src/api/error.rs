//! API error types for the JIRA client.
//!
//! Every failure that reaches a caller carries the HTTP method and endpoint
//! that produced it, so log lines and notifications can be traced back to a
//! single request.

use thiserror::Error;

/// Errors that can occur when interacting with the JIRA API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (DNS, connection refused, timeout, TLS).
    #[error("{method} {endpoint} failed: network error: {message}")]
    Network {
        method: String,
        endpoint: String,
        message: String,
    },

    /// The server rejected the credentials (HTTP 401/403).
    #[error("{method} {endpoint} failed: authentication rejected (HTTP {status}){}", summarize(.body))]
    Authentication {
        method: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The resource does not exist (HTTP 404).
    #[error("{method} {endpoint} failed: not found{}", summarize(.body))]
    NotFound {
        method: String,
        endpoint: String,
        body: String,
    },

    /// Rate limited by the JIRA API (HTTP 429).
    #[error("{method} {endpoint} failed: rate limited, please wait before retrying")]
    RateLimited {
        method: String,
        endpoint: String,
        body: String,
    },

    /// JIRA server error (HTTP 5xx).
    #[error("{method} {endpoint} failed: server error HTTP {status} {status_text}{}", summarize(.body))]
    Server {
        method: String,
        endpoint: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// Any other non-2xx response.
    #[error("{method} {endpoint} failed: HTTP {status} {status_text}{}", summarize(.body))]
    Http {
        method: String,
        endpoint: String,
        status: u16,
        status_text: String,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Invalid API response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// Keyring error when reading credential material.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Classify a non-2xx response.
    pub fn from_response(
        method: &str,
        endpoint: &str,
        status: u16,
        status_text: &str,
        body: String,
    ) -> Self {
        let method = method.to_string();
        let endpoint = endpoint.to_string();
        match status {
            401 | 403 => ApiError::Authentication {
                method,
                endpoint,
                status,
                body,
            },
            404 => ApiError::NotFound {
                method,
                endpoint,
                body,
            },
            429 => ApiError::RateLimited {
                method,
                endpoint,
                body,
            },
            500..=599 => ApiError::Server {
                method,
                endpoint,
                status,
                status_text: status_text.to_string(),
                body,
            },
            _ => ApiError::Http {
                method,
                endpoint,
                status,
                status_text: status_text.to_string(),
                body,
            },
        }
    }

    /// Build a network failure for a request that never got a response.
    pub fn network(method: &str, endpoint: &str, message: impl Into<String>) -> Self {
        ApiError::Network {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// The HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Http { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            ApiError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// The raw response body, if a response was received.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Authentication { body, .. }
            | ApiError::NotFound { body, .. }
            | ApiError::RateLimited { body, .. }
            | ApiError::Server { body, .. }
            | ApiError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Whether no response was received at all.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }

    /// Whether this is a credential rejection.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ApiError::Authentication { .. })
    }

    /// Whether the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

/// Summarize a JIRA error body for display.
///
/// JIRA returns `{"errorMessages": [...], "errors": {field: message}}` for most
/// failures; anything else is shown truncated.
fn summarize(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let mut parts: Vec<String> = json
            .get("errorMessages")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(obj) = json.get("errors").and_then(|e| e.as_object()) {
            parts.extend(obj.iter().map(|(k, v)| match v.as_str() {
                Some(s) => format!("{}: {}", k, s),
                None => format!("{}: {}", k, v),
            }));
        }

        if !parts.is_empty() {
            return format!(": {}", parts.join(", "));
        }
    }

    let truncated: String = body.chars().take(200).collect();
    format!(": {}", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_status_401() {
        let err = ApiError::from_response("GET", "/myself", 401, "Unauthorized", String::new());
        assert!(err.is_authentication());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_error_from_status_403() {
        let err = ApiError::from_response("GET", "/myself", 403, "Forbidden", String::new());
        assert!(matches!(err, ApiError::Authentication { status: 403, .. }));
    }

    #[test]
    fn test_error_from_status_404() {
        let err = ApiError::from_response("GET", "/issue/PROJ-1", 404, "Not Found", String::new());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_error_from_status_429() {
        let err = ApiError::from_response("GET", "/search", 429, "Too Many Requests", String::new());
        assert!(matches!(err, ApiError::RateLimited { .. }));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_error_from_status_500() {
        let err = ApiError::from_response("GET", "/search", 503, "Service Unavailable", "down".into());
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
        assert_eq!(err.body(), Some("down"));
    }

    #[test]
    fn test_error_from_status_400_is_generic_http() {
        let err = ApiError::from_response("POST", "/issue", 400, "Bad Request", String::new());
        assert!(matches!(err, ApiError::Http { status: 400, .. }));
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = ApiError::network("GET", "/serverInfo", "connection refused");
        assert!(err.is_network());
        assert_eq!(err.status(), None);
        assert_eq!(err.body(), None);
    }

    #[test]
    fn test_display_includes_method_and_endpoint() {
        let err = ApiError::from_response(
            "PUT",
            "/rest/api/2/issue/PROJ-1",
            400,
            "Bad Request",
            r#"{"errorMessages":[],"errors":{"summary":"Summary is required"}}"#.to_string(),
        );
        assert_eq!(
            err.to_string(),
            "PUT /rest/api/2/issue/PROJ-1 failed: HTTP 400 Bad Request: summary: Summary is required"
        );
    }

    #[test]
    fn test_display_uses_error_messages() {
        let err = ApiError::from_response(
            "GET",
            "/rest/api/2/issue/NOPE-1",
            404,
            "Not Found",
            r#"{"errorMessages":["Issue Does Not Exist"],"errors":{}}"#.to_string(),
        );
        assert_eq!(
            err.to_string(),
            "GET /rest/api/2/issue/NOPE-1 failed: not found: Issue Does Not Exist"
        );
    }

    #[test]
    fn test_summarize_truncates_plain_bodies() {
        let long = "x".repeat(500);
        let summary = summarize(&long);
        assert_eq!(summary.len(), 2 + 200);
    }

    #[test]
    fn test_summarize_empty_body() {
        assert_eq!(summarize("   "), "");
    }
}
