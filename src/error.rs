//! Centralized error types for jiralink.
//!
//! This module provides a unified error hierarchy for the application with
//! user-friendly error messages. All error types use `thiserror` for
//! ergonomic error handling.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::convert::ConversionError;

/// The main application error type.
///
/// This enum aggregates all error types that can occur in jiralink,
/// providing user-friendly error messages while preserving the underlying
/// error context for debugging.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// API-related errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Markup conversion errors.
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// IO errors (file system, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with a message.
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }

    /// Get a user-friendly message for display.
    ///
    /// This returns a message suitable for notifications, without request
    /// details or response bodies.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => match e {
                ConfigError::NoConfigDir => {
                    "Could not find configuration directory. Please check your system settings."
                        .to_string()
                }
                ConfigError::CreateDirError(_) => {
                    "Could not create configuration directory. Check file permissions.".to_string()
                }
                ConfigError::ReadError(_) => {
                    "Could not read configuration file. Please check the file exists and is readable.".to_string()
                }
                ConfigError::WriteError(_) => {
                    "Could not save configuration. Please check file permissions.".to_string()
                }
                ConfigError::ParseError(_) => {
                    "Configuration file is invalid. Please check the file format.".to_string()
                }
                ConfigError::SerializeError(_) => {
                    "Could not save configuration. Internal error.".to_string()
                }
                ConfigError::ValidationError(msg) => format!("Configuration error: {}", msg),
                ConfigError::ProfileNotFound(name) => {
                    format!("Profile '{}' not found.", name)
                }
                ConfigError::UnsupportedDeployment(deployment) => format!(
                    "Deployment type '{}' is not supported. Use a server or datacenter profile.",
                    deployment
                ),
            },
            AppError::Api(e) => match e {
                ApiError::Authentication { status: 403, .. } => {
                    "Access denied. You don't have permission to access this resource.".to_string()
                }
                ApiError::Authentication { .. } => {
                    "Authentication failed. Please check your username and password or personal access token.".to_string()
                }
                ApiError::NotFound { endpoint, .. } => format!("'{}' was not found.", endpoint),
                ApiError::RateLimited { .. } => {
                    "Too many requests. Please wait a moment and try again.".to_string()
                }
                ApiError::Server { status, .. } => {
                    format!("JIRA server error (HTTP {}). Please try again later.", status)
                }
                ApiError::Http { status: 409, .. } => {
                    "This issue was modified by someone else. Please refresh and try again."
                        .to_string()
                }
                ApiError::Http { status, .. } => {
                    format!("JIRA rejected the request (HTTP {}).", status)
                }
                ApiError::Network { .. } => {
                    "Could not connect to JIRA. Please check your URL and network.".to_string()
                }
                ApiError::InvalidUrl(_) => "Invalid JIRA URL in configuration.".to_string(),
                ApiError::Keyring(_) => {
                    "Could not access secure storage. Please store your credentials again."
                        .to_string()
                }
                ApiError::InvalidResponse { .. } => {
                    "Unexpected response from JIRA. Please try again.".to_string()
                }
            },
            AppError::Conversion(e) => format!("Could not convert text: {}", e),
            AppError::Io(_) => "A file operation failed. Please check file permissions.".to_string(),
            AppError::Other(msg) => msg.clone(),
        }
    }

    /// Check if this error is critical and requires user acknowledgment.
    ///
    /// Critical errors typically indicate issues that prevent the client
    /// from working at all, such as configuration or authentication problems.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            AppError::Config(_)
                | AppError::Api(ApiError::Authentication { .. })
                | AppError::Api(ApiError::Keyring(_))
                | AppError::Api(ApiError::InvalidUrl(_))
        )
    }

    /// Check if this error is recoverable.
    ///
    /// Recoverable errors can be retried or the user can continue working.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Api(ApiError::RateLimited { .. })
                | AppError::Api(ApiError::Server { .. })
                | AppError::Api(ApiError::Network { .. })
                | AppError::Api(ApiError::NotFound { .. })
                | AppError::Api(ApiError::Http { .. })
                | AppError::Conversion(_)
        )
    }

    /// Get a suggested action for the user.
    pub fn suggested_action(&self) -> Option<&'static str> {
        match self {
            AppError::Config(ConfigError::NoConfigDir)
            | AppError::Config(ConfigError::ReadError(_)) => {
                Some("Create a configuration file or set JIRALINK_CONFIG.")
            }
            AppError::Config(ConfigError::UnsupportedDeployment(_)) => {
                Some("Set 'deployment' to \"server\" or \"datacenter\" in the profile.")
            }
            AppError::Api(ApiError::Authentication { .. }) | AppError::Api(ApiError::Keyring(_)) => {
                Some("Run 'jiralink set-token' to store a password or personal access token.")
            }
            AppError::Api(ApiError::RateLimited { .. }) => {
                Some("Wait a few seconds and try again.")
            }
            AppError::Api(ApiError::Network { .. }) => {
                Some("Check your network connection and JIRA URL.")
            }
            _ => None,
        }
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeploymentType;

    fn auth_error(status: u16) -> ApiError {
        ApiError::from_response("GET", "/rest/api/2/myself", status, "Unauthorized", String::new())
    }

    #[test]
    fn test_app_error_from_config_error() {
        let config_err = ConfigError::NoConfigDir;
        let app_err: AppError = config_err.into();
        assert!(matches!(app_err, AppError::Config(ConfigError::NoConfigDir)));
    }

    #[test]
    fn test_app_error_from_api_error() {
        let app_err: AppError = auth_error(401).into();
        assert!(matches!(
            app_err,
            AppError::Api(ApiError::Authentication { status: 401, .. })
        ));
    }

    #[test]
    fn test_user_message_unauthorized() {
        let msg = AppError::Api(auth_error(401)).user_message();
        assert!(msg.contains("Authentication failed"));
        assert!(msg.contains("personal access token"));
    }

    #[test]
    fn test_user_message_forbidden() {
        let msg = AppError::Api(auth_error(403)).user_message();
        assert!(msg.contains("Access denied"));
    }

    #[test]
    fn test_user_message_not_found() {
        let err = AppError::Api(ApiError::from_response(
            "GET",
            "/rest/api/2/issue/PROJ-123",
            404,
            "Not Found",
            String::new(),
        ));
        let msg = err.user_message();
        assert!(msg.contains("PROJ-123"));
        assert!(msg.contains("not found"));
    }

    #[test]
    fn test_user_message_network() {
        let err = AppError::Api(ApiError::network("GET", "/x", "connection refused"));
        assert!(err.user_message().contains("Could not connect to JIRA"));
    }

    #[test]
    fn test_user_message_conflict() {
        let err = AppError::Api(ApiError::from_response(
            "PUT",
            "/rest/api/2/issue/PROJ-1",
            409,
            "Conflict",
            String::new(),
        ));
        assert!(err.user_message().contains("modified by someone else"));
    }

    #[test]
    fn test_user_message_unsupported_deployment() {
        let err = AppError::Config(ConfigError::UnsupportedDeployment(DeploymentType::Cloud));
        assert!(err.user_message().contains("cloud"));
        assert!(err.suggested_action().unwrap().contains("datacenter"));
    }

    #[test]
    fn test_user_message_config_validation() {
        let err = AppError::Config(ConfigError::ValidationError(
            "duplicate profile".to_string(),
        ));
        assert!(err.user_message().contains("duplicate profile"));
    }

    #[test]
    fn test_is_critical() {
        assert!(AppError::Api(auth_error(401)).is_critical());
        assert!(AppError::Config(ConfigError::NoConfigDir).is_critical());
        assert!(!AppError::Api(ApiError::network("GET", "/x", "down")).is_critical());
    }

    #[test]
    fn test_is_recoverable() {
        let rate_limited = ApiError::from_response("GET", "/x", 429, "", String::new());
        assert!(AppError::Api(rate_limited).is_recoverable());
        assert!(!AppError::Api(auth_error(401)).is_recoverable());
        assert!(AppError::Conversion(ConversionError::UnterminatedCodeBlock { line: 3 })
            .is_recoverable());
    }

    #[test]
    fn test_suggested_action_unauthorized() {
        let action = AppError::Api(auth_error(401)).suggested_action();
        assert!(action.unwrap().contains("set-token"));
    }

    #[test]
    fn test_other_error() {
        let err = AppError::other("something went wrong");
        assert!(matches!(err, AppError::Other(_)));
        assert_eq!(err.user_message(), "something went wrong");
    }
}
