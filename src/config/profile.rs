//! JIRA deployment profile configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigProvider, Result};

/// Which flavor of JIRA a profile points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    /// Self-hosted JIRA Server.
    #[default]
    Server,
    /// Self-hosted JIRA Data Center.
    DataCenter,
    /// Atlassian-hosted JIRA Cloud.
    Cloud,
}

impl DeploymentType {
    /// Whether this deployment is self-hosted (Server or Data Center).
    pub fn is_self_hosted(&self) -> bool {
        !matches!(self, DeploymentType::Cloud)
    }

    /// The configuration value for this deployment type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::Server => "server",
            DeploymentType::DataCenter => "datacenter",
            DeploymentType::Cloud => "cloud",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(DeploymentType::Server),
            "datacenter" | "data-center" | "data_center" => Ok(DeploymentType::DataCenter),
            "cloud" => Ok(DeploymentType::Cloud),
            other => Err(ConfigError::ValidationError(format!(
                "unknown deployment type '{}'",
                other
            ))),
        }
    }
}

/// A JIRA profile configuration.
///
/// Profiles store connection details for a JIRA instance. The password or
/// personal access token lives in the secret store, never in this file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// The name of this profile, also the secret store account name.
    pub name: String,
    /// The JIRA base URL (e.g., "https://jira.example.com").
    pub url: String,
    /// The JIRA username used for basic authentication.
    pub username: String,
    /// The deployment flavor.
    #[serde(default)]
    pub deployment: DeploymentType,
}

impl Profile {
    /// Create a new profile.
    pub fn new(name: String, url: String, username: String, deployment: DeploymentType) -> Self {
        Self {
            name,
            url,
            username,
            deployment,
        }
    }

    /// Validate this profile.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError::ValidationError` with details if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "profile name cannot be empty".to_string(),
            ));
        }

        if self.name.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "profile name '{}' cannot contain whitespace",
                self.name
            )));
        }

        if self.url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL cannot be empty",
                self.name
            )));
        }

        if !self.url.starts_with("https://") && !self.url.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': URL must start with http:// or https://",
                self.name
            )));
        }

        if self.username.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "profile '{}': username cannot be empty",
                self.name
            )));
        }

        Ok(())
    }
}

impl ConfigProvider for Profile {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(self.name.clone()),
            "url" => Some(self.url.clone()),
            "username" => Some(self.username.clone()),
            "deploymentType" => Some(self.deployment.as_str().to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, url: &str, username: &str) -> Profile {
        Profile::new(
            name.to_string(),
            url.to_string(),
            username.to_string(),
            DeploymentType::Server,
        )
    }

    #[test]
    fn test_valid_profile() {
        assert!(profile("work", "https://jira.example.com", "jdoe")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let result = profile("", "https://jira.example.com", "jdoe").validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("name cannot be empty"));
    }

    #[test]
    fn test_whitespace_name_rejected() {
        let result = profile("my work", "https://jira.example.com", "jdoe").validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot contain whitespace"));
    }

    #[test]
    fn test_invalid_url_scheme_rejected() {
        let result = profile("work", "jira.example.com", "jdoe").validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must start with http"));
    }

    #[test]
    fn test_empty_username_rejected() {
        let result = profile("work", "http://localhost:8080", " ").validate();
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("username cannot be empty"));
    }

    #[test]
    fn test_deployment_type_parse() {
        assert_eq!(
            "Server".parse::<DeploymentType>().unwrap(),
            DeploymentType::Server
        );
        assert_eq!(
            "data-center".parse::<DeploymentType>().unwrap(),
            DeploymentType::DataCenter
        );
        assert_eq!(
            "cloud".parse::<DeploymentType>().unwrap(),
            DeploymentType::Cloud
        );
        assert!("mainframe".parse::<DeploymentType>().is_err());
    }

    #[test]
    fn test_provider_keys() {
        let p = profile("work", "https://jira.example.com", "jdoe");
        assert_eq!(p.get("url").as_deref(), Some("https://jira.example.com"));
        assert_eq!(p.get("username").as_deref(), Some("jdoe"));
        assert_eq!(p.get("deploymentType").as_deref(), Some("server"));
        assert_eq!(p.get("password"), None);
    }

    #[test]
    fn test_profile_serialization() {
        let mut p = profile("dc", "https://jira.example.com", "jdoe");
        p.deployment = DeploymentType::DataCenter;

        let toml_str = toml::to_string(&p).unwrap();
        assert!(toml_str.contains("deployment = \"datacenter\""));
        let parsed: Profile = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, p);
    }
}
