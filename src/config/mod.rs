//! Configuration management for jiralink.
//!
//! This module handles loading and saving the TOML configuration file with
//! deployment profiles and client settings, and exposes the read-only
//! [`ConfigProvider`] view the client factory consumes.

mod profile;
mod settings;

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use profile::{DeploymentType, Profile};
pub use settings::{CacheSettings, RetrySettings, Settings};

/// Environment variable that overrides the configuration file location.
pub const CONFIG_PATH_ENV: &str = "JIRALINK_CONFIG";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform configuration directory could not be determined.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// The configuration directory could not be created.
    #[error("failed to create configuration directory: {0}")]
    CreateDirError(std::io::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    ReadError(std::io::Error),

    /// The configuration file could not be written.
    #[error("failed to write configuration file: {0}")]
    WriteError(std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    ValidationError(String),

    /// The requested profile does not exist.
    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    /// The profile targets a deployment this client does not serve.
    #[error("deployment type '{0}' is not supported by this client")]
    UnsupportedDeployment(DeploymentType),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Read-only key/value access to deployment settings.
///
/// Keys: `url`, `username`, `deploymentType` (and `name` for the secret
/// store account).
pub trait ConfigProvider {
    /// Look up a configuration value.
    fn get(&self, key: &str) -> Option<String>;
}

/// The full configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Client-wide settings.
    #[serde(default)]
    pub settings: Settings,
    /// Configured JIRA deployments.
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Config {
    /// Path of the configuration file.
    ///
    /// Honors `JIRALINK_CONFIG`, otherwise `<config dir>/jiralink/config.toml`.
    pub fn path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("jiralink").join("config.toml"))
    }

    /// Load the configuration, returning defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!(path = %path.display(), profiles = config.profiles.len(), "Loaded configuration");
        Ok(config)
    }

    /// Save the configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.validate()?;
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::CreateDirError)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content).map_err(ConfigError::WriteError)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Validate every profile and check names are unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for profile in &self.profiles {
            profile.validate()?;
            if !seen.insert(profile.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate profile name '{}'",
                    profile.name
                )));
            }
        }
        if let Some(default) = &self.settings.default_profile {
            if !seen.contains(default.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "default profile '{}' is not defined",
                    default
                )));
            }
        }
        Ok(())
    }

    /// Find a profile by name, or the default profile when `name` is `None`.
    ///
    /// Falls back to the only profile when exactly one is configured.
    pub fn profile(&self, name: Option<&str>) -> Result<&Profile> {
        let wanted = name.or(self.settings.default_profile.as_deref());
        match wanted {
            Some(wanted) => self
                .profiles
                .iter()
                .find(|p| p.name == wanted)
                .ok_or_else(|| ConfigError::ProfileNotFound(wanted.to_string())),
            None if self.profiles.len() == 1 => Ok(&self.profiles[0]),
            None => Err(ConfigError::ValidationError(
                "no profile selected and no default profile configured".to_string(),
            )),
        }
    }
}

/// Validated connection settings for one client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Profile name, used as the secret store account and cache namespace.
    pub name: String,
    /// Base URL with trailing slashes removed.
    pub base_url: String,
    /// Username for basic authentication.
    pub username: String,
    /// The deployment flavor.
    pub deployment: DeploymentType,
    /// Client-wide settings.
    pub settings: Settings,
}

impl ClientConfig {
    /// Read and validate the connection settings from a provider.
    pub fn from_provider(provider: &dyn ConfigProvider, settings: Settings) -> Result<Self> {
        let url = provider
            .get("url")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::ValidationError("url is not configured".to_string()))?;
        let username = provider
            .get("username")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::ValidationError("username is not configured".to_string())
            })?;
        let deployment = match provider.get("deploymentType") {
            Some(value) => value.parse()?,
            None => DeploymentType::default(),
        };
        let name = provider.get("name").unwrap_or_else(|| "default".to_string());

        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ConfigError::ValidationError(format!(
                "URL '{}' must start with http:// or https://",
                url
            )));
        }

        Ok(Self {
            name,
            base_url: url.trim().trim_end_matches('/').to_string(),
            username: username.trim().to_string(),
            deployment,
            settings,
        })
    }
}
