//! Client-wide settings.

use serde::{Deserialize, Serialize};

/// Client-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// The name of the default profile to use.
    pub default_profile: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Response cache settings.
    pub cache: CacheSettings,
    /// Retry settings for idempotent requests.
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_profile: None,
            request_timeout_secs: 30,
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

/// TTL tiers and size bound for the in-memory response cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
    /// Volatile data such as search results and transitions.
    pub short_ttl_secs: u64,
    /// Default tier, used when a call does not pick one.
    pub medium_ttl_secs: u64,
    /// Slow-changing metadata: projects, priorities, statuses, link types.
    pub long_ttl_secs: u64,
    /// Entries kept before least-recently-used eviction.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            short_ttl_secs: 60,
            medium_ttl_secs: 300,
            long_ttl_secs: 1800,
            max_entries: 500,
        }
    }
}

/// Retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retryable_statuses: Vec<u16>,
    pub retry_on_network: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            retryable_statuses: vec![429, 500, 502, 503, 504],
            retry_on_network: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.request_timeout_secs, 30);
        assert_eq!(settings.cache.medium_ttl_secs, 300);
        assert_eq!(settings.retry.max_retries, 3);
        assert!(settings.retry.retryable_statuses.contains(&429));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            default_profile = "work"

            [retry]
            max_retries = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.default_profile.as_deref(), Some("work"));
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.retry.base_delay_ms, 1000);
        assert_eq!(settings.cache, CacheSettings::default());
    }
}
