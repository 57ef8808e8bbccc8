//! Server identity and capability detection.
//!
//! Capabilities are a pure function of the server's `(major, minor)` version,
//! derived once from `GET /rest/api/2/serverInfo` through a fixed table.

use std::fmt;

use serde::Serialize;
use tracing::{info, instrument, warn};

use super::error::Result;
use super::transport::{RequestOptions, Requester};
use super::types::ServerInfoResponse;

/// Oldest major version the capability table is written for.
pub const MIN_SUPPORTED_MAJOR: u32 = 7;

/// Identity endpoint; readable without authentication.
pub const SERVER_INFO_ENDPOINT: &str = "/rest/api/2/serverInfo";

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub struct VersionTriple {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionTriple {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the leading numeric components of a version string such as
    /// `8.20.1` or `9.4.0-m0002`. Missing components are zero.
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version
            .split(|c: char| c == '.' || c == '-')
            .map(|p| p.parse::<u32>());
        let major = parts.next()?.ok()?;
        let minor = parts.next().and_then(|p| p.ok()).unwrap_or(0);
        let patch = parts.next().and_then(|p| p.ok()).unwrap_or(0);
        Some(Self::new(major, minor, patch))
    }

    /// Build from the `versionNumbers` array.
    pub fn from_numbers(numbers: &[u32]) -> Option<Self> {
        let major = *numbers.first()?;
        Some(Self::new(
            major,
            numbers.get(1).copied().unwrap_or(0),
            numbers.get(2).copied().unwrap_or(0),
        ))
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Server identity, fetched once per client lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Version string as reported, e.g. `8.20.1`.
    pub version: String,
    pub version_numbers: VersionTriple,
    pub build_number: u64,
    /// `Server` or `DataCenter` as reported by the instance.
    pub deployment_type: String,
    pub base_url: String,
    pub server_title: String,
}

impl ServerInfo {
    fn from_response(response: ServerInfoResponse, fallback_base_url: &str) -> Self {
        let version_numbers = VersionTriple::from_numbers(&response.version_numbers)
            .or_else(|| VersionTriple::parse(&response.version))
            .unwrap_or_default();

        Self {
            version: response.version,
            version_numbers,
            build_number: response.build_number.unwrap_or(0),
            deployment_type: response
                .deployment_type
                .unwrap_or_else(|| "Server".to_string()),
            base_url: response
                .base_url
                .unwrap_or_else(|| fallback_base_url.to_string()),
            server_title: response.server_title.unwrap_or_else(|| "JIRA".to_string()),
        }
    }
}

/// REST API generation used for the core endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiVersion {
    /// `/rest/api/2`, the only generation self-hosted deployments serve.
    V2,
}

impl ApiVersion {
    pub fn path_prefix(&self) -> &'static str {
        match self {
            ApiVersion::V2 => "/rest/api/2",
        }
    }
}

/// Markup dialect a deployment accepts for rich-text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkupDialect {
    /// Line-oriented wiki markup.
    Wiki,
    /// Structured rich-text document tree.
    RichTextTree,
}

/// Feature flags derived from the server version.
///
/// Only describes what the protocol can carry, not what a given project's
/// fields contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Bearer authentication with personal access tokens.
    pub personal_access_tokens: bool,
    /// Structured rich-text bodies. Constant for this deployment family.
    pub rich_text: bool,
    /// Bulk create/update endpoints.
    pub bulk_operations: bool,
    /// `/rest/agile/1.0` boards.
    pub agile_api: bool,
    /// Sprint endpoints under the agile API.
    pub sprints: bool,
    /// Per-issue-type creation metadata with field schemas.
    pub custom_field_schema: bool,
    /// Workflow transition properties.
    pub workflow_properties: bool,
    pub api_version: ApiVersion,
    pub markup: MarkupDialect,
}

/// Version-gated flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    PersonalAccessTokens,
    BulkOperations,
    AgileApi,
    Sprints,
    CustomFieldSchema,
    WorkflowProperties,
}

/// `(flag, required major, required minor)`.
const CAPABILITY_TABLE: &[(Gate, u32, u32)] = &[
    (Gate::PersonalAccessTokens, 8, 14),
    (Gate::BulkOperations, 8, 0),
    (Gate::AgileApi, 7, 0),
    (Gate::Sprints, 7, 0),
    (Gate::CustomFieldSchema, 8, 4),
    (Gate::WorkflowProperties, 8, 10),
];

/// `(major, minor) >= (required_major, required_minor)`, lexicographically.
pub fn check_version(major: u32, minor: u32, required_major: u32, required_minor: u32) -> bool {
    (major, minor) >= (required_major, required_minor)
}

impl Capabilities {
    /// Derive capabilities from a version. Versions below
    /// [`MIN_SUPPORTED_MAJOR`] get the oldest supported feature set.
    pub fn for_version(version: VersionTriple) -> Self {
        let (major, minor) = if version.major < MIN_SUPPORTED_MAJOR {
            (MIN_SUPPORTED_MAJOR, 0)
        } else {
            (version.major, version.minor)
        };

        let gate = |wanted: Gate| {
            CAPABILITY_TABLE
                .iter()
                .find(|(g, _, _)| *g == wanted)
                .map(|(_, req_major, req_minor)| check_version(major, minor, *req_major, *req_minor))
                .unwrap_or(false)
        };

        Self {
            personal_access_tokens: gate(Gate::PersonalAccessTokens),
            rich_text: false,
            bulk_operations: gate(Gate::BulkOperations),
            agile_api: gate(Gate::AgileApi),
            sprints: gate(Gate::Sprints),
            custom_field_schema: gate(Gate::CustomFieldSchema),
            workflow_properties: gate(Gate::WorkflowProperties),
            api_version: ApiVersion::V2,
            markup: MarkupDialect::Wiki,
        }
    }

    /// Derive capabilities from server identity.
    pub fn from_server_info(info: &ServerInfo) -> Self {
        Self::for_version(info.version_numbers)
    }
}

/// Result of a detection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub server_info: ServerInfo,
    pub capabilities: Capabilities,
    /// Non-fatal notice, set for servers older than [`MIN_SUPPORTED_MAJOR`].
    pub warning: Option<String>,
}

impl Detection {
    /// Build a detection result from fetched server identity.
    pub fn from_server_info(server_info: ServerInfo) -> Self {
        let capabilities = Capabilities::from_server_info(&server_info);
        let warning = (server_info.version_numbers.major < MIN_SUPPORTED_MAJOR).then(|| {
            format!(
                "JIRA {} is older than the oldest supported major version {}; \
                 assuming the {}.0 feature set",
                server_info.version, MIN_SUPPORTED_MAJOR, MIN_SUPPORTED_MAJOR
            )
        });
        Self {
            server_info,
            capabilities,
            warning,
        }
    }
}

/// Fetch server identity and derive capabilities.
#[instrument(skip(requester))]
pub async fn detect(requester: &Requester) -> Result<Detection> {
    let response: ServerInfoResponse = requester
        .request_json(SERVER_INFO_ENDPOINT, &RequestOptions::get().skip_cache())
        .await?;

    let detection = Detection::from_server_info(ServerInfo::from_response(
        response,
        requester.base_url(),
    ));

    info!(
        version = %detection.server_info.version,
        deployment = %detection.server_info.deployment_type,
        "Detected JIRA server"
    );
    if let Some(warning) = &detection.warning {
        warn!("{}", warning);
    }
    Ok(detection)
}
