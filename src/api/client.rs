//! The adaptive JIRA Server / Data Center client.
//!
//! [`JiraServerClient`] is composed from a [`Requester`] (transport, auth
//! headers, retry), a [`ResponseCache`] and a [`FieldMappingStore`]. On first
//! use it detects the server version and negotiates the credential scheme,
//! each exactly once; every later call reuses that state until
//! [`TicketClient::reset`].
//!
//! Read operations never fail: errors are logged and surface as `None` or an
//! empty collection. Write operations propagate errors and invalidate cached
//! reads only after the server accepted the change.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::auth::{AuthMethod, AuthNegotiator, AuthState, Credentials};
use super::capabilities::{self, Capabilities, Detection, ServerInfo};
use super::error::{ApiError, Result};
use super::fields::{self, FieldMapping, FieldMappingStore};
use super::jql::SearchQuery;
use super::model::{
    Board, Comment, CreateIssueRequest, CreatedIssue, Description, IssueLink, IssueLinkType,
    NewIssueLink, NormalizedIssue, Priority, Project, SearchResults, Sprint, Status, Transition,
    UpdateIssueRequest, User,
};
use super::retry::RetryPolicy;
use super::transport::{Payload, ReqwestTransport, RequestOptions, Requester, Transport};
use crate::cache::{CacheStats, ResponseCache};
use crate::config::{ClientConfig, ConfigError, DeploymentType};
use crate::error::AppError;
use crate::secrets::SecretStore;

/// Cache patterns dropped after every successful write: list endpoints and
/// anything keyed by issue.
const WRITE_INVALIDATION_PATTERNS: &[&str] = &["/search", "/issue"];

/// The deployment-agnostic ticket operations.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Run detection and negotiation now instead of on the first call.
    async fn initialize(&self) -> Result<()>;

    /// Server identity, once detected.
    fn server_info(&self) -> Option<&ServerInfo>;
    /// Capabilities, once detected.
    fn capabilities(&self) -> Option<&Capabilities>;
    /// Non-fatal detection notice, e.g. for unsupported old versions.
    fn detection_warning(&self) -> Option<&str>;
    fn auth_method(&self) -> AuthMethod;
    /// The discovered custom field mapping for a project, if any.
    fn field_mapping(&self, project: &str) -> Option<FieldMapping>;
    fn cache_stats(&self) -> CacheStats;
    /// Discard detection, negotiation, field mappings and cached responses.
    fn reset(&mut self);

    async fn current_user(&self) -> Result<User>;
    async fn get_issue(&self, key: &str) -> Option<NormalizedIssue>;
    async fn search(&self, query: &SearchQuery, start_at: u32, max_results: u32) -> SearchResults;
    async fn get_transitions(&self, key: &str) -> Vec<Transition>;
    async fn get_comments(&self, key: &str) -> Vec<Comment>;
    async fn get_issue_links(&self, key: &str) -> Vec<IssueLink>;
    async fn get_link_types(&self) -> Vec<IssueLinkType>;
    async fn get_projects(&self) -> Vec<Project>;
    async fn search_users(&self, query: &str) -> Vec<User>;
    async fn get_assignable_users(&self, project: &str) -> Vec<User>;
    /// Statuses used by a project, or all statuses when `project` is `None`.
    async fn get_statuses(&self, project: Option<&str>) -> Vec<Status>;
    async fn get_priorities(&self) -> Vec<Priority>;

    async fn create_issue(&self, request: &CreateIssueRequest) -> Result<CreatedIssue>;
    async fn update_issue(&self, key: &str, update: &UpdateIssueRequest) -> Result<()>;
    async fn delete_issue(&self, key: &str) -> Result<()>;
    async fn execute_transition(&self, key: &str, transition_id: &str) -> Result<()>;
    async fn add_comment(&self, key: &str, body: &Description) -> Result<Comment>;
    async fn create_issue_link(&self, link: &NewIssueLink) -> Result<()>;
    async fn delete_issue_link(&self, link_id: &str) -> Result<()>;

    async fn get_boards(&self, project: Option<&str>) -> Vec<Board>;
    async fn get_sprints(&self, board_id: u64) -> Vec<Sprint>;
    async fn get_sprint_issues(&self, sprint_id: u64, start_at: u32, max_results: u32)
        -> SearchResults;
}

/// Build a client for the configured deployment.
///
/// Only self-hosted deployments are served here; the hosted variant speaks a
/// different API generation and is rejected.
pub fn create_client(
    config: ClientConfig,
    secrets: &dyn SecretStore,
) -> std::result::Result<Box<dyn TicketClient>, AppError> {
    match config.deployment {
        DeploymentType::Server | DeploymentType::DataCenter => {
            Ok(Box::new(JiraServerClient::connect(config, secrets)?))
        }
        DeploymentType::Cloud => {
            Err(ConfigError::UnsupportedDeployment(DeploymentType::Cloud).into())
        }
    }
}

/// Client for JIRA Server and Data Center.
pub struct JiraServerClient {
    config: ClientConfig,
    requester: Requester,
    auth: Arc<AuthState>,
    cache: ResponseCache,
    detection: OnceCell<Detection>,
    negotiated: OnceCell<AuthMethod>,
    field_mappings: FieldMappingStore,
}

impl std::fmt::Debug for JiraServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraServerClient")
            .field("profile", &self.config.name)
            .field("base_url", &self.config.base_url)
            .field("detection", &self.detection.get())
            .field("auth_method", &self.auth.method())
            .finish()
    }
}

impl JiraServerClient {
    /// Create a client, reading the secret for `config.name` from `secrets`.
    #[instrument(skip(config, secrets), fields(profile = %config.name))]
    pub fn connect(config: ClientConfig, secrets: &dyn SecretStore) -> Result<Self> {
        let secret = secrets.get(&config.name)?.ok_or_else(|| {
            ApiError::Keyring(format!(
                "no credentials stored for profile '{}'",
                config.name
            ))
        })?;
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        let transport = ReqwestTransport::new(Duration::from_secs(
            config.settings.request_timeout_secs,
        ))?;
        info!("Creating JIRA client for {}", config.base_url);
        Ok(Self::with_transport(config, &secret, Arc::new(transport)))
    }

    /// Create a client over an explicit transport. Nothing is sent until the
    /// first operation.
    pub fn with_transport(config: ClientConfig, secret: &str, transport: Arc<dyn Transport>) -> Self {
        let auth = Arc::new(AuthState::new(Credentials::new(&config.username, secret)));
        let requester = Requester::new(
            transport,
            &config.base_url,
            auth.clone(),
            RetryPolicy::from_settings(&config.settings.retry),
        );
        let namespace = format!("{}:{}", config.deployment.as_str(), config.name);
        let cache = ResponseCache::new(&namespace, config.settings.cache.clone());

        Self {
            config,
            requester,
            auth,
            cache,
            detection: OnceCell::new(),
            negotiated: OnceCell::new(),
            field_mappings: FieldMappingStore::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        self.requester.base_url()
    }

    /// Detect once, then negotiate once. A failed detection is retried on
    /// the next call; negotiation itself never fails.
    pub(crate) async fn ensure_initialized(&self) -> Result<&Detection> {
        let detection = self
            .detection
            .get_or_try_init(|| capabilities::detect(&self.requester))
            .await?;

        self.negotiated
            .get_or_init(|| async {
                AuthNegotiator::new(&self.requester, &self.auth)
                    .negotiate(&detection.capabilities)
                    .await
            })
            .await;

        Ok(detection)
    }

    pub(crate) async fn ensure_capabilities(&self) -> Result<Capabilities> {
        Ok(self.ensure_initialized().await?.capabilities)
    }

    /// GET through the response cache.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.ensure_initialized().await?;

        let key = self.cache.key_for(endpoint);
        if options.is_cacheable() {
            if let Some(value) = self.cache.get(&key) {
                debug!("Cache hit for {}", endpoint);
                return Payload::Json(value).decode(endpoint);
            }
        }

        let payload = self.requester.request(endpoint, &options).await?;
        if options.is_cacheable() {
            if let (Payload::Json(value), Some(ttl)) =
                (&payload, self.cache.ttl_duration(options.ttl))
            {
                self.cache.set(&key, value.clone(), ttl);
            }
        }
        payload.decode(endpoint)
    }

    /// Send a mutating request. On success, drop cached list and issue
    /// responses plus anything mentioning `touched`.
    pub(crate) async fn write(
        &self,
        endpoint: &str,
        options: RequestOptions,
        touched: &[&str],
    ) -> Result<Payload> {
        self.ensure_initialized().await?;
        let payload = self.requester.request(endpoint, &options).await?;
        self.invalidate_after_write(touched);
        Ok(payload)
    }

    fn invalidate_after_write(&self, touched: &[&str]) {
        let mut removed = 0;
        for pattern in WRITE_INVALIDATION_PATTERNS.iter().chain(touched) {
            if !pattern.is_empty() {
                removed += self.cache.invalidate_by_pattern(pattern);
            }
        }
        debug!("Invalidated {} cached responses after write", removed);
    }

    /// The mapping for `project`, discovering it on first use. Discovery
    /// failures yield an empty mapping that is not remembered.
    pub(crate) async fn ensure_field_mapping(&self, project: &str) -> FieldMapping {
        if let Some(mapping) = self.field_mappings.get(project) {
            return mapping;
        }
        let capabilities = match self.ensure_capabilities().await {
            Ok(capabilities) => capabilities,
            Err(e) => {
                warn!("Cannot discover fields for {}: {}", project, e);
                return FieldMapping::default();
            }
        };
        match fields::discover(&self.requester, &capabilities, project).await {
            Ok(mapping) => {
                self.field_mappings.insert(project, mapping.clone());
                mapping
            }
            Err(e) => {
                warn!("Field discovery for {} failed: {}", project, e);
                FieldMapping::default()
            }
        }
    }

    /// Already discovered mapping, without triggering discovery.
    pub(crate) fn known_field_mapping(&self, project: &str) -> FieldMapping {
        self.field_mappings.get(project).unwrap_or_default()
    }
}

/// Log a failed read and substitute the empty value.
pub(crate) fn degrade<T: Default>(operation: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("{} failed: {}", operation, e);
            T::default()
        }
    }
}

#[async_trait]
impl TicketClient for JiraServerClient {
    async fn initialize(&self) -> Result<()> {
        self.ensure_initialized().await.map(|_| ())
    }

    fn server_info(&self) -> Option<&ServerInfo> {
        self.detection.get().map(|d| &d.server_info)
    }

    fn capabilities(&self) -> Option<&Capabilities> {
        self.detection.get().map(|d| &d.capabilities)
    }

    fn detection_warning(&self) -> Option<&str> {
        self.detection.get().and_then(|d| d.warning.as_deref())
    }

    fn auth_method(&self) -> AuthMethod {
        self.auth.method()
    }

    fn field_mapping(&self, project: &str) -> Option<FieldMapping> {
        self.field_mappings.get(project)
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn reset(&mut self) {
        info!("Resetting client state for {}", self.config.name);
        self.detection = OnceCell::new();
        self.negotiated = OnceCell::new();
        self.auth.reset();
        self.field_mappings.clear();
        self.cache.clear();
    }

    async fn current_user(&self) -> Result<User> {
        JiraServerClient::current_user(self).await
    }

    async fn get_issue(&self, key: &str) -> Option<NormalizedIssue> {
        JiraServerClient::get_issue(self, key).await
    }

    async fn search(&self, query: &SearchQuery, start_at: u32, max_results: u32) -> SearchResults {
        JiraServerClient::search(self, query, start_at, max_results).await
    }

    async fn get_transitions(&self, key: &str) -> Vec<Transition> {
        JiraServerClient::get_transitions(self, key).await
    }

    async fn get_comments(&self, key: &str) -> Vec<Comment> {
        JiraServerClient::get_comments(self, key).await
    }

    async fn get_issue_links(&self, key: &str) -> Vec<IssueLink> {
        JiraServerClient::get_issue_links(self, key).await
    }

    async fn get_link_types(&self) -> Vec<IssueLinkType> {
        JiraServerClient::get_link_types(self).await
    }

    async fn get_projects(&self) -> Vec<Project> {
        JiraServerClient::get_projects(self).await
    }

    async fn search_users(&self, query: &str) -> Vec<User> {
        JiraServerClient::search_users(self, query).await
    }

    async fn get_assignable_users(&self, project: &str) -> Vec<User> {
        JiraServerClient::get_assignable_users(self, project).await
    }

    async fn get_statuses(&self, project: Option<&str>) -> Vec<Status> {
        JiraServerClient::get_statuses(self, project).await
    }

    async fn get_priorities(&self) -> Vec<Priority> {
        JiraServerClient::get_priorities(self).await
    }

    async fn create_issue(&self, request: &CreateIssueRequest) -> Result<CreatedIssue> {
        JiraServerClient::create_issue(self, request).await
    }

    async fn update_issue(&self, key: &str, update: &UpdateIssueRequest) -> Result<()> {
        JiraServerClient::update_issue(self, key, update).await
    }

    async fn delete_issue(&self, key: &str) -> Result<()> {
        JiraServerClient::delete_issue(self, key).await
    }

    async fn execute_transition(&self, key: &str, transition_id: &str) -> Result<()> {
        JiraServerClient::execute_transition(self, key, transition_id).await
    }

    async fn add_comment(&self, key: &str, body: &Description) -> Result<Comment> {
        JiraServerClient::add_comment(self, key, body).await
    }

    async fn create_issue_link(&self, link: &NewIssueLink) -> Result<()> {
        JiraServerClient::create_issue_link(self, link).await
    }

    async fn delete_issue_link(&self, link_id: &str) -> Result<()> {
        JiraServerClient::delete_issue_link(self, link_id).await
    }

    async fn get_boards(&self, project: Option<&str>) -> Vec<Board> {
        JiraServerClient::get_boards(self, project).await
    }

    async fn get_sprints(&self, board_id: u64) -> Vec<Sprint> {
        JiraServerClient::get_sprints(self, board_id).await
    }

    async fn get_sprint_issues(
        &self,
        sprint_id: u64,
        start_at: u32,
        max_results: u32,
    ) -> SearchResults {
        JiraServerClient::get_sprint_issues(self, sprint_id, start_at, max_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;
    use crate::config::Settings;
    use crate::secrets::MemorySecretStore;

    const SERVER_INFO: &str = r#"{"version":"8.20.1","versionNumbers":[8,20,1],"deploymentType":"Server","buildNumber":820001}"#;

    fn config(deployment: DeploymentType) -> ClientConfig {
        ClientConfig {
            name: "work".to_string(),
            base_url: "http://localhost:8080".to_string(),
            username: "jdoe".to_string(),
            deployment,
            settings: Settings::default(),
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> JiraServerClient {
        let mut config = config(DeploymentType::Server);
        config.settings.retry.max_retries = 0;
        JiraServerClient::with_transport(config, "secret", transport)
    }

    #[test]
    fn test_create_client_rejects_cloud() {
        let secrets = MemorySecretStore::with_secret("work", "secret");
        let result = create_client(config(DeploymentType::Cloud), &secrets);
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::UnsupportedDeployment(
                DeploymentType::Cloud
            )))
        ));
    }

    #[test]
    fn test_connect_requires_secret() {
        let secrets = MemorySecretStore::new();
        let result = JiraServerClient::connect(config(DeploymentType::Server), &secrets);
        assert!(matches!(result, Err(ApiError::Keyring(_))));
    }

    #[test]
    fn test_connect_rejects_invalid_url() {
        let secrets = MemorySecretStore::with_secret("work", "secret");
        let mut config = config(DeploymentType::Server);
        config.base_url = "http://".to_string();
        let result = JiraServerClient::connect(config, &secrets);
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_initialize_detects_and_negotiates_once() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, SERVER_INFO)
                .respond(200, r#"{"name":"jdoe"}"#),
        );
        let client = client(transport.clone());

        assert!(client.server_info().is_none());
        client.initialize().await.unwrap();
        client.initialize().await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(client.auth_method(), AuthMethod::Token);
        assert!(client.capabilities().unwrap().personal_access_tokens);
        assert_eq!(client.server_info().unwrap().build_number, 820001);
        assert!(client.detection_warning().is_none());
    }

    #[tokio::test]
    async fn test_failed_detection_is_retried() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail("connection refused")
                .respond(200, SERVER_INFO)
                .respond(200, r#"{"name":"jdoe"}"#),
        );
        let client = client(transport.clone());

        assert!(client.initialize().await.is_err());
        assert!(client.server_info().is_none());
        client.initialize().await.unwrap();
        assert!(client.server_info().is_some());
    }

    #[tokio::test]
    async fn test_reset_forgets_state() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, SERVER_INFO)
                .respond(200, r#"{"name":"jdoe"}"#)
                .respond(200, SERVER_INFO)
                .respond(200, r#"{"name":"jdoe"}"#),
        );
        let mut client = client(transport.clone());
        client.initialize().await.unwrap();

        TicketClient::reset(&mut client);

        assert!(client.server_info().is_none());
        assert_eq!(client.auth_method(), AuthMethod::Unresolved);
        client.initialize().await.unwrap();
        assert_eq!(transport.calls(), 4);
    }

    #[test]
    fn test_degrade() {
        assert_eq!(degrade::<Vec<u32>>("op", Ok(vec![1])), vec![1]);
        let err = ApiError::network("GET", "/x", "down");
        assert!(degrade::<Vec<u32>>("op", Err(err)).is_empty());
    }
}
