//! HTTP transport.
//!
//! [`Transport`] executes exactly one HTTP exchange and reports either a
//! response (any status) or a network failure. [`Requester`] sits on top of it:
//! it builds URLs, merges caller and authentication headers, serializes
//! bodies, parses JSON, classifies failures, and applies the retry policy to
//! idempotent requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use super::auth::AuthState;
use super::error::{ApiError, Result};
use super::retry::{Idempotency, RetryPolicy};
use crate::cache::CacheTtl;

/// A fully built HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// A received HTTP response, successful or not.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes a single HTTP exchange.
///
/// Implementations must not retry and must not interpret the status code;
/// `Err` is reserved for requests that never produced a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, String>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the HTTP client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("jiralink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: "-".to_string(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, String> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Options for one request.
///
/// Constructors fix the [`Idempotency`] up front; builders adjust the rest.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub idempotency: Idempotency,
    /// Overrides the requester's default policy. For non-idempotent requests
    /// this is the only way to get retries.
    pub retry: Option<RetryPolicy>,
    /// Bypass the response cache for this GET.
    pub skip_cache: bool,
    /// Cache tier for this GET.
    pub ttl: CacheTtl,
}

impl RequestOptions {
    /// Create options with an explicit idempotency classification.
    pub fn new(method: Method, idempotency: Idempotency) -> Self {
        Self {
            method,
            body: None,
            headers: Vec::new(),
            idempotency,
            retry: None,
            skip_cache: false,
            ttl: CacheTtl::default(),
        }
    }

    /// An idempotent GET.
    pub fn get() -> Self {
        Self::new(Method::GET, Idempotency::Idempotent)
    }

    /// A non-idempotent POST with a JSON body.
    pub fn post(body: Value) -> Self {
        Self::new(Method::POST, Idempotency::NonIdempotent).with_body(body)
    }

    /// A non-idempotent PUT with a JSON body.
    pub fn put(body: Value) -> Self {
        Self::new(Method::PUT, Idempotency::NonIdempotent).with_body(body)
    }

    /// A non-idempotent DELETE.
    pub fn delete() -> Self {
        Self::new(Method::DELETE, Idempotency::NonIdempotent)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header. Caller headers win over authentication headers.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn with_ttl(mut self, ttl: CacheTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether this request may be served from the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET && !self.skip_cache
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A JSON document.
    Json(Value),
    /// `204 No Content` or an empty body.
    NoContent,
}

impl Payload {
    /// Decode the payload into `T`.
    pub fn decode<T: DeserializeOwned>(self, endpoint: &str) -> Result<T> {
        let value = match self {
            Payload::Json(value) => value,
            Payload::NoContent => Value::Null,
        };
        serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: format!("Failed to parse response: {}", e),
        })
    }

    /// The JSON value, if any.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::NoContent => None,
        }
    }
}

/// Builds and sends requests against one JIRA base URL.
pub struct Requester {
    transport: Arc<dyn Transport>,
    base_url: String,
    auth: Arc<AuthState>,
    default_retry: RetryPolicy,
}

impl std::fmt::Debug for Requester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("default_retry", &self.default_retry)
            .finish()
    }
}

impl Requester {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: &str,
        auth: Arc<AuthState>,
        default_retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            base_url: normalize_base_url(base_url),
            auth,
            default_retry,
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request to `endpoint` (a path starting with `/`).
    #[instrument(skip(self, options), fields(method = %options.method))]
    pub async fn request(&self, endpoint: &str, options: &RequestOptions) -> Result<Payload> {
        let policy = match (options.idempotency, &options.retry) {
            (_, Some(policy)) => policy.clone(),
            (Idempotency::Idempotent, None) => self.default_retry.clone(),
            (Idempotency::NonIdempotent, None) => RetryPolicy::none(),
        };

        policy.run(|| self.send_once(endpoint, options)).await
    }

    /// Send a request and decode the JSON body into `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.request(endpoint, options).await?.decode(endpoint)
    }

    async fn send_once(&self, endpoint: &str, options: &RequestOptions) -> Result<Payload> {
        let method = options.method.as_str();
        let request = HttpRequest {
            method: options.method.clone(),
            url: format!("{}{}", self.base_url, endpoint),
            headers: self.merge_headers(options),
            body: options.body.as_ref().map(Value::to_string),
        };

        debug!("{} {}", method, endpoint);
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|message| ApiError::network(method, endpoint, message))?;

        if !response.is_success() {
            debug!("Error response body: {}", response.body);
            return Err(ApiError::from_response(
                method,
                endpoint,
                response.status,
                &response.status_text,
                response.body,
            ));
        }

        if response.status == 204 || response.body.trim().is_empty() {
            trace!("{} {} returned no content", method, endpoint);
            return Ok(Payload::NoContent);
        }

        serde_json::from_str(&response.body)
            .map(Payload::Json)
            .map_err(|e| ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Authentication and content headers first, then caller headers, which
    /// replace any default with the same name.
    fn merge_headers(&self, options: &RequestOptions) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                header::AUTHORIZATION.as_str().to_string(),
                self.auth.header_value(),
            ),
            (header::ACCEPT.as_str().to_string(), "application/json".to_string()),
        ];
        if options.body.is_some() {
            headers.push((
                header::CONTENT_TYPE.as_str().to_string(),
                "application/json".to_string(),
            ));
        }

        for (name, value) in &options.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        headers
    }
}

/// Normalize the base URL by removing trailing slashes.
fn normalize_base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    // Warn if not HTTPS (but don't enforce for localhost/testing)
    if !url.starts_with("https://") && !url.contains("localhost") && !url.contains("127.0.0.1") {
        warn!("URL does not use HTTPS: {}. This is insecure for production use.", url);
    }

    url.to_string()
}
