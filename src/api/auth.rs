//! Authentication handling for the JIRA API.
//!
//! Self-hosted JIRA accepts HTTP basic credentials everywhere and, from 8.14
//! onward, personal access tokens as bearer credentials. Which one a given
//! secret works with is not known up front, so [`AuthNegotiator`] probes
//! `GET /myself` once per client lifetime and locks in the first scheme that
//! returns a user.

use std::fmt;
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::header;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::capabilities::Capabilities;
use super::retry::RetryPolicy;
use super::transport::{RequestOptions, Requester};

/// Probe endpoint: cheap, idempotent, requires authentication.
pub const PROBE_ENDPOINT: &str = "/rest/api/2/myself";

/// The credential scheme in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Negotiation has not locked in a scheme; basic headers are sent.
    #[default]
    Unresolved,
    /// `Authorization: Bearer <token>`.
    Token,
    /// `Authorization: Basic base64(user:secret)`.
    Basic,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Unresolved => write!(f, "unresolved"),
            AuthMethod::Token => write!(f, "token"),
            AuthMethod::Basic => write!(f, "basic"),
        }
    }
}

/// Username and secret (password or personal access token).
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: &str, secret: &str) -> Self {
        Self {
            username: username.to_string(),
            secret: secret.to_string(),
        }
    }

    /// Get the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The complete "Basic ..." header value.
    pub fn basic_header(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.secret);
        format!("Basic {}", BASE64.encode(credentials.as_bytes()))
    }

    /// The complete "Bearer ..." header value.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.secret)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Credentials plus the negotiated scheme, shared with the requester.
#[derive(Debug)]
pub struct AuthState {
    credentials: Credentials,
    method: Mutex<AuthMethod>,
}

impl AuthState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            method: Mutex::new(AuthMethod::Unresolved),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The current scheme.
    pub fn method(&self) -> AuthMethod {
        *self.method.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock in a scheme. Only succeeds while the method is unresolved.
    pub fn lock_in(&self, method: AuthMethod) -> bool {
        let mut current = self.method.lock().unwrap_or_else(|e| e.into_inner());
        if *current != AuthMethod::Unresolved {
            return false;
        }
        *current = method;
        true
    }

    /// Forget the negotiated scheme, for an explicit client reset.
    pub fn reset(&self) {
        *self.method.lock().unwrap_or_else(|e| e.into_inner()) = AuthMethod::Unresolved;
    }

    /// Authorization header for the current scheme.
    pub fn header_value(&self) -> String {
        match self.method() {
            AuthMethod::Token => self.credentials.bearer_header(),
            AuthMethod::Basic | AuthMethod::Unresolved => self.credentials.basic_header(),
        }
    }
}

/// Negotiation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Unresolved,
    ProbingToken,
    ProbingBasic,
    ConfirmedToken,
    ConfirmedBasic,
    /// Both probes were rejected, or the server was unreachable.
    Exhausted,
}

/// What a probe learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The server returned a user for this scheme.
    Accepted { username: String },
    /// The scheme was refused or no user came back.
    Rejected,
    /// No response was received.
    Unreachable,
}

/// Run-once authentication negotiation.
pub struct AuthNegotiator<'a> {
    requester: &'a Requester,
    auth: &'a AuthState,
    state: NegotiationState,
}

impl<'a> AuthNegotiator<'a> {
    pub fn new(requester: &'a Requester, auth: &'a AuthState) -> Self {
        Self {
            requester,
            auth,
            state: NegotiationState::Unresolved,
        }
    }

    /// Current state.
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Probe schemes in capability-informed order and lock in the first that
    /// works. Never fails: if nothing works the method stays unresolved and
    /// the next real call reports the authentication error.
    #[instrument(skip(self, capabilities))]
    pub async fn negotiate(&mut self, capabilities: &Capabilities) -> AuthMethod {
        if capabilities.personal_access_tokens {
            self.state = NegotiationState::ProbingToken;
            let header = self.auth.credentials().bearer_header();
            match self.probe(header).await {
                ProbeOutcome::Accepted { username } => {
                    return self.confirm(AuthMethod::Token, &username);
                }
                ProbeOutcome::Unreachable => {
                    warn!("Token probe got no response; leaving authentication unresolved");
                    self.state = NegotiationState::Exhausted;
                    return self.auth.method();
                }
                ProbeOutcome::Rejected => {
                    debug!("Token probe rejected, falling back to basic credentials");
                }
            }
        }

        self.state = NegotiationState::ProbingBasic;
        let header = self.auth.credentials().basic_header();
        match self.probe(header).await {
            ProbeOutcome::Accepted { username } => self.confirm(AuthMethod::Basic, &username),
            outcome => {
                warn!(?outcome, "No authentication scheme accepted; using basic headers");
                self.state = NegotiationState::Exhausted;
                self.auth.method()
            }
        }
    }

    fn confirm(&mut self, method: AuthMethod, username: &str) -> AuthMethod {
        self.state = match method {
            AuthMethod::Token => NegotiationState::ConfirmedToken,
            _ => NegotiationState::ConfirmedBasic,
        };
        if !self.auth.lock_in(method) {
            debug!("Authentication method already locked in");
        }
        info!(%method, user = %username, "Authentication confirmed");
        self.auth.method()
    }

    async fn probe(&self, authorization: String) -> ProbeOutcome {
        let options = RequestOptions::get()
            .skip_cache()
            .with_retry(RetryPolicy::none())
            .with_header(header::AUTHORIZATION.as_str(), authorization);

        match self.requester.request(PROBE_ENDPOINT, &options).await {
            Ok(payload) => match payload.into_json().as_ref().and_then(probe_username) {
                Some(username) => ProbeOutcome::Accepted { username },
                None => ProbeOutcome::Rejected,
            },
            Err(e) if e.is_network() => ProbeOutcome::Unreachable,
            Err(e) => {
                debug!("Probe rejected: {}", e);
                ProbeOutcome::Rejected
            }
        }
    }
}

/// Extract an identity from a `/myself` body; `None` if it holds no user.
fn probe_username(body: &Value) -> Option<String> {
    ["name", "key", "accountId"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::capabilities::VersionTriple;
    use crate::api::transport::testing::ScriptedTransport;
    use std::sync::Arc;

    fn setup(transport: Arc<ScriptedTransport>) -> (Requester, Arc<AuthState>) {
        let auth = Arc::new(AuthState::new(Credentials::new("jdoe", "s3cret")));
        let requester = Requester::new(
            transport,
            "http://localhost:8080",
            auth.clone(),
            RetryPolicy::none(),
        );
        (requester, auth)
    }

    fn authorization_of(transport: &ScriptedTransport, index: usize) -> String {
        transport.requests.lock().unwrap()[index]
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
            .map(|(_, v)| v.clone())
            .unwrap()
    }

    #[test]
    fn test_basic_header() {
        let header = Credentials::new("user", "api_token_here").basic_header();
        let encoded = header.strip_prefix("Basic ").unwrap();
        let decoded = String::from_utf8(BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, "user:api_token_here");
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(Credentials::new("u", "pat").bearer_header(), "Bearer pat");
    }

    #[test]
    fn test_credentials_debug_does_not_expose_secret() {
        let creds = Credentials::new("user", "secret_token");
        let debug_output = format!("{:?}", creds);
        assert!(!debug_output.contains("secret_token"));
    }

    #[test]
    fn test_auth_state_locks_once() {
        let state = AuthState::new(Credentials::new("u", "s"));
        assert_eq!(state.method(), AuthMethod::Unresolved);
        assert!(state.header_value().starts_with("Basic "));

        assert!(state.lock_in(AuthMethod::Token));
        assert!(!state.lock_in(AuthMethod::Basic));
        assert_eq!(state.method(), AuthMethod::Token);
        assert_eq!(state.header_value(), "Bearer s");

        state.reset();
        assert_eq!(state.method(), AuthMethod::Unresolved);
    }

    #[test]
    fn test_probe_username() {
        assert_eq!(
            probe_username(&serde_json::json!({"name": "jdoe"})),
            Some("jdoe".to_string())
        );
        assert_eq!(probe_username(&serde_json::json!({"name": ""})), None);
        assert_eq!(probe_username(&serde_json::json!({})), None);
    }

    #[tokio::test]
    async fn test_token_accepted() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"name":"jdoe"}"#));
        let (requester, auth) = setup(transport.clone());
        let caps = Capabilities::for_version(VersionTriple::new(8, 20, 0));

        let mut negotiator = AuthNegotiator::new(&requester, &auth);
        assert_eq!(negotiator.negotiate(&caps).await, AuthMethod::Token);
        assert_eq!(negotiator.state(), NegotiationState::ConfirmedToken);
        assert_eq!(transport.calls(), 1);
        assert_eq!(authorization_of(&transport, 0), "Bearer s3cret");
    }

    #[tokio::test]
    async fn test_token_without_user_falls_back_to_basic() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, "{}")
                .respond(200, r#"{"name":"jdoe"}"#),
        );
        let (requester, auth) = setup(transport.clone());
        let caps = Capabilities::for_version(VersionTriple::new(8, 20, 0));

        let mut negotiator = AuthNegotiator::new(&requester, &auth);
        assert_eq!(negotiator.negotiate(&caps).await, AuthMethod::Basic);
        assert_eq!(negotiator.state(), NegotiationState::ConfirmedBasic);
        assert_eq!(transport.calls(), 2);
        assert!(authorization_of(&transport, 1).starts_with("Basic "));
        assert!(auth.header_value().starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_token_401_falls_back_to_basic() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(401, "")
                .respond(200, r#"{"key":"jdoe"}"#),
        );
        let (requester, auth) = setup(transport.clone());
        let caps = Capabilities::for_version(VersionTriple::new(9, 0, 0));

        let mut negotiator = AuthNegotiator::new(&requester, &auth);
        assert_eq!(negotiator.negotiate(&caps).await, AuthMethod::Basic);
    }

    #[tokio::test]
    async fn test_old_server_skips_token_probe() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, r#"{"name":"jdoe"}"#));
        let (requester, auth) = setup(transport.clone());
        let caps = Capabilities::for_version(VersionTriple::new(8, 13, 0));

        let mut negotiator = AuthNegotiator::new(&requester, &auth);
        assert_eq!(negotiator.negotiate(&caps).await, AuthMethod::Basic);
        assert_eq!(transport.calls(), 1);
        assert!(authorization_of(&transport, 0).starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_both_rejected_leaves_unresolved() {
        let transport = Arc::new(ScriptedTransport::new().respond(401, ""));
        let (requester, auth) = setup(transport.clone());
        let caps = Capabilities::for_version(VersionTriple::new(8, 20, 0));

        let mut negotiator = AuthNegotiator::new(&requester, &auth);
        assert_eq!(negotiator.negotiate(&caps).await, AuthMethod::Unresolved);
        assert_eq!(negotiator.state(), NegotiationState::Exhausted);
        assert_eq!(transport.calls(), 2);
        assert!(auth.header_value().starts_with("Basic "));
    }

    #[tokio::test]
    async fn test_unreachable_token_probe_stops() {
        let transport = Arc::new(ScriptedTransport::new().fail("connection reset"));
        let (requester, auth) = setup(transport.clone());
        let caps = Capabilities::for_version(VersionTriple::new(8, 20, 0));

        let mut negotiator = AuthNegotiator::new(&requester, &auth);
        assert_eq!(negotiator.negotiate(&caps).await, AuthMethod::Unresolved);
        assert_eq!(transport.calls(), 1);
    }
}
