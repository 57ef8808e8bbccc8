//! JIRA Server REST API v2 wire types.
//!
//! These mirror response bodies as sent by self-hosted JIRA and never leave
//! the client: [`super::normalize`] turns them into the public model.
//! Everything optional on some server versions is `#[serde(default)]`.

use serde::Deserialize;
use serde_json::{Map, Value};

fn default_true() -> bool {
    true
}

/// Returned by `GET /rest/api/2/serverInfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfoResponse {
    #[serde(default)]
    pub base_url: Option<String>,
    pub version: String,
    #[serde(default)]
    pub version_numbers: Vec<u32>,
    #[serde(default)]
    pub deployment_type: Option<String>,
    #[serde(default)]
    pub build_number: Option<u64>,
    #[serde(default)]
    pub server_title: Option<String>,
}

/// A user. Server identifies users by `name`/`key`; `accountId` only
/// appears on newer Data Center builds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Returned by `GET /rest/api/2/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSearchResult {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<WireIssue>,
}

/// Returned by `GET /rest/api/2/issue/{key}` or inside search results.
#[derive(Debug, Clone, Deserialize)]
pub struct WireIssue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
    pub fields: WireIssueFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIssueFields {
    #[serde(default)]
    pub summary: String,
    /// Wiki markup string on Server; a rich-text document if a plugin
    /// renders it.
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub status: Option<WireStatus>,
    #[serde(default)]
    pub issuetype: Option<WireIssueType>,
    #[serde(default)]
    pub priority: Option<WirePriority>,
    #[serde(default)]
    pub assignee: Option<WireUser>,
    #[serde(default)]
    pub reporter: Option<WireUser>,
    #[serde(default)]
    pub project: Option<WireProject>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<WireComponent>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub duedate: Option<String>,
    #[serde(default)]
    pub issuelinks: Vec<WireIssueLink>,
    #[serde(default)]
    pub comment: Option<WireCommentPage>,
    /// `customfield_*` and anything else the server sends.
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStatus {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status_category: Option<WireStatusCategory>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStatusCategory {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireIssueType {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subtask: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WirePriority {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProject {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_type_key: Option<String>,
    #[serde(default)]
    pub lead: Option<WireUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireComponent {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// An entry of `fields.issuelinks`. Exactly one side is present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireIssueLink {
    pub id: String,
    #[serde(rename = "type")]
    pub link_type: WireIssueLinkType,
    #[serde(default)]
    pub inward_issue: Option<WireLinkedIssue>,
    #[serde(default)]
    pub outward_issue: Option<WireLinkedIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireIssueLinkType {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub inward: String,
    #[serde(default)]
    pub outward: String,
}

/// The abbreviated issue embedded in a link.
#[derive(Debug, Clone, Deserialize)]
pub struct WireLinkedIssue {
    pub key: String,
    #[serde(default)]
    pub fields: Option<WireLinkedIssueFields>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireLinkedIssueFields {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: Option<WireStatus>,
}

/// Returned by `GET /rest/api/2/issueLinkType`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLinkTypes {
    #[serde(default)]
    pub issue_link_types: Vec<WireIssueLinkType>,
}

/// Returned by `GET /rest/api/2/issue/{key}/transitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTransitions {
    #[serde(default)]
    pub transitions: Vec<WireTransition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireTransition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub to: Option<WireStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireComment {
    pub id: String,
    /// Wiki markup on Server.
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub author: Option<WireUser>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Returned by `GET /rest/api/2/issue/{key}/comment` and embedded as
/// `fields.comment`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCommentPage {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub comments: Vec<WireComment>,
}

/// Returned by `POST /rest/api/2/issue`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCreatedIssue {
    pub id: String,
    pub key: String,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
}

/// Entry of `GET /rest/api/2/project/{key}/statuses`: statuses grouped by
/// issue type.
#[derive(Debug, Clone, Deserialize)]
pub struct WireIssueTypeStatuses {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub statuses: Vec<WireStatus>,
}

/// A page of the agile API (`/rest/agile/1.0/...`) or of the paged
/// createmeta endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePage<T> {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default = "default_true")]
    pub is_last: bool,
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireBoard {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub board_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSprint {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub complete_date: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub origin_board_id: Option<u64>,
}

/// Returned by `GET /rest/agile/1.0/sprint/{id}/issue`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSprintIssues {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<WireIssue>,
}

/// Legacy `GET /rest/api/2/issue/createmeta?projectKeys=..&expand=projects.issuetypes.fields`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireCreateMeta {
    #[serde(default)]
    pub projects: Vec<WireCreateMetaProject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCreateMetaProject {
    pub key: String,
    #[serde(default)]
    pub issuetypes: Vec<WireCreateMetaIssueType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireCreateMetaIssueType {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Field id to field description.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// Issue type entry of `GET /rest/api/2/issue/createmeta/{project}/issuetypes`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMetaIssueType {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Field entry of `GET /rest/api/2/issue/createmeta/{project}/issuetypes/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMetaField {
    pub field_id: String,
    #[serde(default)]
    pub name: String,
}
