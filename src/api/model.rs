//! Deployment-agnostic entities returned by the client.
//!
//! Wire shapes never cross the client boundary; everything a caller sees is
//! one of these types.

use std::fmt;

use serde::Serialize;

use crate::convert::RichTextDocument;

/// A user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct User {
    /// Login name (Server) or account id (newer Data Center).
    pub id: String,
    pub display_name: String,
    pub email: Option<String>,
    pub active: bool,
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Coarse workflow position of a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    ToDo,
    InProgress,
    Done,
    #[default]
    Unknown,
}

impl StatusCategory {
    /// Map a JIRA status-category key (`new`, `indeterminate`, `done`).
    pub fn from_key(key: &str) -> Self {
        match key {
            "new" => StatusCategory::ToDo,
            "indeterminate" => StatusCategory::InProgress,
            "done" => StatusCategory::Done,
            _ => StatusCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Status {
    pub id: String,
    pub name: String,
    pub category: StatusCategory,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Priority {
    pub id: String,
    pub name: String,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
    pub project_type: Option<String>,
    pub lead: Option<User>,
}

/// A workflow transition available from the issue's current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    pub to: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: String,
    /// Body in inline markup.
    pub body: String,
    pub author: Option<User>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

/// Which side of a link the other issue sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// "this issue <outward> other", e.g. "blocks".
    Outward,
    /// "this issue <inward> other", e.g. "is blocked by".
    Inward,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueLinkType {
    pub id: String,
    pub name: String,
    pub inward: String,
    pub outward: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueLink {
    pub id: String,
    pub link_type: IssueLinkType,
    pub direction: LinkDirection,
    pub other_key: String,
    pub other_summary: Option<String>,
    pub other_status: Option<Status>,
}

impl IssueLink {
    /// Relationship phrase from this issue's point of view.
    pub fn relationship(&self) -> &str {
        match self.direction {
            LinkDirection::Outward => &self.link_type.outward,
            LinkDirection::Inward => &self.link_type.inward,
        }
    }
}

/// A deployment-agnostic issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedIssue {
    pub id: String,
    pub key: String,
    pub summary: String,
    /// Description in inline markup; `None` if empty.
    pub description: Option<String>,
    pub status: Status,
    pub issue_type: String,
    pub priority: Option<Priority>,
    pub assignee: Option<User>,
    pub reporter: Option<User>,
    pub project_key: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub due_date: Option<String>,
    pub links: Vec<IssueLink>,
    /// Populated through the project's field mapping.
    pub story_points: Option<f64>,
    pub epic_key: Option<String>,
    pub sprint: Option<String>,
    /// Browse URL.
    pub url: String,
}

impl NormalizedIssue {
    pub fn assignee_name(&self) -> &str {
        self.assignee
            .as_ref()
            .map(|u| u.display_name.as_str())
            .unwrap_or("Unassigned")
    }
}

impl fmt::Display for NormalizedIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.summary)
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SearchResults {
    pub issues: Vec<NormalizedIssue>,
    pub start_at: u32,
    pub max_results: u32,
    pub total: u32,
}

impl SearchResults {
    /// Check if there are more pages of results.
    pub fn has_more(&self) -> bool {
        self.start_at + (self.issues.len() as u32) < self.total
    }

    /// Get the starting index for the next page.
    pub fn next_start(&self) -> u32 {
        self.start_at + self.issues.len() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    pub id: u64,
    pub name: String,
    pub board_type: String,
}

impl Board {
    pub fn is_scrum(&self) -> bool {
        self.board_type.eq_ignore_ascii_case("scrum")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintState {
    Future,
    Active,
    Closed,
    Unknown,
}

impl SprintState {
    pub fn from_wire(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "future" => SprintState::Future,
            "active" => SprintState::Active,
            "closed" => SprintState::Closed,
            _ => SprintState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: SprintState,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub goal: Option<String>,
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedIssue {
    pub id: String,
    pub key: String,
}

/// Description input for writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    /// Structured rich text.
    RichText(RichTextDocument),
    /// Inline markup as a developer would type it.
    Markup(String),
}

impl From<&str> for Description {
    fn from(markup: &str) -> Self {
        Description::Markup(markup.to_string())
    }
}

impl From<RichTextDocument> for Description {
    fn from(doc: RichTextDocument) -> Self {
        Description::RichText(doc)
    }
}

/// Input for [`crate::api::TicketClient::create_issue`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateIssueRequest {
    pub project_key: String,
    pub issue_type: String,
    pub summary: String,
    pub description: Option<Description>,
    pub priority: Option<String>,
    /// Login name of the assignee.
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    /// Needs a discovered "story points" field; dropped otherwise.
    pub story_points: Option<f64>,
    /// Needs a discovered "epic link" field; dropped otherwise.
    pub epic_key: Option<String>,
    /// Needs a discovered "sprint" field; dropped otherwise.
    pub sprint_id: Option<u64>,
}

impl CreateIssueRequest {
    pub fn new(project_key: &str, issue_type: &str, summary: &str) -> Self {
        Self {
            project_key: project_key.to_string(),
            issue_type: issue_type.to_string(),
            summary: summary.to_string(),
            ..Self::default()
        }
    }
}

/// Input for [`crate::api::TicketClient::update_issue`]. `None` leaves a
/// field unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateIssueRequest {
    pub summary: Option<String>,
    pub description: Option<Description>,
    pub priority: Option<String>,
    /// `Some(None)` unassigns.
    pub assignee: Option<Option<String>>,
    pub labels: Option<Vec<String>>,
    pub story_points: Option<f64>,
    pub epic_key: Option<String>,
}

impl UpdateIssueRequest {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Input for [`crate::api::TicketClient::create_issue_link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssueLink {
    /// Link type name, e.g. "Blocks".
    pub link_type: String,
    /// The issue on the inward side ("is blocked by").
    pub inward_key: String,
    /// The issue on the outward side ("blocks").
    pub outward_key: String,
    /// Optional comment in inline markup.
    pub comment: Option<String>,
}
