//! JIRA API client and types.
//!
//! This module provides the interface for communicating with the JIRA Server
//! and Data Center REST API: transport and retry, server detection, credential
//! negotiation, and the normalized ticket operations built on them.

mod agile;
pub mod auth;
pub mod capabilities;
mod client;
mod error;
pub mod fields;
mod issues;
pub mod jql;
pub mod model;
mod normalize;
pub mod retry;
pub mod transport;
pub(crate) mod types;

pub use auth::{AuthMethod, Credentials};
pub use capabilities::{Capabilities, Detection, ServerInfo, VersionTriple};
pub use client::{create_client, JiraServerClient, TicketClient};
pub use error::{ApiError, Result};
pub use fields::{FieldConcept, FieldMapping};
pub use issues::format_description;
pub use jql::{SearchFilter, SearchQuery};
pub use model::{
    Board, Comment, CreateIssueRequest, CreatedIssue, Description, IssueLink, IssueLinkType,
    LinkDirection, NewIssueLink, NormalizedIssue, Priority, Project, SearchResults, Sprint,
    SprintState, Status, StatusCategory, Transition, UpdateIssueRequest, User,
};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
