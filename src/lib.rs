//! jiralink - an adaptive client for JIRA Server and Data Center.
//!
//! The crate detects what a server supports, negotiates credentials, caches
//! responses and converts between inline markup and JIRA wiki markup, behind
//! a single [`api::TicketClient`] interface.

pub mod api;
pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod secrets;
