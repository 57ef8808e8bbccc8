//! Boards and sprints through `/rest/agile/1.0`.
//!
//! The agile API ships with JIRA Software only. Servers whose capabilities
//! lack it get empty results without a request being sent.

use tracing::{debug, info, instrument, warn};

use super::capabilities::Capabilities;
use super::client::{degrade, JiraServerClient};
use super::error::{ApiError, Result};
use super::issues::MAX_PAGE_SIZE;
use super::model::{Board, SearchResults, Sprint};
use super::normalize;
use super::transport::RequestOptions;
use super::types::{WireBoard, WirePage, WireSearchResult, WireSprint, WireSprintIssues};
use crate::cache::CacheTtl;

const AGILE: &str = "/rest/agile/1.0";

/// Upper bound on pages followed for one listing.
const MAX_PAGES: u32 = 50;

fn supports_agile(capabilities: &Capabilities, needs_sprints: bool) -> bool {
    capabilities.agile_api && (!needs_sprints || capabilities.sprints)
}

/// Errors that mean "nothing here" rather than a failure: a board without
/// sprints answers 400, a server without JIRA Software answers 404.
fn is_absent(error: &ApiError) -> bool {
    matches!(error.status(), Some(400) | Some(404))
}

impl JiraServerClient {
    /// Follow `startAt` pagination until the server reports the last page.
    async fn fetch_all<T>(&self, base: &str, ttl: CacheTtl) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let separator = if base.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut start_at = 0;
        for _ in 0..MAX_PAGES {
            let endpoint = format!("{}{}startAt={}", base, separator, start_at);
            let page: WirePage<T> = self
                .fetch(&endpoint, RequestOptions::get().with_ttl(ttl))
                .await?;
            let count = page.values.len() as u32;
            items.extend(page.values);
            if page.is_last || count == 0 {
                return Ok(items);
            }
            start_at += count;
        }
        warn!("Stopped paging {} after {} pages", base, MAX_PAGES);
        Ok(items)
    }

    async fn agile_available(&self, needs_sprints: bool) -> bool {
        match self.ensure_capabilities().await {
            Ok(caps) if supports_agile(&caps, needs_sprints) => true,
            Ok(_) => {
                info!("Agile API not available on this server");
                false
            }
            Err(e) => {
                warn!("Cannot determine agile support: {}", e);
                false
            }
        }
    }

    /// Boards, optionally limited to one project.
    #[instrument(skip(self))]
    pub async fn get_boards(&self, project: Option<&str>) -> Vec<Board> {
        if !self.agile_available(false).await {
            return Vec::new();
        }
        let base = match project {
            Some(project) => format!(
                "{}/board?projectKeyOrId={}",
                AGILE,
                urlencoding::encode(project)
            ),
            None => format!("{}/board", AGILE),
        };
        match self.fetch_all::<WireBoard>(&base, CacheTtl::Long).await {
            Ok(boards) => boards.into_iter().map(normalize::board).collect(),
            Err(e) if is_absent(&e) => {
                info!("No agile boards available: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("Fetching boards failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Sprints of a board. Kanban boards answer 400; that is an empty list.
    #[instrument(skip(self))]
    pub async fn get_sprints(&self, board_id: u64) -> Vec<Sprint> {
        if !self.agile_available(true).await {
            return Vec::new();
        }
        let base = format!("{}/board/{}/sprint", AGILE, board_id);
        match self.fetch_all::<WireSprint>(&base, CacheTtl::Medium).await {
            Ok(sprints) => sprints.into_iter().map(normalize::sprint).collect(),
            Err(e) if is_absent(&e) => {
                info!("Board {} has no sprints", board_id);
                Vec::new()
            }
            Err(e) => {
                warn!("Fetching sprints failed: {}", e);
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_sprint_issues(
        &self,
        sprint_id: u64,
        start_at: u32,
        max_results: u32,
    ) -> SearchResults {
        if !self.agile_available(true).await {
            return SearchResults::default();
        }
        let endpoint = format!(
            "{}/sprint/{}/issue?startAt={}&maxResults={}",
            AGILE,
            sprint_id,
            start_at,
            max_results.clamp(1, MAX_PAGE_SIZE)
        );
        let result = self
            .fetch::<WireSprintIssues>(&endpoint, RequestOptions::get().with_ttl(CacheTtl::Short))
            .await
            .map(|page| {
                self.normalize_search(WireSearchResult {
                    start_at: page.start_at,
                    max_results: page.max_results,
                    total: page.total,
                    issues: page.issues,
                })
            });
        let results = degrade("Fetching sprint issues", result);
        debug!("Sprint {} has {} issues", sprint_id, results.total);
        results
    }
}
