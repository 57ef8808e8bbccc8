//! Issue, search, workflow, comment, link and metadata operations.

use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use super::capabilities::Capabilities;
use super::client::{degrade, JiraServerClient};
use super::error::Result;
use super::fields::FieldMapping;
use super::jql::SearchQuery;
use super::model::{
    Comment, CreateIssueRequest, CreatedIssue, Description, IssueLink, IssueLinkType,
    NewIssueLink, NormalizedIssue, Priority, Project, SearchResults, Status, Transition,
    UpdateIssueRequest, User,
};
use super::normalize;
use super::transport::RequestOptions;
use super::types::{
    WireComment, WireCommentPage, WireCreatedIssue, WireIssue, WireIssueTypeStatuses,
    WireLinkTypes, WirePriority, WireProject, WireSearchResult, WireStatus, WireTransitions,
    WireUser,
};
use crate::cache::CacheTtl;
use crate::convert;

/// JIRA caps page size at 100.
pub const MAX_PAGE_SIZE: u32 = 100;

const API: &str = "/rest/api/2";

/// Render a description for the wire. Servers without structured rich text
/// receive wiki markup; structured input is degraded first.
pub fn format_description(description: &Description, capabilities: &Capabilities) -> Value {
    match (description, capabilities.rich_text) {
        (Description::RichText(doc), true) => doc.to_adf(),
        (Description::RichText(doc), false) => Value::String(convert::tree_to_wiki(doc)),
        (Description::Markup(text), _) => Value::String(convert::markup_to_wiki(text)),
    }
}

/// Project key of an issue key (`PROJ-12` → `PROJ`).
fn project_of(key: &str) -> &str {
    key.rsplit_once('-').map(|(project, _)| project).unwrap_or(key)
}

fn issue_endpoint(key: &str) -> String {
    format!("{}/issue/{}", API, urlencoding::encode(key))
}

impl JiraServerClient {
    fn normalize_issue(&self, wire: WireIssue) -> NormalizedIssue {
        let project = wire
            .fields
            .project
            .as_ref()
            .map(|p| p.key.clone())
            .unwrap_or_else(|| project_of(&wire.key).to_string());
        let mapping = self.known_field_mapping(&project);
        normalize::issue(wire, &mapping, self.base_url())
    }

    pub(crate) fn normalize_search(&self, result: WireSearchResult) -> SearchResults {
        SearchResults {
            start_at: result.start_at,
            max_results: result.max_results,
            total: result.total,
            issues: result
                .issues
                .into_iter()
                .map(|issue| self.normalize_issue(issue))
                .collect(),
        }
    }

    /// The authenticated user. Errors propagate so callers can prompt for
    /// new credentials.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User> {
        let user: WireUser = self
            .fetch(&format!("{}/myself", API), RequestOptions::get().skip_cache())
            .await?;
        Ok(normalize::user(user))
    }

    /// Get a single issue. A missing issue is `None`, not an error.
    #[instrument(skip(self), fields(issue_key = %key))]
    pub async fn get_issue(&self, key: &str) -> Option<NormalizedIssue> {
        match self
            .fetch::<WireIssue>(&issue_endpoint(key), RequestOptions::get())
            .await
        {
            Ok(issue) => Some(self.normalize_issue(issue)),
            Err(e) if e.is_not_found() => {
                debug!("Issue {} does not exist", key);
                None
            }
            Err(e) => {
                warn!("Fetching issue {} failed: {}", key, e);
                None
            }
        }
    }

    /// Search with raw JQL or a structured filter.
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &SearchQuery, start_at: u32, max_results: u32) -> SearchResults {
        let jql = query.to_jql();
        debug!(jql = %jql, "Searching issues");
        let endpoint = format!(
            "{}/search?jql={}&startAt={}&maxResults={}",
            API,
            urlencoding::encode(&jql),
            start_at,
            max_results.clamp(1, MAX_PAGE_SIZE)
        );

        let result = self
            .fetch::<WireSearchResult>(&endpoint, RequestOptions::get().with_ttl(CacheTtl::Short))
            .await
            .map(|r| self.normalize_search(r));
        let results = degrade("Search", result);
        debug!("Found {} issues (total: {})", results.issues.len(), results.total);
        results
    }

    #[instrument(skip(self), fields(issue_key = %key))]
    pub async fn get_transitions(&self, key: &str) -> Vec<Transition> {
        let endpoint = format!("{}/transitions", issue_endpoint(key));
        let result = self
            .fetch::<WireTransitions>(&endpoint, RequestOptions::get().with_ttl(CacheTtl::Short))
            .await
            .map(|t| t.transitions.into_iter().map(normalize::transition).collect());
        degrade("Fetching transitions", result)
    }

    #[instrument(skip(self), fields(issue_key = %key))]
    pub async fn get_comments(&self, key: &str) -> Vec<Comment> {
        let endpoint = format!("{}/comment", issue_endpoint(key));
        let result = self
            .fetch::<WireCommentPage>(&endpoint, RequestOptions::get())
            .await
            .map(|page| page.comments.into_iter().map(normalize::comment).collect());
        degrade("Fetching comments", result)
    }

    #[instrument(skip(self), fields(issue_key = %key))]
    pub async fn get_issue_links(&self, key: &str) -> Vec<IssueLink> {
        let endpoint = format!("{}?fields=issuelinks", issue_endpoint(key));
        let result = self
            .fetch::<WireIssue>(&endpoint, RequestOptions::get())
            .await
            .map(|issue| {
                issue
                    .fields
                    .issuelinks
                    .into_iter()
                    .filter_map(normalize::issue_link)
                    .collect()
            });
        degrade("Fetching issue links", result)
    }

    #[instrument(skip(self))]
    pub async fn get_link_types(&self) -> Vec<IssueLinkType> {
        let result = self
            .fetch::<WireLinkTypes>(
                &format!("{}/issueLinkType", API),
                RequestOptions::get().with_ttl(CacheTtl::Long),
            )
            .await
            .map(|t| t.issue_link_types.into_iter().map(normalize::link_type).collect());
        degrade("Fetching link types", result)
    }

    #[instrument(skip(self))]
    pub async fn get_projects(&self) -> Vec<Project> {
        let result = self
            .fetch::<Vec<WireProject>>(
                &format!("{}/project", API),
                RequestOptions::get().with_ttl(CacheTtl::Long),
            )
            .await
            .map(|projects| projects.into_iter().map(normalize::project).collect());
        degrade("Fetching projects", result)
    }

    #[instrument(skip(self))]
    pub async fn search_users(&self, query: &str) -> Vec<User> {
        let endpoint = format!(
            "{}/user/search?username={}&maxResults=50",
            API,
            urlencoding::encode(query)
        );
        let result = self
            .fetch::<Vec<WireUser>>(&endpoint, RequestOptions::get())
            .await
            .map(|users| users.into_iter().map(normalize::user).collect());
        degrade("Searching users", result)
    }

    #[instrument(skip(self))]
    pub async fn get_assignable_users(&self, project: &str) -> Vec<User> {
        let endpoint = format!(
            "{}/user/assignable/search?project={}&maxResults=200",
            API,
            urlencoding::encode(project)
        );
        let result = self
            .fetch::<Vec<WireUser>>(&endpoint, RequestOptions::get())
            .await
            .map(|users| users.into_iter().map(normalize::user).collect());
        degrade("Fetching assignable users", result)
    }

    /// Statuses of one project (deduplicated across issue types), or every
    /// status on the server.
    #[instrument(skip(self))]
    pub async fn get_statuses(&self, project: Option<&str>) -> Vec<Status> {
        let options = RequestOptions::get().with_ttl(CacheTtl::Long);
        let result = match project {
            Some(project) => {
                let endpoint = format!("{}/project/{}/statuses", API, urlencoding::encode(project));
                self.fetch::<Vec<WireIssueTypeStatuses>>(&endpoint, options)
                    .await
                    .map(|types| {
                        let mut statuses: Vec<Status> = Vec::new();
                        for status in types.into_iter().flat_map(|t| t.statuses) {
                            if !statuses.iter().any(|s| s.id == status.id) {
                                statuses.push(normalize::status(status));
                            }
                        }
                        statuses
                    })
            }
            None => self
                .fetch::<Vec<WireStatus>>(&format!("{}/status", API), options)
                .await
                .map(|statuses| statuses.into_iter().map(normalize::status).collect()),
        };
        degrade("Fetching statuses", result)
    }

    #[instrument(skip(self))]
    pub async fn get_priorities(&self) -> Vec<Priority> {
        let result = self
            .fetch::<Vec<WirePriority>>(
                &format!("{}/priority", API),
                RequestOptions::get().with_ttl(CacheTtl::Long),
            )
            .await
            .map(|priorities| priorities.into_iter().map(normalize::priority).collect());
        degrade("Fetching priorities", result)
    }

    /// Create an issue. Story points, epic and sprint are only sent when the
    /// project declares a matching field.
    #[instrument(skip(self, request), fields(project = %request.project_key))]
    pub async fn create_issue(&self, request: &CreateIssueRequest) -> Result<CreatedIssue> {
        let capabilities = self.ensure_capabilities().await?;

        let mut fields = Map::new();
        fields.insert("project".into(), json!({"key": request.project_key}));
        fields.insert("issuetype".into(), json!({"name": request.issue_type}));
        fields.insert("summary".into(), json!(request.summary));
        if let Some(description) = &request.description {
            fields.insert(
                "description".into(),
                format_description(description, &capabilities),
            );
        }
        if let Some(priority) = &request.priority {
            fields.insert("priority".into(), json!({"name": priority}));
        }
        if let Some(assignee) = &request.assignee {
            fields.insert("assignee".into(), json!({"name": assignee}));
        }
        if !request.labels.is_empty() {
            fields.insert("labels".into(), json!(request.labels));
        }
        if !request.components.is_empty() {
            let components: Vec<Value> = request
                .components
                .iter()
                .map(|name| json!({"name": name}))
                .collect();
            fields.insert("components".into(), Value::Array(components));
        }

        let wants_custom = request.story_points.is_some()
            || request.epic_key.is_some()
            || request.sprint_id.is_some();
        if wants_custom {
            let mapping = self.ensure_field_mapping(&request.project_key).await;
            insert_custom(&mut fields, &mapping, request.story_points, request.epic_key.as_deref(), request.sprint_id);
        }

        let payload = self
            .write(
                &format!("{}/issue", API),
                RequestOptions::post(json!({ "fields": fields })),
                &[],
            )
            .await?;
        let created: WireCreatedIssue = payload.decode("/issue")?;
        info!("Created issue {}", created.key);
        Ok(CreatedIssue {
            id: created.id,
            key: created.key,
        })
    }

    #[instrument(skip(self, update), fields(issue_key = %key))]
    pub async fn update_issue(&self, key: &str, update: &UpdateIssueRequest) -> Result<()> {
        if update.is_empty() {
            debug!("Nothing to update");
            return Ok(());
        }
        let capabilities = self.ensure_capabilities().await?;

        let mut fields = Map::new();
        if let Some(summary) = &update.summary {
            fields.insert("summary".into(), json!(summary));
        }
        if let Some(description) = &update.description {
            fields.insert(
                "description".into(),
                format_description(description, &capabilities),
            );
        }
        if let Some(priority) = &update.priority {
            fields.insert("priority".into(), json!({"name": priority}));
        }
        if let Some(assignee) = &update.assignee {
            let value = match assignee {
                Some(name) => json!({"name": name}),
                None => Value::Null,
            };
            fields.insert("assignee".into(), value);
        }
        if let Some(labels) = &update.labels {
            fields.insert("labels".into(), json!(labels));
        }
        if update.story_points.is_some() || update.epic_key.is_some() {
            let mapping = self.ensure_field_mapping(project_of(key)).await;
            insert_custom(&mut fields, &mapping, update.story_points, update.epic_key.as_deref(), None);
        }

        if fields.is_empty() {
            debug!("Update only touched unmapped fields; nothing sent");
            return Ok(());
        }

        self.write(
            &issue_endpoint(key),
            RequestOptions::put(json!({ "fields": fields })),
            &[key],
        )
        .await?;
        info!("Updated issue {}", key);
        Ok(())
    }

    #[instrument(skip(self), fields(issue_key = %key))]
    pub async fn delete_issue(&self, key: &str) -> Result<()> {
        self.write(&issue_endpoint(key), RequestOptions::delete(), &[key])
            .await?;
        info!("Deleted issue {}", key);
        Ok(())
    }

    #[instrument(skip(self), fields(issue_key = %key))]
    pub async fn execute_transition(&self, key: &str, transition_id: &str) -> Result<()> {
        let endpoint = format!("{}/transitions", issue_endpoint(key));
        let body = json!({"transition": {"id": transition_id}});
        self.write(&endpoint, RequestOptions::post(body), &[key])
            .await?;
        info!("Transitioned issue {} via {}", key, transition_id);
        Ok(())
    }

    #[instrument(skip(self, body), fields(issue_key = %key))]
    pub async fn add_comment(&self, key: &str, body: &Description) -> Result<Comment> {
        let capabilities = self.ensure_capabilities().await?;
        let endpoint = format!("{}/comment", issue_endpoint(key));
        let payload = self
            .write(
                &endpoint,
                RequestOptions::post(json!({"body": format_description(body, &capabilities)})),
                &[key],
            )
            .await?;
        let comment: WireComment = payload.decode(&endpoint)?;
        Ok(normalize::comment(comment))
    }

    #[instrument(skip(self, link), fields(link_type = %link.link_type))]
    pub async fn create_issue_link(&self, link: &NewIssueLink) -> Result<()> {
        let capabilities = self.ensure_capabilities().await?;
        let mut body = json!({
            "type": {"name": link.link_type},
            "inwardIssue": {"key": link.inward_key},
            "outwardIssue": {"key": link.outward_key},
        });
        if let Some(comment) = &link.comment {
            let text = format_description(&Description::Markup(comment.clone()), &capabilities);
            body["comment"] = json!({"body": text});
        }

        self.write(
            &format!("{}/issueLink", API),
            RequestOptions::post(body),
            &[link.inward_key.as_str(), link.outward_key.as_str()],
        )
        .await?;
        info!(
            "Linked {} -[{}]-> {}",
            link.inward_key, link.link_type, link.outward_key
        );
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_issue_link(&self, link_id: &str) -> Result<()> {
        let endpoint = format!("{}/issueLink/{}", API, urlencoding::encode(link_id));
        self.write(&endpoint, RequestOptions::delete(), &[]).await?;
        info!("Deleted issue link {}", link_id);
        Ok(())
    }
}

/// Add mapped custom fields. Concepts without a discovered field are dropped.
fn insert_custom(
    fields: &mut Map<String, Value>,
    mapping: &FieldMapping,
    story_points: Option<f64>,
    epic_key: Option<&str>,
    sprint_id: Option<u64>,
) {
    let values = [
        (mapping.story_points.as_deref(), story_points.map(|p| json!(p)), "story points"),
        (mapping.epic_link.as_deref(), epic_key.map(|k| json!(k)), "epic link"),
        (mapping.sprint.as_deref(), sprint_id.map(|s| json!(s)), "sprint"),
    ];
    for (field, value, concept) in values {
        match (field, value) {
            (Some(field), Some(value)) => {
                fields.insert(field.to_string(), value);
            }
            (None, Some(_)) => debug!("No {} field in this project; omitting", concept),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::capabilities::VersionTriple;
    use crate::convert::{Mark, RichTextDocument, RichTextNode};

    #[test]
    fn test_project_of() {
        assert_eq!(project_of("PROJ-12"), "PROJ");
        assert_eq!(project_of("MY-PROJ-3"), "MY-PROJ");
        assert_eq!(project_of("PROJ"), "PROJ");
    }

    #[test]
    fn test_format_markup_description() {
        let caps = Capabilities::for_version(VersionTriple::new(8, 20, 0));
        let value = format_description(&Description::from("# Title\n**bold**"), &caps);
        assert_eq!(value, json!("h1. Title\n*bold*"));
    }

    #[test]
    fn test_format_rich_text_description_degrades_to_wiki() {
        let caps = Capabilities::for_version(VersionTriple::new(9, 4, 0));
        let doc = RichTextDocument::new(vec![RichTextNode::Paragraph(vec![
            RichTextNode::marked("Note", vec![Mark::Bold]),
            RichTextNode::text(": see logs"),
        ])]);
        let value = format_description(&Description::RichText(doc), &caps);
        assert_eq!(value, json!("*Note*: see logs"));
    }

    #[test]
    fn test_insert_custom_omits_unmapped() {
        let mapping = FieldMapping {
            story_points: Some("customfield_10002".to_string()),
            ..Default::default()
        };
        let mut fields = Map::new();
        insert_custom(&mut fields, &mapping, Some(5.0), Some("PROJ-1"), Some(7));

        assert_eq!(fields.get("customfield_10002"), Some(&json!(5.0)));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_issue_endpoint_encodes_key() {
        assert_eq!(issue_endpoint("PROJ-1"), "/rest/api/2/issue/PROJ-1");
    }
}
