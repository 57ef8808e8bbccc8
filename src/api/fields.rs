//! Per-project discovery of custom field identifiers.
//!
//! Epic link, story points and sprint are custom fields whose ids differ
//! between installations. They are found by scanning a project's creation
//! metadata for field names containing a known label.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::capabilities::Capabilities;
use super::error::Result;
use super::transport::{RequestOptions, Requester};
use super::types::{WireCreateMeta, WireMetaField, WireMetaIssueType, WirePage};

/// A logical concept backed by a custom field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldConcept {
    EpicLink,
    StoryPoints,
    Sprint,
}

impl FieldConcept {
    pub const ALL: [FieldConcept; 3] = [
        FieldConcept::EpicLink,
        FieldConcept::StoryPoints,
        FieldConcept::Sprint,
    ];

    /// Lowercase label searched for in field names.
    pub fn label(self) -> &'static str {
        match self {
            FieldConcept::EpicLink => "epic link",
            FieldConcept::StoryPoints => "story point",
            FieldConcept::Sprint => "sprint",
        }
    }
}

/// Sparse concept → field id map for one project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FieldMapping {
    pub epic_link: Option<String>,
    pub story_points: Option<String>,
    pub sprint: Option<String>,
}

impl FieldMapping {
    pub fn get(&self, concept: FieldConcept) -> Option<&str> {
        match concept {
            FieldConcept::EpicLink => self.epic_link.as_deref(),
            FieldConcept::StoryPoints => self.story_points.as_deref(),
            FieldConcept::Sprint => self.sprint.as_deref(),
        }
    }

    fn slot(&mut self, concept: FieldConcept) -> &mut Option<String> {
        match concept {
            FieldConcept::EpicLink => &mut self.epic_link,
            FieldConcept::StoryPoints => &mut self.story_points,
            FieldConcept::Sprint => &mut self.sprint,
        }
    }

    /// Build a mapping from `(field id, field name)` pairs. The first field
    /// whose name contains a concept's label wins.
    pub fn from_fields<'a, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut mapping = FieldMapping::default();
        for (id, name) in fields {
            let name = name.to_lowercase();
            for concept in FieldConcept::ALL {
                let slot = mapping.slot(concept);
                if slot.is_none() && name.contains(concept.label()) {
                    *slot = Some(id.to_string());
                }
            }
        }
        mapping
    }

    pub fn is_empty(&self) -> bool {
        self.epic_link.is_none() && self.story_points.is_none() && self.sprint.is_none()
    }
}

/// Discovered mappings, keyed by project key. Entries never expire.
#[derive(Debug, Default)]
pub struct FieldMappingStore {
    mappings: Mutex<HashMap<String, FieldMapping>>,
}

impl FieldMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project: &str) -> Option<FieldMapping> {
        self.lock().get(project).cloned()
    }

    pub fn insert(&self, project: &str, mapping: FieldMapping) {
        self.lock().insert(project.to_string(), mapping);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, FieldMapping>> {
        self.mappings.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Fetch creation metadata for `project` and derive its mapping.
///
/// Servers with the custom-field-schema capability expose paged per-issue-type
/// endpoints; older ones only have the expanded legacy endpoint.
#[instrument(skip(requester, capabilities))]
pub async fn discover(
    requester: &Requester,
    capabilities: &Capabilities,
    project: &str,
) -> Result<FieldMapping> {
    let fields = if capabilities.custom_field_schema {
        fetch_paged_fields(requester, project).await?
    } else {
        fetch_legacy_fields(requester, project).await?
    };

    let mapping = FieldMapping::from_fields(fields.iter().map(|(id, n)| (id.as_str(), n.as_str())));
    if mapping.is_empty() {
        info!("No custom field mapping found for project {}", project);
    } else {
        debug!(?mapping, "Discovered field mapping for {}", project);
    }
    Ok(mapping)
}

async fn fetch_legacy_fields(requester: &Requester, project: &str) -> Result<Vec<(String, String)>> {
    let endpoint = format!(
        "/rest/api/2/issue/createmeta?projectKeys={}&expand=projects.issuetypes.fields",
        urlencoding::encode(project)
    );
    let meta: WireCreateMeta = requester
        .request_json(&endpoint, &RequestOptions::get().skip_cache())
        .await?;

    Ok(meta
        .projects
        .into_iter()
        .filter(|p| p.key.eq_ignore_ascii_case(project))
        .flat_map(|p| p.issuetypes)
        .flat_map(|t| t.fields)
        .map(|(id, field)| {
            let name = field.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            (id, name)
        })
        .collect())
}

async fn fetch_paged_fields(requester: &Requester, project: &str) -> Result<Vec<(String, String)>> {
    let project = urlencoding::encode(project);
    let base = format!("/rest/api/2/issue/createmeta/{}/issuetypes", project);
    let options = RequestOptions::get().skip_cache();

    let mut issue_types: Vec<WireMetaIssueType> = Vec::new();
    let mut start_at = 0;
    loop {
        let page: WirePage<WireMetaIssueType> = requester
            .request_json(&format!("{}?startAt={}", base, start_at), &options)
            .await?;
        let count = page.values.len() as u32;
        issue_types.extend(page.values);
        if page.is_last || count == 0 {
            break;
        }
        start_at += count;
    }

    let mut fields = Vec::new();
    for issue_type in issue_types {
        let mut start_at = 0;
        loop {
            let endpoint = format!("{}/{}?startAt={}", base, issue_type.id, start_at);
            let page: WirePage<WireMetaField> = requester.request_json(&endpoint, &options).await?;
            let count = page.values.len() as u32;
            fields.extend(page.values.into_iter().map(|f| (f.field_id, f.name)));
            if page.is_last || count == 0 {
                break;
            }
            start_at += count;
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::{AuthState, Credentials};
    use crate::api::capabilities::VersionTriple;
    use crate::api::retry::RetryPolicy;
    use crate::api::transport::testing::ScriptedTransport;
    use std::sync::Arc;

    fn requester(transport: Arc<ScriptedTransport>) -> Requester {
        let auth = Arc::new(AuthState::new(Credentials::new("u", "s")));
        Requester::new(transport, "http://localhost:8080", auth, RetryPolicy::none())
    }

    #[test]
    fn test_from_fields_matches_labels() {
        let mapping = FieldMapping::from_fields([
            ("summary", "Summary"),
            ("customfield_10002", "Story Points"),
            ("customfield_10005", "Epic Link"),
            ("customfield_10007", "Sprint"),
        ]);
        assert_eq!(mapping.story_points.as_deref(), Some("customfield_10002"));
        assert_eq!(mapping.epic_link.as_deref(), Some("customfield_10005"));
        assert_eq!(mapping.sprint.as_deref(), Some("customfield_10007"));
    }

    #[test]
    fn test_from_fields_first_match_wins() {
        let mapping = FieldMapping::from_fields([
            ("customfield_1", "Story point estimate"),
            ("customfield_2", "Story Points"),
        ]);
        assert_eq!(mapping.get(FieldConcept::StoryPoints), Some("customfield_1"));
    }

    #[test]
    fn test_from_fields_no_match() {
        let mapping = FieldMapping::from_fields([("summary", "Summary"), ("labels", "Labels")]);
        assert!(mapping.is_empty());
        assert_eq!(mapping.get(FieldConcept::Sprint), None);
    }

    #[test]
    fn test_store() {
        let store = FieldMappingStore::new();
        assert!(store.get("PROJ").is_none());
        store.insert(
            "PROJ",
            FieldMapping {
                sprint: Some("customfield_1".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(store.get("PROJ").unwrap().sprint.as_deref(), Some("customfield_1"));
        store.clear();
        assert!(store.get("PROJ").is_none());
    }

    #[tokio::test]
    async fn test_discover_legacy_endpoint() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            200,
            r#"{"projects":[{"key":"PROJ","issuetypes":[{"id":"1","name":"Story","fields":{
                "summary":{"name":"Summary"},
                "customfield_10002":{"name":"Story Points"}}}]}]}"#,
        ));
        let caps = Capabilities::for_version(VersionTriple::new(7, 6, 0));

        let mapping = discover(&requester(transport.clone()), &caps, "PROJ").await.unwrap();

        assert_eq!(mapping.story_points.as_deref(), Some("customfield_10002"));
        let requests = transport.requests.lock().unwrap();
        assert!(requests[0].url.contains("createmeta?projectKeys=PROJ"));
    }

    #[tokio::test]
    async fn test_discover_paged_endpoints() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, r#"{"isLast":true,"values":[{"id":"10001","name":"Story"}]}"#)
                .respond(
                    200,
                    r#"{"isLast":true,"values":[
                        {"fieldId":"customfield_10100","name":"Epic Link"},
                        {"fieldId":"customfield_10104","name":"Sprint"}]}"#,
                ),
        );
        let caps = Capabilities::for_version(VersionTriple::new(8, 20, 0));

        let mapping = discover(&requester(transport.clone()), &caps, "PROJ").await.unwrap();

        assert_eq!(mapping.epic_link.as_deref(), Some("customfield_10100"));
        assert_eq!(mapping.sprint.as_deref(), Some("customfield_10104"));
        assert!(mapping.story_points.is_none());
        let requests = transport.requests.lock().unwrap();
        assert!(requests[1]
            .url
            .ends_with("/rest/api/2/issue/createmeta/PROJ/issuetypes/10001?startAt=0"));
    }
}
