//! Wire shapes to public model.
//!
//! Server sends descriptions and comment bodies as wiki markup; they are
//! converted to inline markup here so callers see one dialect regardless of
//! deployment.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::fields::FieldMapping;
use super::model::{
    Board, Comment, IssueLink, IssueLinkType, LinkDirection, NormalizedIssue, Priority, Project,
    Sprint, SprintState, Status, StatusCategory, Transition, User,
};
use super::types::{
    WireBoard, WireComment, WireIssue, WireIssueLink, WireIssueLinkType, WirePriority,
    WireProject, WireSprint, WireStatus, WireTransition, WireUser,
};
use crate::convert::{self, MarkStyle};

/// `name=` attribute of a legacy `...sprint.Sprint@1f2e[id=1,...,name=X,...]` value.
static LEGACY_SPRINT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"name=(.*?)(?:,[A-Za-z]+=|\]$)").expect("Invalid legacy sprint regex")
});

pub fn user(wire: WireUser) -> User {
    let id = wire
        .name
        .or(wire.account_id)
        .or(wire.key)
        .unwrap_or_default();
    User {
        display_name: wire.display_name.unwrap_or_else(|| id.clone()),
        id,
        email: wire.email_address.filter(|e| !e.is_empty()),
        active: wire.active,
    }
}

pub fn status(wire: WireStatus) -> Status {
    Status {
        id: wire.id,
        name: wire.name,
        category: wire
            .status_category
            .map(|c| StatusCategory::from_key(&c.key))
            .unwrap_or_default(),
    }
}

pub fn priority(wire: WirePriority) -> Priority {
    Priority {
        id: wire.id,
        name: wire.name,
    }
}

pub fn project(wire: WireProject) -> Project {
    Project {
        id: wire.id,
        key: wire.key,
        name: wire.name,
        project_type: wire.project_type_key,
        lead: wire.lead.map(user),
    }
}

pub fn transition(wire: WireTransition) -> Transition {
    Transition {
        id: wire.id,
        name: wire.name,
        to: wire.to.map(status),
    }
}

pub fn comment(wire: WireComment) -> Comment {
    Comment {
        id: wire.id,
        body: rich_field(&wire.body).unwrap_or_default(),
        author: wire.author.map(user),
        created: wire.created,
        updated: wire.updated,
    }
}

pub fn link_type(wire: WireIssueLinkType) -> IssueLinkType {
    IssueLinkType {
        id: wire.id,
        name: wire.name,
        inward: wire.inward,
        outward: wire.outward,
    }
}

/// A link entry; `None` if neither side is present.
pub fn issue_link(wire: WireIssueLink) -> Option<IssueLink> {
    let (direction, other) = match (wire.outward_issue, wire.inward_issue) {
        (Some(other), _) => (LinkDirection::Outward, other),
        (None, Some(other)) => (LinkDirection::Inward, other),
        (None, None) => return None,
    };
    let (other_summary, other_status) = match other.fields {
        Some(fields) => (Some(fields.summary), fields.status.map(status)),
        None => (None, None),
    };
    Some(IssueLink {
        id: wire.id,
        link_type: link_type(wire.link_type),
        direction,
        other_key: other.key,
        other_summary,
        other_status,
    })
}

pub fn board(wire: WireBoard) -> Board {
    Board {
        id: wire.id,
        name: wire.name,
        board_type: wire.board_type,
    }
}

pub fn sprint(wire: WireSprint) -> Sprint {
    Sprint {
        id: wire.id,
        name: wire.name,
        state: SprintState::from_wire(&wire.state),
        start_date: wire.start_date,
        end_date: wire.end_date,
        goal: wire.goal.filter(|g| !g.is_empty()),
    }
}

/// A description or comment body as inline markup. Wiki strings are
/// converted, rich-text documents are rendered; empty bodies are `None`.
pub fn rich_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => convert::wiki_to_markup(s),
        other => convert::adf_to_text(other, MarkStyle::Markup),
    };
    (!text.trim().is_empty()).then_some(text)
}

/// Normalize an issue. Custom fields are read only through `mapping`.
pub fn issue(wire: WireIssue, mapping: &FieldMapping, base_url: &str) -> NormalizedIssue {
    let fields = wire.fields;
    let custom = |id: Option<&str>| id.and_then(|id| fields.custom.get(id)).filter(|v| !v.is_null());

    let story_points = custom(mapping.story_points.as_deref()).and_then(number_value);
    let epic_key = custom(mapping.epic_link.as_deref())
        .and_then(Value::as_str)
        .map(str::to_string);
    let sprint = custom(mapping.sprint.as_deref()).and_then(sprint_name);

    NormalizedIssue {
        url: format!("{}/browse/{}", base_url.trim_end_matches('/'), wire.key),
        id: wire.id,
        key: wire.key,
        summary: fields.summary,
        description: fields.description.as_ref().and_then(rich_field),
        status: fields.status.map(status).unwrap_or_default(),
        issue_type: fields.issuetype.map(|t| t.name).unwrap_or_default(),
        priority: fields.priority.map(priority),
        assignee: fields.assignee.map(user),
        reporter: fields.reporter.map(user),
        project_key: fields.project.map(|p| p.key),
        labels: fields.labels,
        components: fields.components.into_iter().map(|c| c.name).collect(),
        created: fields.created,
        updated: fields.updated,
        due_date: fields.duedate,
        links: fields.issuelinks.into_iter().filter_map(issue_link).collect(),
        story_points,
        epic_key,
        sprint,
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Name of the most recent sprint in a sprint field value.
fn sprint_name(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().rev().find_map(sprint_name),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
        Value::String(s) => LEGACY_SPRINT_NAME
            .captures(s)
            .map(|caps| caps[1].to_string())
            .or_else(|| (!s.contains('[')).then(|| s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire_issue(fields: Value) -> WireIssue {
        serde_json::from_value(json!({"id": "10001", "key": "PROJ-1", "fields": fields})).unwrap()
    }

    #[test]
    fn test_user_prefers_login_name() {
        let u = user(WireUser {
            name: Some("jdoe".to_string()),
            key: Some("JIRAUSER10100".to_string()),
            display_name: Some("John Doe".to_string()),
            email_address: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(u.id, "jdoe");
        assert_eq!(u.display_name, "John Doe");
        assert!(u.email.is_none());
    }

    #[test]
    fn test_issue_description_from_wiki() {
        let issue = issue(
            wire_issue(json!({
                "summary": "Crash",
                "description": "h2. Steps\n* open *file*",
                "status": {"id": "1", "name": "Open", "statusCategory": {"key": "new", "name": "To Do"}},
                "issuetype": {"id": "1", "name": "Bug"}
            })),
            &FieldMapping::default(),
            "https://jira.example.com/",
        );

        assert_eq!(issue.description.as_deref(), Some("## Steps\n- open **file**"));
        assert_eq!(issue.status.category, StatusCategory::ToDo);
        assert_eq!(issue.issue_type, "Bug");
        assert_eq!(issue.url, "https://jira.example.com/browse/PROJ-1");
    }

    #[test]
    fn test_empty_description_is_none() {
        let issue = issue(
            wire_issue(json!({"summary": "x", "description": "  "})),
            &FieldMapping::default(),
            "https://jira.example.com",
        );
        assert!(issue.description.is_none());
    }

    #[test]
    fn test_custom_fields_through_mapping() {
        let mapping = FieldMapping {
            story_points: Some("customfield_10002".to_string()),
            epic_link: Some("customfield_10005".to_string()),
            sprint: Some("customfield_10007".to_string()),
        };
        let issue = issue(
            wire_issue(json!({
                "summary": "Story",
                "customfield_10002": 3.0,
                "customfield_10005": "PROJ-100",
                "customfield_10007": [
                    "com.atlassian.greenhopper.service.sprint.Sprint@1a2b[id=1,rapidViewId=2,state=CLOSED,name=Sprint 1,startDate=2024-01-01]",
                    "com.atlassian.greenhopper.service.sprint.Sprint@3c4d[id=2,rapidViewId=2,state=ACTIVE,name=Sprint 2,goal=,startDate=2024-01-15]"
                ]
            })),
            &mapping,
            "https://jira.example.com",
        );

        assert_eq!(issue.story_points, Some(3.0));
        assert_eq!(issue.epic_key.as_deref(), Some("PROJ-100"));
        assert_eq!(issue.sprint.as_deref(), Some("Sprint 2"));
    }

    #[test]
    fn test_unmapped_custom_fields_ignored() {
        let issue = issue(
            wire_issue(json!({"summary": "Story", "customfield_10002": 3.0})),
            &FieldMapping::default(),
            "https://jira.example.com",
        );
        assert!(issue.story_points.is_none());
    }

    #[test]
    fn test_sprint_name_variants() {
        assert_eq!(
            sprint_name(&json!([{"id": 1, "name": "Object sprint"}])),
            Some("Object sprint".to_string())
        );
        assert_eq!(sprint_name(&json!("Plain")), Some("Plain".to_string()));
        assert_eq!(
            sprint_name(&json!("x.Sprint@1[id=1,state=FUTURE,name=Last]")),
            Some("Last".to_string())
        );
        assert_eq!(sprint_name(&json!([])), None);
    }

    #[test]
    fn test_issue_links() {
        let issue = issue(
            wire_issue(json!({
                "summary": "Linked",
                "issuelinks": [
                    {
                        "id": "1",
                        "type": {"id": "10000", "name": "Blocks", "inward": "is blocked by", "outward": "blocks"},
                        "inwardIssue": {"key": "PROJ-9", "fields": {"summary": "Blocker", "status": {"name": "Open"}}}
                    },
                    {"id": "2", "type": {"name": "Relates"}}
                ]
            })),
            &FieldMapping::default(),
            "https://jira.example.com",
        );

        assert_eq!(issue.links.len(), 1);
        let link = &issue.links[0];
        assert_eq!(link.direction, LinkDirection::Inward);
        assert_eq!(link.relationship(), "is blocked by");
        assert_eq!(link.other_summary.as_deref(), Some("Blocker"));
    }

    #[test]
    fn test_comment_body_converted() {
        let c = comment(
            serde_json::from_value(json!({
                "id": "5",
                "body": "See {{config.toml}}",
                "author": {"name": "jdoe", "displayName": "John"}
            }))
            .unwrap(),
        );
        assert_eq!(c.body, "See `config.toml`");
        assert_eq!(c.author.unwrap().display_name, "John");
    }

    #[test]
    fn test_rich_field_from_document() {
        let value = json!({
            "type": "doc",
            "content": [{"type": "paragraph", "content": [
                {"type": "text", "text": "bold", "marks": [{"type": "strong"}]}
            ]}]
        });
        assert_eq!(rich_field(&value).as_deref(), Some("**bold**"));
    }
}
