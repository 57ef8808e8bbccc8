//! JQL query construction.

use serde::Serialize;

/// Query used when a filter has no clauses; JQL rejects an empty query.
pub const MATCH_ANY: &str = "project is not EMPTY";

/// A search request: raw JQL or a structured filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Jql(String),
    Filter(SearchFilter),
}

impl SearchQuery {
    /// The JQL string sent to the server.
    pub fn to_jql(&self) -> String {
        match self {
            SearchQuery::Jql(jql) if jql.trim().is_empty() => MATCH_ANY.to_string(),
            SearchQuery::Jql(jql) => jql.trim().to_string(),
            SearchQuery::Filter(filter) => filter.to_jql(),
        }
    }
}

impl From<&str> for SearchQuery {
    fn from(jql: &str) -> Self {
        SearchQuery::Jql(jql.to_string())
    }
}

impl From<SearchFilter> for SearchQuery {
    fn from(filter: SearchFilter) -> Self {
        SearchQuery::Filter(filter)
    }
}

/// Structured filter. Values within a field are OR'd, fields are AND'd.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SearchFilter {
    pub project_keys: Vec<String>,
    pub issue_types: Vec<String>,
    pub statuses: Vec<String>,
    /// Login names; `currentUser()` and `unassigned` are understood.
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.project_keys.is_empty()
            && self.issue_types.is_empty()
            && self.statuses.is_empty()
            && self.assignees.is_empty()
            && self.labels.is_empty()
    }

    /// Compile to JQL, ordered by last update.
    pub fn to_jql(&self) -> String {
        let clauses: Vec<String> = [
            field_clause("project", &self.project_keys),
            field_clause("issuetype", &self.issue_types),
            field_clause("status", &self.statuses),
            field_clause("assignee", &self.assignees),
            field_clause("labels", &self.labels),
        ]
        .into_iter()
        .flatten()
        .collect();

        let condition = if clauses.is_empty() {
            MATCH_ANY.to_string()
        } else {
            clauses.join(" AND ")
        };
        format!("{} ORDER BY updated DESC", condition)
    }
}

fn field_clause(field: &str, values: &[String]) -> Option<String> {
    let terms: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| term(field, v))
        .collect();

    match terms.len() {
        0 => None,
        1 => terms.into_iter().next(),
        _ => Some(format!("({})", terms.join(" OR "))),
    }
}

fn term(field: &str, value: &str) -> String {
    if field == "assignee" {
        if value.eq_ignore_ascii_case("unassigned") {
            return "assignee is EMPTY".to_string();
        }
        if value.eq_ignore_ascii_case("currentUser()") {
            return "assignee = currentUser()".to_string();
        }
    }
    format!("{} = {}", field, quote(value))
}

/// Quote a JQL string literal.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_matches_any_project() {
        let jql = SearchFilter::default().to_jql();
        assert_eq!(jql, "project is not EMPTY ORDER BY updated DESC");
    }

    #[test]
    fn test_single_values_are_anded() {
        let filter = SearchFilter {
            project_keys: strings(&["PROJ"]),
            statuses: strings(&["In Progress"]),
            ..Default::default()
        };
        assert_eq!(
            filter.to_jql(),
            r#"project = "PROJ" AND status = "In Progress" ORDER BY updated DESC"#
        );
    }

    #[test]
    fn test_multiple_values_are_ored() {
        let filter = SearchFilter {
            project_keys: strings(&["A", "B"]),
            labels: strings(&["backend"]),
            ..Default::default()
        };
        assert_eq!(
            filter.to_jql(),
            r#"(project = "A" OR project = "B") AND labels = "backend" ORDER BY updated DESC"#
        );
    }

    #[test]
    fn test_assignee_keywords() {
        let filter = SearchFilter {
            assignees: strings(&["currentUser()", "unassigned"]),
            ..Default::default()
        };
        assert_eq!(
            filter.to_jql(),
            "(assignee = currentUser() OR assignee is EMPTY) ORDER BY updated DESC"
        );
    }

    #[test]
    fn test_blank_values_skipped() {
        let filter = SearchFilter {
            issue_types: strings(&["", "  "]),
            ..Default::default()
        };
        assert_eq!(filter.to_jql(), "project is not EMPTY ORDER BY updated DESC");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote(r"back\slash"), r#""back\\slash""#);
    }

    #[test]
    fn test_raw_jql() {
        assert_eq!(SearchQuery::from("  key = PROJ-1 ").to_jql(), "key = PROJ-1");
        assert_eq!(SearchQuery::from("").to_jql(), MATCH_ANY);
    }
}
