//! Search result payload.
//!
//! The cache never inspects items; the fields pulled out here are the ones the
//! front-end renders. Everything else a given endpoint returns is kept in
//! [`SearchItem::fields`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of results from the remote search service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Total matches reported by the service, independent of the result window.
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Account attached to an item (issue author, repository owner, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUser {
    pub id: u64,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A single search hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<ItemUser>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SearchItem {
    /// Best human-readable label across endpoint shapes.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.full_name.as_deref())
            .or(self.name.as_deref())
            .or(self.html_url.as_deref())
            .unwrap_or("(untitled)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_item_deserializes() {
        let json = r#"{
            "id": 1,
            "title": "Crash on start",
            "html_url": "https://github.com/o/r/issues/1",
            "updated_at": "2025-09-17T10:00:00Z",
            "user": {"id": 7, "login": "octo"},
            "comments_url": "https://api.github.com/repos/o/r/issues/1/comments"
        }"#;
        let item: SearchItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.display_title(), "Crash on start");
        assert_eq!(item.user.as_ref().and_then(|u| u.login.as_deref()), Some("octo"));
        assert!(item.fields.contains_key("comments_url"));
        assert!(item.updated_at.is_some());
    }

    #[test]
    fn test_repository_item_uses_full_name() {
        let json = r#"{"id": 2, "name": "r", "full_name": "o/r"}"#;
        let item: SearchItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.display_title(), "o/r");
    }

    #[test]
    fn test_result_defaults() {
        let result: SearchResult = serde_json::from_str(r#"{"total_count": 0}"#).unwrap();
        assert!(result.is_empty());
        assert!(!result.incomplete_results);
    }
}
