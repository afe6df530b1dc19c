//! GitHub search request types and validation.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use lookahead_core::{SearchKey, SearchType, SortOrder};
use regex::Regex;

use crate::github::GithubError;

/// Longest accepted query, in characters.
pub const QUERY_MAX_CHARS: usize = 256;

/// Most boolean operators accepted in one query.
pub const QUERY_MAX_OPERATORS: usize = 5;

static BOOLEAN_OPERATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(AND|OR|NOT)\b").expect("valid regex"));

/// Check a user-typed query before it is sent anywhere.
///
/// # Errors
///
/// Returns `GithubError::InvalidQuery` with a message fit for display when
/// the query is blank, too long, or uses too many boolean operators.
pub fn validate_query(q: &str) -> Result<(), GithubError> {
    let s = q.trim();
    if s.is_empty() {
        return Err(GithubError::InvalidQuery("please enter a keyword".into()));
    }
    if s.chars().count() > QUERY_MAX_CHARS {
        return Err(GithubError::InvalidQuery(format!("query is too long (max {QUERY_MAX_CHARS} characters)")));
    }
    if BOOLEAN_OPERATOR.find_iter(s).count() > QUERY_MAX_OPERATORS {
        return Err(GithubError::InvalidQuery(format!(
            "too many boolean operators (max {QUERY_MAX_OPERATORS})"
        )));
    }
    Ok(())
}

/// One request against `/search/{type}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub search_type: SearchType,
    pub q: String,
    pub page: u32,
    pub per_page: u32,
    pub sort: String,
    pub order: SortOrder,
    /// Endpoint-specific parameters, e.g. `repository_id` for labels.
    pub extra: BTreeMap<String, String>,
    /// Force text-match metadata on or off; `None` uses the endpoint default.
    pub accept_text_match: Option<bool>,
}

impl SearchRequest {
    /// Build the request a cache key stands for.
    pub fn from_key(key: &SearchKey) -> Self {
        Self {
            search_type: key.search_type(),
            q: key.query().to_string(),
            page: key.page(),
            per_page: key.per_page(),
            sort: key.sort().to_string(),
            order: key.order(),
            extra: key.extra().clone(),
            accept_text_match: None,
        }
    }

    /// Validate the request parameters.
    pub fn validate(&self) -> Result<(), GithubError> {
        validate_query(&self.q)?;

        if !(1..=100).contains(&self.per_page) {
            return Err(GithubError::InvalidPerPage);
        }
        if self.page == 0 {
            return Err(GithubError::InvalidPage);
        }
        Ok(())
    }

    /// Path below the API base URL.
    pub fn path(&self) -> String {
        format!("search/{}", self.search_type.path())
    }

    /// Media type for the Accept header.
    pub fn accept(&self) -> &'static str {
        if self.accept_text_match.unwrap_or_else(|| self.search_type.text_match_default()) {
            "application/vnd.github.text-match+json"
        } else {
            "application/vnd.github+json"
        }
    }

    /// Query string parameters, extras last.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("q".to_string(), self.q.trim().to_string()),
            ("page".to_string(), self.page.to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
        ];
        if !self.sort.is_empty() {
            pairs.push(("sort".to_string(), self.sort.clone()));
        }
        pairs.push(("order".to_string(), self.order.as_str().to_string()));
        pairs.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookahead_core::{SearchParams, make_key};

    fn request(search_type: SearchType, q: &str) -> SearchRequest {
        SearchRequest::from_key(&make_key(&SearchParams::new(search_type, q)))
    }

    #[test]
    fn test_validate_query_rules() {
        assert!(validate_query("tokio runtime").is_ok());
        assert!(validate_query("   ").is_err());
        assert!(validate_query(&"a".repeat(256)).is_ok());
        assert!(validate_query(&"a".repeat(257)).is_err());
    }

    #[test]
    fn test_validate_query_operator_count() {
        assert!(validate_query("a AND b OR c NOT d and e or f").is_err());
        assert!(validate_query("a AND b OR c NOT d and e").is_ok());
        // word-bounded: ANDROID and ORDER are not operators
        assert!(validate_query("ANDROID ORDER NOTE ANDROID ORDER NOTE").is_ok());
    }

    #[test]
    fn test_from_key_defaults() {
        let req = request(SearchType::Repositories, "  lookahead ");
        assert_eq!(req.q, "lookahead");
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, 10);
        assert_eq!(req.sort, "stars");
        assert_eq!(req.order, SortOrder::Desc);
        assert_eq!(req.path(), "search/repositories");
    }

    #[test]
    fn test_query_pairs_include_extras() {
        let key = make_key(&SearchParams::new(SearchType::Labels, "bug").with_page(2).with_extra("repository_id", "42"));
        let pairs = SearchRequest::from_key(&key).query_pairs();

        let lookup = |name: &str| pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        assert_eq!(lookup("q"), Some("bug"));
        assert_eq!(lookup("page"), Some("2"));
        assert_eq!(lookup("sort"), Some("created"));
        assert_eq!(lookup("order"), Some("desc"));
        assert_eq!(lookup("repository_id"), Some("42"));
    }

    #[test]
    fn test_accept_header() {
        assert_eq!(request(SearchType::Issues, "x").accept(), "application/vnd.github.text-match+json");
        assert_eq!(request(SearchType::Code, "x").accept(), "application/vnd.github.text-match+json");
        assert_eq!(request(SearchType::Users, "x").accept(), "application/vnd.github+json");

        let forced = SearchRequest { accept_text_match: Some(false), ..request(SearchType::Issues, "x") };
        assert_eq!(forced.accept(), "application/vnd.github+json");
    }

    #[test]
    fn test_validate_paging() {
        let base = request(SearchType::Users, "octo");
        assert!(base.validate().is_ok());

        let big = SearchRequest { per_page: 101, ..base.clone() };
        assert!(matches!(big.validate(), Err(GithubError::InvalidPerPage)));

        let zero = SearchRequest { page: 0, ..base };
        assert!(matches!(zero.validate(), Err(GithubError::InvalidPage)));
    }
}
