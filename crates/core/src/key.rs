//! Request parameters and canonical cache keys.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default page size.
pub const PER_PAGE_DEFAULT: u32 = 10;

/// Search endpoints exposed by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Issues,
    Repositories,
    Code,
    Commits,
    Users,
    Topics,
    Labels,
}

impl SearchType {
    pub const ALL: [SearchType; 7] = [
        SearchType::Issues,
        SearchType::Repositories,
        SearchType::Code,
        SearchType::Commits,
        SearchType::Users,
        SearchType::Topics,
        SearchType::Labels,
    ];

    /// Path segment under `/search/`.
    pub fn path(&self) -> &'static str {
        match self {
            SearchType::Issues => "issues",
            SearchType::Repositories => "repositories",
            SearchType::Code => "code",
            SearchType::Commits => "commits",
            SearchType::Users => "users",
            SearchType::Topics => "topics",
            SearchType::Labels => "labels",
        }
    }

    /// Whether the endpoint refuses anonymous requests.
    pub fn requires_auth(&self) -> bool {
        matches!(self, SearchType::Issues | SearchType::Code | SearchType::Commits)
    }

    /// Whether text-match metadata is requested unless overridden.
    pub fn text_match_default(&self) -> bool {
        matches!(self, SearchType::Issues | SearchType::Code)
    }

    pub fn default_sort(&self) -> &'static str {
        match self {
            SearchType::Repositories => "stars",
            SearchType::Labels => "created",
            _ => "updated",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for SearchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchType::ALL
            .into_iter()
            .find(|t| t.path().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown search type: {}", s))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Ok(SortOrder::Asc),
            "desc" | "latest" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Parameters of one paginated search request as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub search_type: SearchType,
    pub query: String,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
    /// Endpoint-specific sort field.
    pub sort: String,
    pub order: SortOrder,
    /// Extra endpoint-specific parameters (e.g. `repository_id` for labels).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SearchParams {
    /// Page 1 of `query` with the endpoint's default sort.
    pub fn new(search_type: SearchType, query: impl Into<String>) -> Self {
        Self {
            search_type,
            query: query.into(),
            page: 1,
            per_page: PER_PAGE_DEFAULT,
            sort: search_type.default_sort().to_string(),
            order: SortOrder::Desc,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Canonical identity of one search request.
///
/// Two requests are cache-equivalent iff their keys are equal. Fields are
/// private so a key can only come from [`make_key`] or [`SearchKey::with_page`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SearchKey {
    search_type: SearchType,
    query: String,
    page: u32,
    per_page: u32,
    sort: String,
    order: SortOrder,
    extra: BTreeMap<String, String>,
}

/// Canonicalize request parameters into a cache key.
///
/// The query is trimmed and extra parameters with blank values are dropped,
/// mirroring what actually reaches the wire.
pub fn make_key(params: &SearchParams) -> SearchKey {
    SearchKey {
        search_type: params.search_type,
        query: params.query.trim().to_string(),
        page: params.page,
        per_page: params.per_page,
        sort: params.sort.trim().to_string(),
        order: params.order,
        extra: params
            .extra
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| (k.clone(), v.trim().to_string()))
            .collect(),
    }
}

impl SearchKey {
    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn sort(&self) -> &str {
        &self.sort
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// The key of the same search at another page.
    pub fn with_page(&self, page: u32) -> SearchKey {
        SearchKey { page, ..self.clone() }
    }

    /// Short stable digest for log lines.
    ///
    /// SHA-256 over the newline-separated fields, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.search_type.path().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.query.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.page.to_be_bytes());
        hasher.update(self.per_page.to_be_bytes());
        hasher.update(b"\n");
        hasher.update(self.sort.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.order.as_str().as_bytes());
        for (k, v) in &self.extra {
            hasher.update(b"\n");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:?} page={} per_page={} sort={} order={}",
            self.search_type, self.query, self.page, self.per_page, self.sort, self.order
        )
    }
}
