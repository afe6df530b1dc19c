//! GitHub Search API client.
//!
//! Provides the [`SearchService`] the cache and prefetch scheduler fetch
//! through, with rate limiting, request validation, and error classification.
//!
//! ### Specification
//!
//! - **Endpoint**: `{base}/search/{issues|repositories|code|commits|users|topics|labels}`
//! - **Authentication**: `Authorization: Bearer <token>` when a token is set;
//!   issues, code and commits refuse to run without one.
//! - **Versioning**: `X-GitHub-Api-Version` header.
//! - **Rate Limiting**: minimum interval between requests, shared by
//!   foreground fetches and prefetches.
//! - **Errors**: every failure becomes a classified `SearchError`.

pub mod error;
pub mod request;
pub mod response;

pub use error::{GithubError, classify};
pub use request::{QUERY_MAX_CHARS, QUERY_MAX_OPERATORS, SearchRequest, validate_query};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lookahead_core::{AppConfig, SearchError, SearchKey, SearchResult, SearchService};
use reqwest::header;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// Default base URL for the GitHub REST API.
const DEFAULT_BASE_URL: &str = "https://api.github.com";

const DEFAULT_API_VERSION: &str = "2022-11-28";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = concat!("lookahead/", env!("CARGO_PKG_VERSION"));

/// Minimum interval between requests (unauthenticated search allows 10/minute).
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(2);

/// GitHub client configuration.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: Option<String>,
    /// Base URL (default: https://api.github.com).
    pub base_url: String,
    pub api_version: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
    pub user_agent: String,
    pub min_request_interval: Duration,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_request_interval: MIN_REQUEST_INTERVAL,
        }
    }
}

impl From<&AppConfig> for GithubConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            token: config.github_token.clone().filter(|t| !t.trim().is_empty()),
            base_url: config.api_base_url.clone(),
            api_version: config.api_version.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
            min_request_interval: config.min_request_interval(),
        }
    }
}

/// Rate limiter to enforce request intervals.
#[derive(Debug)]
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self { last_request: Mutex::new(None), min_interval }
    }

    /// Acquire permission to make a request, waiting if necessary.
    async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// GitHub Search API client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    config: GithubConfig,
    base_url: Url,
    rate_limiter: Arc<RateLimiter>,
}

impl GithubClient {
    /// Create a new GitHub client with the given configuration.
    pub fn new(config: GithubConfig) -> Result<Self, GithubError> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| GithubError::InvalidBaseUrl(format!("{base}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GithubError::InvalidBaseUrl(base));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| GithubError::Network(Arc::new(e)))?;

        let rate_limiter = Arc::new(RateLimiter::new(config.min_request_interval));
        Ok(Self { http, config, base_url, rate_limiter })
    }

    pub fn config(&self) -> &GithubConfig {
        &self.config
    }

    pub fn has_token(&self) -> bool {
        self.config.token.is_some()
    }

    /// Absolute URL for a request path.
    fn endpoint(&self, req: &SearchRequest) -> Result<Url, GithubError> {
        self.base_url
            .join(&req.path())
            .map_err(|e| GithubError::InvalidBaseUrl(e.to_string()))
    }

    /// Execute one search request.
    ///
    /// Validation and the token check happen before the rate limiter, so a
    /// rejected request never consumes quota.
    pub async fn search(&self, req: &SearchRequest) -> Result<SearchResult, GithubError> {
        req.validate()?;
        if req.search_type.requires_auth() && !self.has_token() {
            return Err(GithubError::MissingToken { endpoint: req.search_type.path() });
        }
        let url = self.endpoint(req)?;

        self.rate_limiter.acquire().await;

        let start = Instant::now();
        tracing::debug!(endpoint = %req.search_type, q = %req.q, page = req.page, "searching GitHub");

        let mut builder = self
            .http
            .get(url)
            .header(header::ACCEPT, req.accept())
            .header("X-GitHub-Api-Version", &self.config.api_version)
            .query(&req.query_pairs());
        if let Some(token) = &self.config.token {
            builder = builder.bearer_auth(token);
        }

        let http_response = builder.send().await?;
        let status = http_response.status();
        let headers = http_response.headers().clone();
        tracing::debug!(%status, "GitHub response status");

        let body = http_response.bytes().await?;
        let result = response::decode(status, &headers, &body)?;

        tracing::debug!(
            elapsed = ?start.elapsed(),
            total_count = result.total_count,
            items = result.items.len(),
            "search completed"
        );
        Ok(result)
    }
}

#[async_trait]
impl SearchService for GithubClient {
    async fn fetch(&self, key: &SearchKey) -> Result<SearchResult, SearchError> {
        self.search(&SearchRequest::from_key(key)).await.map_err(SearchError::from)
    }
}
