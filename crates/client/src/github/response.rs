//! GitHub search response decoding.

use bytes::Bytes;
use lookahead_core::{RateLimitInfo, SearchResult};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::github::GithubError;

/// Error payload GitHub sends with non-success responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Read the `x-ratelimit-*` headers.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimitInfo {
    RateLimitInfo {
        limit: header_u64(headers, "x-ratelimit-limit"),
        remaining: header_u64(headers, "x-ratelimit-remaining"),
        reset: header_u64(headers, "x-ratelimit-reset"),
    }
}

/// Turn a complete HTTP response into a result page or a classified error.
pub fn decode(status: StatusCode, headers: &HeaderMap, body: &Bytes) -> Result<SearchResult, GithubError> {
    if !status.is_success() {
        let error: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        let message = error
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("GitHub search error").to_string());
        return Err(GithubError::Http {
            status: status.as_u16(),
            message,
            documentation_url: error.documentation_url,
            rate_limit: rate_limit_from_headers(headers),
        });
    }

    serde_json::from_slice(body).map_err(|e| GithubError::Parse(e.to_string()))
}
