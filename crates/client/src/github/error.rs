//! GitHub search client error types and their classification.

use std::sync::{Arc, LazyLock};

use lookahead_core::{ErrorKind, RateLimitInfo, SearchError};
use regex::Regex;

static RATE_LIMIT_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)rate limit exceeded|abuse detection|secondary rate limit").expect("valid regex"));

/// Errors from the GitHub search client.
#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    /// The endpoint refuses anonymous requests and no token is configured.
    #[error("{endpoint} search requires a token: set LOOKAHEAD_GITHUB_TOKEN")]
    MissingToken { endpoint: &'static str },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Page size outside 1..=100.
    #[error("invalid per_page: must be 1-100")]
    InvalidPerPage,

    #[error("invalid page: pages start at 1")]
    InvalidPage,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Non-success HTTP response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String, documentation_url: Option<String>, rate_limit: RateLimitInfo },

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response parse error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { GithubError::Timeout } else { GithubError::Network(Arc::new(err)) }
    }
}

/// Classify a failed HTTP response.
///
/// 403 and 429 count as rate limiting only when the message or the remaining
/// quota says so; otherwise 403 is a plain permission failure.
pub fn classify(status: u16, message: &str, remaining: Option<u64>) -> ErrorKind {
    match status {
        401 => ErrorKind::AuthRequired,
        404 => ErrorKind::NotFound,
        422 => ErrorKind::Validation,
        500.. => ErrorKind::Server,
        403 | 429 if RATE_LIMIT_MESSAGE.is_match(message) || remaining == Some(0) => ErrorKind::RateLimited,
        403 | 429 => ErrorKind::Forbidden,
        _ => ErrorKind::Unknown,
    }
}

impl From<GithubError> for SearchError {
    fn from(err: GithubError) -> Self {
        let message = err.to_string();
        match err {
            GithubError::MissingToken { .. } => SearchError::new(ErrorKind::AuthRequired, message),
            GithubError::InvalidQuery(_) | GithubError::InvalidPerPage | GithubError::InvalidPage => {
                SearchError::new(ErrorKind::Validation, message)
            }
            GithubError::Http { status, message, documentation_url, rate_limit } => {
                let kind = classify(status, &message, rate_limit.remaining);
                SearchError {
                    kind,
                    message,
                    status: Some(status),
                    documentation_url,
                    rate_limit: Some(rate_limit),
                }
            }
            GithubError::Timeout | GithubError::Network(_) => SearchError::new(ErrorKind::Network, message),
            GithubError::InvalidBaseUrl(_) | GithubError::Parse(_) => SearchError::new(ErrorKind::Unknown, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, message: &str, remaining: Option<u64>) -> SearchError {
        GithubError::Http {
            status,
            message: message.into(),
            documentation_url: Some("https://docs.github.com/rest".into()),
            rate_limit: RateLimitInfo { limit: Some(60), remaining, reset: Some(1_700_000_000) },
        }
        .into()
    }

    #[test]
    fn test_classify_fixed_statuses() {
        assert_eq!(classify(401, "Bad credentials", None), ErrorKind::AuthRequired);
        assert_eq!(classify(404, "Not Found", None), ErrorKind::NotFound);
        assert_eq!(classify(422, "Validation Failed", None), ErrorKind::Validation);
        assert_eq!(classify(500, "", None), ErrorKind::Server);
        assert_eq!(classify(503, "", None), ErrorKind::Server);
        assert_eq!(classify(418, "", None), ErrorKind::Unknown);
        assert_eq!(classify(418, "", Some(0)), ErrorKind::Unknown);
        assert_eq!(classify(404, "Not Found", Some(0)), ErrorKind::NotFound);
    }

    #[test]
    fn test_classify_rate_limit_by_message() {
        assert_eq!(classify(403, "API rate limit exceeded for 1.2.3.4", Some(3)), ErrorKind::RateLimited);
        assert_eq!(classify(403, "You have exceeded a Secondary Rate Limit", None), ErrorKind::RateLimited);
        assert_eq!(classify(429, "abuse detection mechanism triggered", None), ErrorKind::RateLimited);
    }

    #[test]
    fn test_classify_rate_limit_by_remaining() {
        assert_eq!(classify(403, "Forbidden", Some(0)), ErrorKind::RateLimited);
        assert_eq!(classify(403, "Forbidden", Some(12)), ErrorKind::Forbidden);
        assert_eq!(classify(429, "Too Many Requests", None), ErrorKind::Forbidden);
    }

    #[test]
    fn test_http_error_keeps_metadata() {
        let err = http(403, "API rate limit exceeded", Some(0));
        assert_eq!(err.kind, ErrorKind::RateLimited);
        assert_eq!(err.status, Some(403));
        assert_eq!(err.message, "API rate limit exceeded");
        assert!(err.documentation_url.is_some());
        assert_eq!(err.rate_limit.and_then(|r| r.reset), Some(1_700_000_000));
    }

    #[test]
    fn test_local_errors_map_to_kinds() {
        let missing: SearchError = GithubError::MissingToken { endpoint: "issues" }.into();
        assert_eq!(missing.kind, ErrorKind::AuthRequired);
        assert!(missing.status.is_none());

        let invalid: SearchError = GithubError::InvalidQuery("empty".into()).into();
        assert_eq!(invalid.kind, ErrorKind::Validation);

        let timeout: SearchError = GithubError::Timeout.into();
        assert_eq!(timeout.kind, ErrorKind::Network);

        let parse: SearchError = GithubError::Parse("eof".into()).into();
        assert_eq!(parse.kind, ErrorKind::Unknown);
    }

    #[test]
    fn test_error_display() {
        let err = GithubError::MissingToken { endpoint: "code" };
        assert!(err.to_string().contains("LOOKAHEAD_GITHUB_TOKEN"));

        let err = GithubError::InvalidQuery("test".to_string());
        assert!(err.to_string().contains("invalid query"));
    }
}
