//! Classified search errors.
//!
//! The transport layer maps every failure into one [`ErrorKind`]; the cache
//! and scheduler treat the resulting [`SearchError`] as an opaque value that is
//! either handed to the foreground caller verbatim or dropped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a failed search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Credentials are missing or were rejected.
    AuthRequired,
    /// Primary or secondary rate limit hit.
    RateLimited,
    /// The service rejected the query itself.
    Validation,
    /// Access denied for a reason other than rate limiting.
    Forbidden,
    /// The endpoint or resource does not exist.
    NotFound,
    /// 5xx from the remote service.
    Server,
    /// No HTTP response at all (DNS, connect, timeout).
    Network,
    Unknown,
}

impl ErrorKind {
    /// Stable error code, used as the display prefix.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "AUTH_REQUIRED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Server => "SERVER",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Rate limit headers reported alongside a failed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Epoch seconds at which the window resets.
    pub reset: Option<u64>,
}

/// A classified failure of a remote search.
///
/// Cloneable so that every caller joined on the same in-flight fetch receives
/// the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SearchError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, absent for network failures.
    pub status: Option<u16>,
    pub documentation_url: Option<String>,
    pub rate_limit: Option<RateLimitInfo>,
}

impl SearchError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status: None, documentation_url: None, rate_limit: None }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Error handed to callers joined on a fetch whose owner went away.
    pub(crate) fn abandoned() -> Self {
        Self::new(ErrorKind::Unknown, "fetch abandoned before completion")
    }
}
