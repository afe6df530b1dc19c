//! The remote search collaborator.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::key::SearchKey;
use crate::model::SearchResult;

/// A paginated remote search backend.
///
/// Implementations own transport concerns (auth, timeouts, retries) and must
/// classify every failure into a [`SearchError`]. The cache never retries.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn fetch(&self, key: &SearchKey) -> Result<SearchResult, SearchError>;
}
