//! Cache entry snapshots and lookup results.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::SearchError;
use crate::key::SearchKey;
use crate::model::SearchResult;

use super::store::CacheStore;

/// Result of a fetch as shared between its owner and joiners.
pub type Outcome = Result<Arc<SearchResult>, SearchError>;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Resolved,
    Rejected,
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: SearchKey,
    pub status: EntryStatus,
    pub data: Option<Arc<SearchResult>>,
    pub error: Option<SearchError>,
    pub fetched_at: Option<Instant>,
}

/// What [`CacheStore::get_or_create_pending`] found.
#[derive(Debug)]
pub enum Lookup {
    /// A fresh resolved entry.
    Resolved(Arc<SearchResult>),
    /// Another caller owns the in-flight fetch; wait on it instead of fetching.
    Pending(PendingFetch),
    /// The caller now owns a new pending entry and must complete it.
    Created(FetchTicket),
}

/// A joined in-flight fetch.
#[derive(Debug)]
pub struct PendingFetch {
    pub(super) key: SearchKey,
    pub(super) rx: watch::Receiver<Option<Outcome>>,
}

impl PendingFetch {
    pub fn key(&self) -> &SearchKey {
        &self.key
    }

    /// Wait for the owning fetch to complete.
    ///
    /// If the owner disappears without completing, the error kind is
    /// `Unknown`.
    pub async fn wait(mut self) -> Outcome {
        let waited = self.rx.wait_for(Option::is_some).await.map(|outcome| (*outcome).clone());
        let outcome = match waited {
            Ok(outcome) => outcome,
            Err(_) => self.rx.borrow().clone(),
        };
        outcome.unwrap_or_else(|| Err(SearchError::abandoned()))
    }
}

/// Ownership of a pending entry.
///
/// Only the ticket that created an entry can complete it. A ticket dropped
/// without being passed to [`CacheStore::resolve`] or [`CacheStore::reject`]
/// abandons its entry so joiners are released and the key can be fetched
/// again.
#[derive(Debug)]
pub struct FetchTicket {
    pub(super) store: CacheStore,
    pub(super) key: SearchKey,
    pub(super) id: u64,
    pub(super) done: bool,
}

impl FetchTicket {
    pub fn key(&self) -> &SearchKey {
        &self.key
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        if !self.done {
            self.store.abandon(&self.key, self.id);
        }
    }
}
