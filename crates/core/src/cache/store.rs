//! Keyed result store with request deduplication.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::SearchError;
use crate::key::SearchKey;
use crate::model::SearchResult;
use crate::scheduler::lock;

use super::entry::{CacheEntry, EntryStatus, FetchTicket, Lookup, Outcome, PendingFetch};

/// Default time a resolved entry is served without refetching.
pub const STALE_TIME_DEFAULT: Duration = Duration::from_millis(5_000);

/// Default time after which a resolved entry is dropped.
pub const GC_TIME_DEFAULT: Duration = Duration::from_millis(120_000);

/// Staleness policy of a [`CacheStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// A resolved entry older than this is refetched by the next foreground
    /// request.
    pub stale_time: Duration,
    /// A resolved entry older than this is removed by
    /// [`CacheStore::purge_expired`].
    pub gc_time: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self { stale_time: STALE_TIME_DEFAULT, gc_time: GC_TIME_DEFAULT }
    }
}

/// Entry counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub pending: usize,
    pub resolved: usize,
}

/// Last good page of a key that is being refetched.
type Previous = (Arc<SearchResult>, Instant);

#[derive(Debug)]
enum Slot {
    /// `previous` holds the stale page this fetch replaces, restored if the
    /// fetch fails or is abandoned.
    Pending { id: u64, tx: watch::Sender<Option<Outcome>>, previous: Option<Previous> },
    Resolved { data: Arc<SearchResult>, fetched_at: Instant },
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    slots: HashMap<SearchKey, Slot>,
}

/// In-memory store of search results keyed by [`SearchKey`].
///
/// Holds at most one entry per key. A pending entry doubles as the in-flight
/// marker: [`CacheStore::get_or_create_pending`] hands the first caller a
/// [`FetchTicket`] and every later caller a [`PendingFetch`] to wait on, so a
/// key is never fetched twice concurrently. Rejections are not retained.
///
/// Cloning is cheap and yields a handle to the same store. All operations are
/// synchronous and never hold the lock across an await point.
#[derive(Debug, Clone)]
pub struct CacheStore {
    state: Arc<Mutex<StoreState>>,
    options: StoreOptions,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl CacheStore {
    pub fn new(options: StoreOptions) -> Self {
        Self { state: Arc::new(Mutex::new(StoreState::default())), options }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Snapshot of the entry for `key`.
    pub fn get(&self, key: &SearchKey) -> Option<CacheEntry> {
        let state = lock(&self.state);
        state.slots.get(key).map(|slot| match slot {
            Slot::Pending { previous, .. } => CacheEntry {
                key: key.clone(),
                status: EntryStatus::Pending,
                data: previous.as_ref().map(|(data, _)| Arc::clone(data)),
                error: None,
                fetched_at: previous.as_ref().map(|(_, at)| *at),
            },
            Slot::Resolved { data, fetched_at } => CacheEntry {
                key: key.clone(),
                status: EntryStatus::Resolved,
                data: Some(Arc::clone(data)),
                error: None,
                fetched_at: Some(*fetched_at),
            },
        })
    }

    /// True only for resolved entries. A pending entry is not "cached".
    pub fn has(&self, key: &SearchKey) -> bool {
        matches!(lock(&self.state).slots.get(key), Some(Slot::Resolved { .. }))
    }

    /// Serve, join, or begin a fetch for `key`.
    ///
    /// This is the deduplication point: the check and the creation of the
    /// pending entry happen under one lock acquisition. A resolved entry past
    /// its stale time is replaced by a new pending entry that keeps the stale
    /// page until the refetch completes.
    pub fn get_or_create_pending(&self, key: &SearchKey) -> Lookup {
        let mut state = lock(&self.state);

        let previous = match state.slots.get(key) {
            Some(Slot::Resolved { data, fetched_at }) if fetched_at.elapsed() < self.options.stale_time => {
                return Lookup::Resolved(Arc::clone(data));
            }
            Some(Slot::Pending { tx, .. }) => {
                tracing::debug!(key = %key.digest(), "joining in-flight fetch");
                return Lookup::Pending(PendingFetch { key: key.clone(), rx: tx.subscribe() });
            }
            Some(Slot::Resolved { data, fetched_at }) => {
                tracing::debug!(key = %key.digest(), "stale entry, refetching");
                Some((Arc::clone(data), *fetched_at))
            }
            None => None,
        };

        state.next_id += 1;
        let id = state.next_id;
        let (tx, _) = watch::channel(None);
        state.slots.insert(key.clone(), Slot::Pending { id, tx, previous });

        Lookup::Created(FetchTicket { store: self.clone(), key: key.clone(), id, done: false })
    }

    /// Complete a pending entry with data.
    ///
    /// Returns false, leaving the store untouched, if the ticket no longer owns
    /// a pending entry (it was reset or replaced).
    pub fn resolve(&self, mut ticket: FetchTicket, data: Arc<SearchResult>) -> bool {
        ticket.done = true;
        let mut state = lock(&self.state);

        let Some((tx, _)) = Self::take_owned(&mut state, &ticket.key, ticket.id) else {
            tracing::warn!(key = %ticket.key.digest(), "dropping stale completion");
            return false;
        };
        tx.send_replace(Some(Ok(Arc::clone(&data))));
        state.slots.insert(ticket.key.clone(), Slot::Resolved { data, fetched_at: Instant::now() });
        true
    }

    /// Complete a pending entry with an error.
    ///
    /// The error is never stored. A stale page the fetch was replacing is put
    /// back (still stale), otherwise the entry is removed. Joiners receive the
    /// error either way.
    pub fn reject(&self, mut ticket: FetchTicket, error: SearchError) -> bool {
        ticket.done = true;
        let mut state = lock(&self.state);

        let Some((tx, previous)) = Self::take_owned(&mut state, &ticket.key, ticket.id) else {
            tracing::warn!(key = %ticket.key.digest(), "dropping stale rejection");
            return false;
        };
        Self::restore(&mut state, &ticket.key, previous);
        tx.send_replace(Some(Err(error)));
        true
    }

    /// Remove the pending slot owned by `id`, returning its sender and the
    /// stale page it replaced.
    fn take_owned(
        state: &mut StoreState, key: &SearchKey, id: u64,
    ) -> Option<(watch::Sender<Option<Outcome>>, Option<Previous>)> {
        let owned = matches!(state.slots.get(key), Some(Slot::Pending { id: owner, .. }) if *owner == id);
        if !owned {
            return None;
        }
        match state.slots.remove(key) {
            Some(Slot::Pending { tx, previous, .. }) => Some((tx, previous)),
            _ => None,
        }
    }

    fn restore(state: &mut StoreState, key: &SearchKey, previous: Option<Previous>) {
        if let Some((data, fetched_at)) = previous {
            tracing::debug!(key = %key.digest(), "refetch failed, keeping stale page");
            state.slots.insert(key.clone(), Slot::Resolved { data, fetched_at });
        }
    }

    pub(super) fn abandon(&self, key: &SearchKey, id: u64) {
        let mut state = lock(&self.state);
        if let Some((_, previous)) = Self::take_owned(&mut state, key, id) {
            tracing::debug!(key = %key.digest(), "abandoning pending entry");
            Self::restore(&mut state, key, previous);
        }
    }

    /// Drop a resolved entry so the next request refetches.
    ///
    /// Pending entries are left to their owner.
    pub fn invalidate(&self, key: &SearchKey) -> bool {
        let mut state = lock(&self.state);
        if matches!(state.slots.get(key), Some(Slot::Resolved { .. })) {
            state.slots.remove(key);
            return true;
        }
        false
    }

    /// Remove resolved entries older than the gc time.
    ///
    /// Returns the number of removed entries.
    pub fn purge_expired(&self) -> usize {
        let gc_time = self.options.gc_time;
        let mut state = lock(&self.state);
        let before = state.slots.len();
        state.slots.retain(|_, slot| match slot {
            Slot::Resolved { fetched_at, .. } => fetched_at.elapsed() < gc_time,
            Slot::Pending { .. } => true,
        });
        before - state.slots.len()
    }

    /// Drop every entry. Callers waiting on pending entries are released with
    /// an error and owners' completions become no-ops.
    pub fn reset(&self) {
        let mut state = lock(&self.state);
        let count = state.slots.len();
        state.slots.clear();
        tracing::debug!(count, "cache reset");
    }

    pub fn len(&self) -> usize {
        lock(&self.state).slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        state.slots.values().fold(CacheStats::default(), |mut stats, slot| {
            match slot {
                Slot::Pending { .. } => stats.pending += 1,
                Slot::Resolved { .. } => stats.resolved += 1,
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::key::{SearchParams, SearchType, make_key};

    fn key(page: u32) -> SearchKey {
        make_key(&SearchParams::new(SearchType::Issues, "rust").with_page(page))
    }

    fn result(total: u64) -> Arc<SearchResult> {
        Arc::new(SearchResult { total_count: total, ..Default::default() })
    }

    fn created(lookup: Lookup) -> FetchTicket {
        match lookup {
            Lookup::Created(ticket) => ticket,
            other => panic!("expected Created, got {:?}", other),
        }
    }

    fn joined(lookup: Lookup) -> PendingFetch {
        match lookup {
            Lookup::Pending(pending) => pending,
            other => panic!("expected Pending, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_then_join() {
        let store = CacheStore::default();
        let ticket = created(store.get_or_create_pending(&key(1)));
        let pending = joined(store.get_or_create_pending(&key(1)));

        assert_eq!(store.get(&key(1)).unwrap().status, EntryStatus::Pending);
        assert!(!store.has(&key(1)));

        assert!(store.resolve(ticket, result(25)));
        let outcome = pending.wait().await.unwrap();
        assert_eq!(outcome.total_count, 25);
        assert!(store.has(&key(1)));
        assert_eq!(store.stats(), CacheStats { pending: 0, resolved: 1 });
    }

    #[tokio::test]
    async fn test_resolved_is_served() {
        let store = CacheStore::default();
        let ticket = created(store.get_or_create_pending(&key(1)));
        store.resolve(ticket, result(3));

        match store.get_or_create_pending(&key(1)) {
            Lookup::Resolved(data) => assert_eq!(data.total_count, 3),
            other => panic!("expected Resolved, got {:?}", other),
        }
        let entry = store.get(&key(1)).unwrap();
        assert!(entry.fetched_at.is_some());
        assert!(entry.data.is_some());
    }

    #[tokio::test]
    async fn test_reject_not_retained() {
        let store = CacheStore::default();
        let ticket = created(store.get_or_create_pending(&key(2)));
        let pending = joined(store.get_or_create_pending(&key(2)));

        assert!(store.reject(ticket, SearchError::new(ErrorKind::Server, "boom")));
        assert!(store.get(&key(2)).is_none());

        let err = pending.wait().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Server);

        created(store.get_or_create_pending(&key(2)));
    }

    #[tokio::test]
    async fn test_dropped_ticket_abandons_entry() {
        let store = CacheStore::default();
        let ticket = created(store.get_or_create_pending(&key(1)));
        let pending = joined(store.get_or_create_pending(&key(1)));

        drop(ticket);
        assert!(store.get(&key(1)).is_none());
        let err = pending.wait().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_stale_completion_ignored_after_reset() {
        let store = CacheStore::default();
        let old = created(store.get_or_create_pending(&key(1)));
        store.reset();
        let fresh = created(store.get_or_create_pending(&key(1)));

        assert!(!store.resolve(old, result(1)));
        assert_eq!(store.get(&key(1)).unwrap().status, EntryStatus::Pending);

        assert!(store.resolve(fresh, result(2)));
        assert_eq!(store.get(&key(1)).unwrap().data.unwrap().total_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_refetched() {
        let store = CacheStore::new(StoreOptions {
            stale_time: Duration::from_millis(5_000),
            gc_time: Duration::from_millis(120_000),
        });
        let ticket = created(store.get_or_create_pending(&key(1)));
        store.resolve(ticket, result(1));

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(matches!(store.get_or_create_pending(&key(1)), Lookup::Resolved(_)));

        tokio::time::advance(Duration::from_millis(2)).await;
        let ticket = created(store.get_or_create_pending(&key(1)));
        assert_eq!(store.len(), 1);
        assert!(store.resolve(ticket, result(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refetch_keeps_stale_page() {
        let store = CacheStore::new(StoreOptions {
            stale_time: Duration::from_millis(5_000),
            gc_time: Duration::from_millis(120_000),
        });
        let ticket = created(store.get_or_create_pending(&key(1)));
        store.resolve(ticket, result(7));
        let fetched_at = store.get(&key(1)).and_then(|e| e.fetched_at);

        tokio::time::advance(Duration::from_millis(6_000)).await;
        let ticket = created(store.get_or_create_pending(&key(1)));
        let pending = joined(store.get_or_create_pending(&key(1)));

        let entry = store.get(&key(1)).unwrap();
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.data.map(|d| d.total_count), Some(7));

        assert!(store.reject(ticket, SearchError::new(ErrorKind::Server, "bad gateway")));
        assert_eq!(pending.wait().await.unwrap_err().kind, ErrorKind::Server);

        let entry = store.get(&key(1)).unwrap();
        assert_eq!(entry.status, EntryStatus::Resolved);
        assert_eq!(entry.data.map(|d| d.total_count), Some(7));
        assert_eq!(entry.fetched_at, fetched_at);
        assert!(entry.error.is_none());

        // Still stale, so the next request refetches.
        let ticket = created(store.get_or_create_pending(&key(1)));
        drop(ticket);
        assert!(store.has(&key(1)));
        assert_eq!(store.stats().resolved, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = CacheStore::default();
        let ticket = created(store.get_or_create_pending(&key(1)));
        store.resolve(ticket, result(1));
        let _pending = created(store.get_or_create_pending(&key(2)));

        tokio::time::advance(GC_TIME_DEFAULT).await;
        assert_eq!(store.purge_expired(), 1);
        assert!(store.get(&key(1)).is_none());
        assert!(store.get(&key(2)).is_some());
    }

    #[tokio::test]
    async fn test_invalidate_only_resolved() {
        let store = CacheStore::default();
        let ticket = created(store.get_or_create_pending(&key(1)));
        assert!(!store.invalidate(&key(1)));
        store.resolve(ticket, result(1));
        assert!(store.invalidate(&key(1)));
        assert!(store.is_empty());
    }
}
