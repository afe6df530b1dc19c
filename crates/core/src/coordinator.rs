//! Façade consumed by the front-end.
//!
//! A [`SearchCoordinator`] tracks the page currently on screen, serves it from
//! the [`CacheStore`] when possible, joins an in-flight fetch when one exists,
//! and otherwise fetches through the [`SearchService`]. After every successful
//! foreground fetch it arms the idle look-ahead; navigation links obtain
//! [`HoverHandlers`] to feed the hover trigger.
//!
//! Changing the search (query, sort, page, ...) revokes every outstanding
//! prefetch timer so nothing fires against a context that is gone.

use std::sync::{Arc, Mutex, Weak};

use crate::cache::{CacheStore, Lookup, Outcome};
use crate::error::SearchError;
use crate::key::{SearchKey, SearchParams, make_key};
use crate::model::SearchResult;
use crate::pager;
use crate::prefetch::{PrefetchContext, PrefetchOptions, PrefetchOutcome, PrefetchScheduler};
use crate::scheduler::{Scheduler, lock};
use crate::service::SearchService;

/// State of the current foreground request.
#[derive(Debug, Clone, Default)]
pub enum RequestState {
    /// Nothing requested yet.
    #[default]
    Idle,
    Pending,
    Resolved(Arc<SearchResult>),
    Rejected(SearchError),
}

impl RequestState {
    pub fn data(&self) -> Option<&Arc<SearchResult>> {
        match self {
            RequestState::Resolved(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SearchError> {
        match self {
            RequestState::Rejected(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }
}

#[derive(Debug)]
struct View {
    key: SearchKey,
    state: RequestState,
}

struct Inner {
    store: CacheStore,
    service: Arc<dyn SearchService>,
    prefetch: PrefetchScheduler,
    view: Mutex<Option<View>>,
}

impl Inner {
    fn context(&self) -> Option<PrefetchContext> {
        let view = lock(&self.view);
        let view = view.as_ref()?;
        view.state.data().map(|data| PrefetchContext::new(view.key.clone(), data))
    }

    fn signal_hover(&self, page: u32) -> bool {
        match self.context() {
            Some(ctx) => self.prefetch.signal_hover(page, &ctx),
            None => false,
        }
    }
}

/// Cache-backed search front for one consuming context.
///
/// Cloning yields another handle to the same coordinator.
#[derive(Clone)]
pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

impl SearchCoordinator {
    pub fn new(
        store: CacheStore, service: Arc<dyn SearchService>, scheduler: Arc<dyn Scheduler>, options: PrefetchOptions,
    ) -> Self {
        let prefetch = PrefetchScheduler::new(store.clone(), Arc::clone(&service), scheduler, options);
        Self { inner: Arc::new(Inner { store, service, prefetch, view: Mutex::new(None) }) }
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub fn prefetch(&self) -> &PrefetchScheduler {
        &self.inner.prefetch
    }

    /// Make `params` the current page and return its result.
    ///
    /// Foreground errors are returned verbatim and not cached. A result that
    /// arrives after the caller already moved on is stored but does not touch
    /// the current state or arm prefetching.
    pub async fn fetch(&self, params: &SearchParams) -> Outcome {
        let key = make_key(params);
        let purged = self.inner.store.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "expired entries dropped");
        }

        self.begin(&key);
        let outcome = self.load(&key).await;
        self.finish(&key, &outcome);
        outcome
    }

    fn begin(&self, key: &SearchKey) {
        let mut view = lock(&self.inner.view);
        match view.as_ref() {
            Some(current) if current.key == *key => {
                self.inner.prefetch.cancel_idle();
            }
            _ => {
                self.inner.prefetch.teardown();
                *view = Some(View { key: key.clone(), state: RequestState::Pending });
            }
        }
    }

    async fn load(&self, key: &SearchKey) -> Outcome {
        match self.inner.store.get_or_create_pending(key) {
            Lookup::Resolved(data) => {
                tracing::debug!(key = %key.digest(), "cache hit");
                Ok(data)
            }
            Lookup::Pending(pending) => pending.wait().await,
            Lookup::Created(ticket) => {
                tracing::debug!(key = %key.digest(), page = key.page(), "fetching");
                match self.inner.service.fetch(key).await {
                    Ok(result) => {
                        let data = Arc::new(result);
                        self.inner.store.resolve(ticket, Arc::clone(&data));
                        Ok(data)
                    }
                    Err(e) => {
                        self.inner.store.reject(ticket, e.clone());
                        Err(e)
                    }
                }
            }
        }
    }

    fn finish(&self, key: &SearchKey, outcome: &Outcome) {
        {
            let mut view = lock(&self.inner.view);
            match view.as_mut() {
                Some(current) if current.key == *key => {
                    current.state = match outcome {
                        Ok(data) => RequestState::Resolved(Arc::clone(data)),
                        Err(e) => RequestState::Rejected(e.clone()),
                    };
                }
                _ => {
                    tracing::debug!(key = %key.digest(), "superseded result not applied");
                    return;
                }
            }
        }

        if let Ok(data) = outcome {
            self.inner.prefetch.arm_idle(PrefetchContext::new(key.clone(), data));
        }
    }

    /// State of the current foreground request.
    pub fn state(&self) -> RequestState {
        lock(&self.inner.view).as_ref().map(|v| v.state.clone()).unwrap_or_default()
    }

    pub fn current_key(&self) -> Option<SearchKey> {
        lock(&self.inner.view).as_ref().map(|v| v.key.clone())
    }

    /// Warm `page` of the current search right away, e.g. ahead of a
    /// "go to page" action.
    ///
    /// Refused until the current page has resolved.
    pub async fn prefetch_page(&self, page: u32) -> PrefetchOutcome {
        match self.inner.context() {
            Some(ctx) => self.inner.prefetch.gated_prefetch(page, &ctx).await,
            None => PrefetchOutcome::OutOfRange,
        }
    }

    /// Handlers for a navigation link pointing at `page`.
    ///
    /// The handlers hold a weak reference; once the coordinator is gone they
    /// do nothing.
    pub fn hover_handlers_for(&self, page: u32) -> HoverHandlers {
        HoverHandlers { page, inner: Arc::downgrade(&self.inner) }
    }

    /// Pages reachable for the current search, once its total is known.
    pub fn total_pages(&self) -> Option<u32> {
        let ctx = self.inner.context()?;
        let total = ctx.total_count?;
        let cap_max = self.inner.prefetch.options().cap_max;
        Some(pager::effective_total_pages(total, cap_max, ctx.key.per_page()))
    }

    /// Navigation window around the current page.
    pub fn window(&self, size: u32) -> Vec<u32> {
        match (self.current_key(), self.total_pages()) {
            (Some(key), Some(total)) => pager::build_window(key.page(), total, size),
            _ => Vec::new(),
        }
    }

    /// Forget the current page and revoke every prefetch timer.
    pub fn teardown(&self) {
        self.inner.prefetch.teardown();
        *lock(&self.inner.view) = None;
    }
}

/// Anticipation signals for one navigation target.
#[derive(Debug, Clone)]
pub struct HoverHandlers {
    page: u32,
    inner: Weak<Inner>,
}

impl HoverHandlers {
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Pointer entered the link.
    pub fn on_enter(&self) -> bool {
        self.signal()
    }

    /// The link received keyboard focus.
    pub fn on_focus(&self) -> bool {
        self.signal()
    }

    pub fn on_touch_start(&self) -> bool {
        self.signal()
    }

    fn signal(&self) -> bool {
        self.inner.upgrade().is_some_and(|inner| inner.signal_hover(self.page))
    }
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner").field("store", &self.store).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::key::SearchType;
    use crate::scheduler::ManualScheduler;
    use crate::testing::MockService;
    use std::time::Duration;

    struct Fixture {
        store: CacheStore,
        service: Arc<MockService>,
        scheduler: Arc<ManualScheduler>,
        coordinator: SearchCoordinator,
    }

    fn fixture(total: u64) -> Fixture {
        let store = CacheStore::default();
        let service = Arc::new(MockService::new(total));
        let scheduler = Arc::new(ManualScheduler::new());
        let coordinator =
            SearchCoordinator::new(store.clone(), service.clone(), scheduler.clone(), PrefetchOptions::default());
        Fixture { store, service, scheduler, coordinator }
    }

    fn params(page: u32) -> SearchParams {
        SearchParams::new(SearchType::Issues, "rust").with_page(page)
    }

    #[tokio::test]
    async fn test_fetch_then_cache_hit() {
        let f = fixture(25);
        let first = f.coordinator.fetch(&params(1)).await.unwrap();
        let second = f.coordinator.fetch(&params(1)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.service.calls(), 1);
        assert_eq!(f.coordinator.state().data().map(|d| d.total_count), Some(25));
    }

    #[tokio::test]
    async fn test_simultaneous_requests_dedup() {
        let f = fixture(25);
        let hold = f.service.hold();
        let other = f.coordinator.clone();

        let p = params(1);
        let (a, b, _) = tokio::join!(f.coordinator.fetch(&p), other.fetch(&p), async {
            tokio::task::yield_now().await;
            hold.release();
        });

        assert_eq!(f.service.calls(), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn test_state_pending_while_in_flight() {
        let f = fixture(25);
        let hold = f.service.hold();

        let p = params(1);
        let (_, _) = tokio::join!(f.coordinator.fetch(&p), async {
            tokio::task::yield_now().await;
            assert!(f.coordinator.state().is_pending());
            hold.release();
        });
        assert!(f.coordinator.state().data().is_some());
    }

    #[tokio::test]
    async fn test_foreground_error_surfaced_and_not_cached() {
        let f = fixture(25);
        f.service.fail_page(1, SearchError::new(ErrorKind::Validation, "bad query").with_status(422));

        let err = f.coordinator.fetch(&params(1)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(f.coordinator.state().error().map(|e| e.kind), Some(ErrorKind::Validation));
        assert!(f.store.get(&make_key(&params(1))).is_none());

        f.coordinator.fetch(&params(1)).await.unwrap_err();
        assert_eq!(f.service.calls(), 2);
    }

    #[tokio::test]
    async fn test_idle_prefetch_after_success() {
        let f = fixture(25);
        f.coordinator.fetch(&params(1)).await.unwrap();
        assert!(f.coordinator.prefetch().idle_armed());

        f.scheduler.run_idle().await;
        assert!(f.store.has(&make_key(&params(2))));

        f.coordinator.fetch(&params(2)).await.unwrap();
        assert_eq!(f.service.pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_foreground_joins_inflight_prefetch() {
        let f = fixture(25);
        f.coordinator.fetch(&params(1)).await.unwrap();
        let hold = f.service.hold();
        let other = f.coordinator.clone();

        let (ran, page, _) = tokio::join!(
            f.scheduler.run_idle(),
            async {
                tokio::task::yield_now().await;
                other.fetch(&params(2)).await
            },
            async {
                for _ in 0..3 {
                    tokio::task::yield_now().await;
                }
                assert!(f.coordinator.state().is_pending());
                assert_eq!(f.service.calls(), 2);
                hold.release();
            }
        );

        assert_eq!(ran, 1);
        assert_eq!(f.service.pages(), vec![1, 2]);
        let page = page.unwrap();
        let cached = f.store.get(&make_key(&params(2))).and_then(|e| e.data).unwrap();
        assert!(Arc::ptr_eq(&page, &cached));
        assert_eq!(f.coordinator.state().data().map(|d| d.items.len()), Some(10));
    }

    #[tokio::test]
    async fn test_page_change_cancels_stale_idle() {
        let f = fixture(50);
        f.coordinator.fetch(&params(1)).await.unwrap();
        f.coordinator.fetch(&params(3)).await.unwrap();

        assert_eq!(f.scheduler.pending_idle(), 1);
        assert!(f.scheduler.cancelled() >= 1);

        f.scheduler.run_idle().await;
        assert_eq!(f.service.pages(), vec![1, 3, 4]);
        assert!(f.store.get(&make_key(&params(2))).is_none());
    }

    #[tokio::test]
    async fn test_background_failure_keeps_foreground() {
        let f = fixture(25);
        f.service.fail_page(3, SearchError::new(ErrorKind::RateLimited, "slow down"));
        f.coordinator.fetch(&params(2)).await.unwrap();

        assert_eq!(f.coordinator.prefetch_page(3).await, PrefetchOutcome::Failed);
        assert!(f.store.get(&make_key(&params(3))).is_none());

        let state = f.coordinator.state();
        assert_eq!(state.data().map(|d| d.items.len()), Some(10));
        assert!(state.error().is_none());
        assert!(f.store.has(&make_key(&params(2))));
    }

    #[tokio::test]
    async fn test_prefetch_page_bounds() {
        let f = fixture(25);
        assert_eq!(f.coordinator.prefetch_page(2).await, PrefetchOutcome::OutOfRange);

        f.coordinator.fetch(&params(1)).await.unwrap();
        assert_eq!(f.coordinator.total_pages(), Some(3));
        assert_eq!(f.coordinator.prefetch_page(4).await, PrefetchOutcome::OutOfRange);
        assert_eq!(f.coordinator.prefetch_page(3).await, PrefetchOutcome::Completed);
        assert_eq!(f.coordinator.prefetch_page(1).await, PrefetchOutcome::AlreadyRequested);
    }

    #[tokio::test]
    async fn test_hover_handlers() {
        let f = fixture(100);
        let handlers = f.coordinator.hover_handlers_for(5);
        assert!(!handlers.on_enter());

        f.coordinator.fetch(&params(1)).await.unwrap();
        assert!(handlers.on_enter());
        f.scheduler.advance(Duration::from_millis(100)).await;
        assert!(handlers.on_focus());
        f.scheduler.advance(Duration::from_millis(100)).await;
        assert!(handlers.on_touch_start());
        f.scheduler.advance(Duration::from_millis(149)).await;
        assert_eq!(f.service.pages(), vec![1]);

        f.scheduler.advance(Duration::from_millis(1)).await;
        assert_eq!(f.service.pages(), vec![1, 5]);
    }

    #[tokio::test]
    async fn test_query_change_revokes_hover_timers() {
        let f = fixture(100);
        f.coordinator.fetch(&params(1)).await.unwrap();
        f.coordinator.hover_handlers_for(4).on_enter();
        f.coordinator.hover_handlers_for(6).on_enter();

        let other = SearchParams::new(SearchType::Issues, "tokio");
        f.coordinator.fetch(&other).await.unwrap();
        assert_eq!(f.coordinator.prefetch().hover_pending(), 0);

        f.scheduler.advance(Duration::from_secs(1)).await;
        assert!(!f.service.pages().contains(&4));
        assert!(!f.service.pages().contains(&6));
    }

    #[tokio::test]
    async fn test_superseded_result_not_applied() {
        let f = fixture(25);
        let hold = f.service.hold();

        let slow = params(1);
        let (_, _) = tokio::join!(f.coordinator.fetch(&slow), async {
            tokio::task::yield_now().await;
            f.coordinator.teardown();
            hold.release();
        });

        assert!(matches!(f.coordinator.state(), RequestState::Idle));
        assert!(!f.coordinator.prefetch().idle_armed());
        assert!(f.store.has(&make_key(&slow)));
    }

    #[tokio::test]
    async fn test_end_to_end_window() {
        let f = fixture(25);
        f.coordinator.fetch(&params(2)).await.unwrap();
        assert_eq!(f.coordinator.total_pages(), Some(3));
        assert_eq!(f.coordinator.window(5), vec![1, 2, 3]);
        assert!(!f.coordinator.hover_handlers_for(4).on_enter());
    }

    #[tokio::test]
    async fn test_handlers_inert_after_drop() {
        let f = fixture(100);
        f.coordinator.fetch(&params(1)).await.unwrap();
        let handlers = f.coordinator.hover_handlers_for(3);
        let Fixture { coordinator, scheduler, .. } = f;

        drop(coordinator);
        assert!(!handlers.on_enter());
        assert_eq!(scheduler.pending_idle(), 0);
    }
}
