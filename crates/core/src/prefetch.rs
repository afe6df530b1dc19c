//! Speculative prefetch triggers.
//!
//! Two independent triggers warm the cache for pages the user has not asked
//! for yet:
//!
//! - **Idle look-ahead**: after the current page resolves, page `n + 1` is
//!   fetched when the host reports idle capacity (or after a timeout).
//! - **Hover/focus anticipation**: a pointer-enter, focus, or touch on a page
//!   link arms a short per-page debounce timer; if it expires, that page is
//!   fetched.
//!
//! Both end in [`PrefetchScheduler::gated_prefetch`], which refuses pages
//! outside the capped result window and keys already present in the store.
//! Background failures are logged and dropped; they never reach the caller and
//! never leave an entry behind.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::{CacheStore, Lookup};
use crate::debounce::Debouncer;
use crate::key::SearchKey;
use crate::model::SearchResult;
use crate::pager::{self, CAP_MAX_DEFAULT};
use crate::scheduler::{Scheduler, TaskHandle, lock};
use crate::service::SearchService;

/// Default upper bound on waiting for idle capacity.
pub const IDLE_TIMEOUT_DEFAULT: Duration = Duration::from_millis(1_500);

/// Default hover/focus debounce.
pub const HOVER_DEBOUNCE_DEFAULT: Duration = Duration::from_millis(150);

/// Prefetch tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchOptions {
    /// Largest result window the service will paginate through.
    pub cap_max: u64,
    pub idle_timeout: Duration,
    pub hover_debounce: Duration,
    pub enable_idle_prefetch: bool,
    pub enable_hover_prefetch: bool,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            cap_max: CAP_MAX_DEFAULT,
            idle_timeout: IDLE_TIMEOUT_DEFAULT,
            hover_debounce: HOVER_DEBOUNCE_DEFAULT,
            enable_idle_prefetch: true,
            enable_hover_prefetch: true,
        }
    }
}

/// The displayed page a prefetch decision is made against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchContext {
    /// Key of the page currently displayed.
    pub key: SearchKey,
    /// Total matches, unknown until the first page resolved.
    pub total_count: Option<u64>,
    pub item_count: usize,
}

impl PrefetchContext {
    pub fn new(key: SearchKey, result: &SearchResult) -> Self {
        Self { key, total_count: Some(result.total_count), item_count: result.items.len() }
    }

    /// Context before anything resolved; every gate check fails.
    pub fn unresolved(key: SearchKey) -> Self {
        Self { key, total_count: None, item_count: 0 }
    }

    pub fn page(&self) -> u32 {
        self.key.page()
    }
}

/// What a gated prefetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// The page lies outside the capped result window, or no total is known.
    OutOfRange,
    /// The key is already cached or being fetched.
    AlreadyRequested,
    /// Fetched and stored.
    Completed,
    /// The fetch failed; nothing was stored.
    Failed,
}

#[derive(Clone)]
struct Gate {
    store: CacheStore,
    service: Arc<dyn SearchService>,
    cap_max: u64,
}

impl Gate {
    fn admits(&self, target: u32, ctx: &PrefetchContext) -> Result<SearchKey, PrefetchOutcome> {
        if !pager::can_prefetch(target, ctx.total_count, self.cap_max, ctx.key.per_page()) {
            return Err(PrefetchOutcome::OutOfRange);
        }
        let key = ctx.key.with_page(target);
        if self.store.get(&key).is_some() {
            return Err(PrefetchOutcome::AlreadyRequested);
        }
        Ok(key)
    }

    async fn run(&self, target: u32, ctx: &PrefetchContext) -> PrefetchOutcome {
        let key = match self.admits(target, ctx) {
            Ok(key) => key,
            Err(outcome) => return outcome,
        };

        let Lookup::Created(ticket) = self.store.get_or_create_pending(&key) else {
            return PrefetchOutcome::AlreadyRequested;
        };

        tracing::debug!(page = target, key = %key.digest(), "prefetching");
        match self.service.fetch(&key).await {
            Ok(result) => {
                self.store.resolve(ticket, Arc::new(result));
                PrefetchOutcome::Completed
            }
            Err(e) => {
                tracing::debug!(page = target, error = %e, "prefetch failed, discarding");
                self.store.reject(ticket, e);
                PrefetchOutcome::Failed
            }
        }
    }
}

type IdleSlot = Arc<Mutex<Option<(u64, TaskHandle)>>>;

/// Owner of the idle registration and the per-page hover timers.
///
/// Dropping the scheduler revokes everything it armed.
pub struct PrefetchScheduler {
    gate: Gate,
    scheduler: Arc<dyn Scheduler>,
    options: PrefetchOptions,
    idle: IdleSlot,
    idle_generation: AtomicU64,
    hover: Debouncer<u32>,
}

impl PrefetchScheduler {
    pub fn new(
        store: CacheStore, service: Arc<dyn SearchService>, scheduler: Arc<dyn Scheduler>, options: PrefetchOptions,
    ) -> Self {
        let hover = Debouncer::new(Arc::clone(&scheduler), options.hover_debounce);
        Self {
            gate: Gate { store, service, cap_max: options.cap_max },
            scheduler,
            options,
            idle: Arc::new(Mutex::new(None)),
            idle_generation: AtomicU64::new(0),
            hover,
        }
    }

    pub fn options(&self) -> &PrefetchOptions {
        &self.options
    }

    /// Fetch `target` into the store unless the gate refuses it.
    ///
    /// Concurrent calls for the same page converge on one pending entry.
    pub async fn gated_prefetch(&self, target: u32, ctx: &PrefetchContext) -> PrefetchOutcome {
        self.gate.run(target, ctx).await
    }

    /// Arm the idle look-ahead for the page after `ctx`.
    ///
    /// Any previous idle registration is revoked first. Returns false when
    /// nothing was armed.
    pub fn arm_idle(&self, ctx: PrefetchContext) -> bool {
        self.cancel_idle();

        if !self.options.enable_idle_prefetch || ctx.item_count == 0 {
            return false;
        }
        let next = ctx.page().saturating_add(1);
        if let Err(outcome) = self.gate.admits(next, &ctx) {
            tracing::trace!(page = next, ?outcome, "idle prefetch not armed");
            return false;
        }

        let generation = self.idle_generation.fetch_add(1, Ordering::Relaxed);
        let gate = self.gate.clone();
        let slot = Arc::clone(&self.idle);

        let mut idle = lock(&self.idle);
        let handle = self.scheduler.schedule_idle(
            Box::pin(async move {
                {
                    let mut idle = lock(&slot);
                    if idle.is_some_and(|(g, _)| g == generation) {
                        *idle = None;
                    }
                }
                gate.run(next, &ctx).await;
            }),
            self.options.idle_timeout,
        );
        *idle = Some((generation, handle));

        tracing::debug!(page = next, "idle prefetch armed");
        true
    }

    /// Revoke the outstanding idle registration, if any.
    pub fn cancel_idle(&self) -> bool {
        match lock(&self.idle).take() {
            Some((_, handle)) => self.scheduler.cancel_idle(handle),
            None => false,
        }
    }

    pub fn idle_armed(&self) -> bool {
        lock(&self.idle).is_some()
    }

    /// Record a hover, focus, or touch on a link to `page`.
    ///
    /// Restarts that page's debounce timer; other pages' timers are left
    /// alone. Returns false when the signal was ignored.
    pub fn signal_hover(&self, page: u32, ctx: &PrefetchContext) -> bool {
        if !self.options.enable_hover_prefetch {
            return false;
        }
        if self.gate.admits(page, ctx).is_err() {
            return false;
        }

        let gate = self.gate.clone();
        let ctx = ctx.clone();
        self.hover.call(
            page,
            Box::pin(async move {
                gate.run(page, &ctx).await;
            }),
        );
        true
    }

    /// Number of armed hover timers.
    pub fn hover_pending(&self) -> usize {
        self.hover.pending()
    }

    /// Revoke the idle registration and every hover timer.
    pub fn teardown(&self) {
        let idle = self.cancel_idle();
        let hover = self.hover.cancel_all();
        if idle || hover > 0 {
            tracing::debug!(idle, hover, "prefetch triggers revoked");
        }
    }
}

impl Drop for PrefetchScheduler {
    fn drop(&mut self) {
        self.teardown();
    }
}
