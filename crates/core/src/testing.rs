//! In-memory search service double for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::SearchError;
use crate::key::SearchKey;
use crate::model::{SearchItem, SearchResult};
use crate::scheduler::lock;
use crate::service::SearchService;

/// Serves `total` synthetic items, counts calls, and can fail or stall pages.
pub(crate) struct MockService {
    total: u64,
    calls: AtomicUsize,
    pages: Mutex<Vec<u32>>,
    failures: Mutex<HashMap<u32, SearchError>>,
    released: Arc<watch::Sender<bool>>,
}

/// Stalls every fetch until released.
pub(crate) struct Hold {
    released: Arc<watch::Sender<bool>>,
}

impl Hold {
    pub(crate) fn release(&self) {
        self.released.send_replace(true);
    }
}

impl MockService {
    pub(crate) fn new(total: u64) -> Self {
        let (released, _) = watch::channel(true);
        Self {
            total,
            calls: AtomicUsize::new(0),
            pages: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            released: Arc::new(released),
        }
    }

    /// Page `page` of a result with `total` matches.
    pub(crate) fn page_result(total: u64, per_page: u32) -> SearchResult {
        Self::slice(total, 1, per_page)
    }

    fn slice(total: u64, page: u32, per_page: u32) -> SearchResult {
        let start = u64::from(page.saturating_sub(1)) * u64::from(per_page);
        let count = total.saturating_sub(start).min(u64::from(per_page));
        let items = (start..start + count)
            .map(|i| SearchItem { id: Some(i + 1), title: Some(format!("item {}", i + 1)), ..Default::default() })
            .collect();
        SearchResult { total_count: total, incomplete_results: false, items }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Pages requested so far, in call order.
    pub(crate) fn pages(&self) -> Vec<u32> {
        lock(&self.pages).clone()
    }

    pub(crate) fn fail_page(&self, page: u32, error: SearchError) {
        lock(&self.failures).insert(page, error);
    }

    pub(crate) fn hold(&self) -> Hold {
        self.released.send_replace(false);
        Hold { released: Arc::clone(&self.released) }
    }
}

#[async_trait]
impl SearchService for MockService {
    async fn fetch(&self, key: &SearchKey) -> Result<SearchResult, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.pages).push(key.page());

        let mut released = self.released.subscribe();
        let _ = released.wait_for(|r| *r).await;

        if let Some(error) = lock(&self.failures).get(&key.page()).cloned() {
            return Err(error);
        }
        Ok(Self::slice(self.total, key.page(), key.per_page()))
    }
}
