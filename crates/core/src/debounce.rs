//! Delay-and-coalesce primitives on top of a [`Scheduler`].
//!
//! [`Debouncer`] keeps one timer per key: calling it again for the same key
//! restarts that key's timer, other keys are unaffected. [`DebouncedValue`]
//! is the single-key form that publishes the latest value once it has stopped
//! changing.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use crate::scheduler::{Scheduler, Task, TaskHandle, lock};

type Timers<K> = Arc<Mutex<HashMap<K, (u64, TaskHandle)>>>;

/// Per-key debounce timers.
pub struct Debouncer<K> {
    scheduler: Arc<dyn Scheduler>,
    delay: Duration,
    generation: AtomicU64,
    timers: Timers<K>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        Self { scheduler, delay, generation: AtomicU64::new(0), timers: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Run `task` once `key` has been quiet for the configured delay.
    ///
    /// A timer already armed for `key` is revoked and its task dropped.
    pub fn call(&self, key: K, task: Task) {
        let mut timers = lock(&self.timers);
        if let Some((_, previous)) = timers.remove(&key) {
            self.scheduler.cancel_delayed(previous);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let slots = Arc::clone(&self.timers);
        let fired = key.clone();
        let handle = self.scheduler.schedule_delayed(
            Box::pin(async move {
                {
                    let mut timers = lock(&slots);
                    if timers.get(&fired).is_some_and(|(g, _)| *g == generation) {
                        timers.remove(&fired);
                    }
                }
                task.await;
            }),
            self.delay,
        );
        timers.insert(key, (generation, handle));
    }

    /// Revoke the timer for `key`, if any.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.timers).remove(key) {
            Some((_, handle)) => self.scheduler.cancel_delayed(handle),
            None => false,
        }
    }

    /// Revoke every outstanding timer. Returns how many were armed.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<TaskHandle> = lock(&self.timers).drain().map(|(_, (_, handle))| handle).collect();
        for handle in &drained {
            self.scheduler.cancel_delayed(*handle);
        }
        drained.len()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.timers).contains_key(key)
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        lock(&self.timers).len()
    }
}

/// A value that is published only after it stopped changing for a delay.
///
/// Subscribers see `None` until the first value settles.
pub struct DebouncedValue<T> {
    debouncer: Debouncer<()>,
    last: Mutex<Option<T>>,
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> DebouncedValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(scheduler: Arc<dyn Scheduler>, delay: Duration) -> Self {
        let (tx, _) = watch::channel(None);
        Self { debouncer: Debouncer::new(scheduler, delay), last: Mutex::new(None), tx: Arc::new(tx) }
    }

    /// Feed a new input value, restarting the delay if it differs from the
    /// previous input.
    pub fn set(&self, value: T) {
        {
            let mut last = lock(&self.last);
            if last.as_ref() == Some(&value) && self.debouncer.is_pending(&()) {
                return;
            }
            *last = Some(value.clone());
        }

        let tx = Arc::clone(&self.tx);
        self.debouncer.call(
            (),
            Box::pin(async move {
                tx.send_if_modified(|current| {
                    if current.as_ref() == Some(&value) {
                        return false;
                    }
                    *current = Some(value);
                    true
                });
            }),
        );
    }

    /// The most recently settled value.
    pub fn settled(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }

    /// Drop any value still waiting to settle.
    pub fn cancel(&self) -> bool {
        self.debouncer.cancel(&())
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending(&())
    }
}
