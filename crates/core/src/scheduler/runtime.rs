//! Scheduler backed by the tokio runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::{Scheduler, Task, TaskHandle, lock};

type Registry = Arc<Mutex<HashMap<u64, AbortHandle>>>;

/// Runs scheduled tasks as tokio tasks.
///
/// Idle capacity is reported by the host through [`TokioScheduler::notify_idle`]
/// (a terminal front-end calls it whenever it blocks on input). Idle tasks
/// registered before the notification run on it; the rest wait for their
/// timeout.
///
/// Must be used from within a tokio runtime. Dropping the scheduler aborts
/// every task that has not started yet.
#[derive(Debug)]
pub struct TokioScheduler {
    next_id: AtomicU64,
    tasks: Registry,
    idle: watch::Sender<u64>,
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioScheduler {
    pub fn new() -> Self {
        let (idle, _) = watch::channel(0);
        Self { next_id: AtomicU64::new(1), tasks: Arc::new(Mutex::new(HashMap::new())), idle }
    }

    /// Report idle capacity, releasing every idle task registered so far.
    pub fn notify_idle(&self) {
        self.idle.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    /// Number of tasks registered but not yet started.
    pub fn outstanding(&self) -> usize {
        lock(&self.tasks).len()
    }

    fn spawn(&self, wait: Task, task: Task) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Held across the spawn so the task cannot deregister before it is registered.
        let mut registry = lock(&self.tasks);
        let join = tokio::spawn(async move {
            wait.await;
            if lock(&tasks).remove(&id).is_none() {
                return;
            }
            task.await;
        });
        registry.insert(id, join.abort_handle());

        TaskHandle(id)
    }

    fn cancel(&self, handle: TaskHandle) -> bool {
        match lock(&self.tasks).remove(&handle.0) {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_idle(&self, task: Task, timeout: Duration) -> TaskHandle {
        let mut idle = self.idle.subscribe();
        let wait: Task = Box::pin(async move {
            tokio::select! {
                _ = idle.changed() => {}
                _ = tokio::time::sleep(timeout) => {}
            }
        });
        self.spawn(wait, task)
    }

    fn cancel_idle(&self, handle: TaskHandle) -> bool {
        self.cancel(handle)
    }

    fn schedule_delayed(&self, task: Task, delay: Duration) -> TaskHandle {
        self.spawn(Box::pin(tokio::time::sleep(delay)), task)
    }

    fn cancel_delayed(&self, handle: TaskHandle) -> bool {
        self.cancel(handle)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, abort) in lock(&self.tasks).drain() {
            abort.abort();
        }
    }
}
