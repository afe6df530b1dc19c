//! Injectable timer and idle-callback registry.
//!
//! Prefetch triggers never touch tokio timers directly; they go through a
//! [`Scheduler`] so that production code runs on [`TokioScheduler`] while tests
//! drive a [`ManualScheduler`] on a virtual clock. Every registration returns a
//! [`TaskHandle`] that can be revoked until the task starts running.

mod manual;
mod runtime;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// Deferred unit of work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Revocation handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host capability for deferred execution.
pub trait Scheduler: Send + Sync {
    /// Run `task` once the host reports idle capacity, or unconditionally after
    /// `timeout`.
    fn schedule_idle(&self, task: Task, timeout: Duration) -> TaskHandle;

    /// Revoke an idle registration. Returns false if it already ran or was
    /// already cancelled.
    fn cancel_idle(&self, handle: TaskHandle) -> bool;

    /// Run `task` after `delay`.
    fn schedule_delayed(&self, task: Task, delay: Duration) -> TaskHandle;

    /// Revoke a delayed task. Returns false if it already ran or was already
    /// cancelled.
    fn cancel_delayed(&self, handle: TaskHandle) -> bool;
}

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
