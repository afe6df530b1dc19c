//! Virtual-clock scheduler.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{Scheduler, Task, TaskHandle, lock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Delayed,
    Idle,
}

struct Pending {
    kind: Kind,
    due: Duration,
    task: Task,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    pending: HashMap<u64, Pending>,
    cancelled: usize,
}

/// Scheduler whose clock only moves when told to.
///
/// Time starts at zero. [`ManualScheduler::advance`] runs every delayed task
/// (and every idle task whose timeout elapsed) that falls due, in due order,
/// awaiting each one to completion before the next. [`ManualScheduler::run_idle`]
/// plays the host reporting idle capacity.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        lock(&self.state).now
    }

    pub fn pending_delayed(&self) -> usize {
        self.count(Kind::Delayed)
    }

    pub fn pending_idle(&self) -> usize {
        self.count(Kind::Idle)
    }

    /// Number of successful cancellations so far.
    pub fn cancelled(&self) -> usize {
        lock(&self.state).cancelled
    }

    fn count(&self, kind: Kind) -> usize {
        lock(&self.state).pending.values().filter(|p| p.kind == kind).count()
    }

    /// Move the clock forward by `by`, running whatever falls due.
    ///
    /// Returns the number of tasks run. Tasks scheduled by running tasks are
    /// picked up if they fall due within the same window.
    pub async fn advance(&self, by: Duration) -> usize {
        let target = lock(&self.state).now + by;
        let mut ran = 0;

        loop {
            let next = {
                let mut state = lock(&self.state);
                let due = state
                    .pending
                    .iter()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(id, p)| (p.due, **id))
                    .map(|(id, _)| *id);
                due.and_then(|id| state.pending.remove(&id)).map(|p| {
                    state.now = state.now.max(p.due);
                    p.task
                })
            };
            match next {
                Some(task) => {
                    task.await;
                    ran += 1;
                }
                None => break,
            }
        }

        lock(&self.state).now = target;
        ran
    }

    /// Report idle capacity: run every idle task registered so far.
    pub async fn run_idle(&self) -> usize {
        let tasks: Vec<Task> = {
            let mut state = lock(&self.state);
            let mut ids: Vec<u64> = state
                .pending
                .iter()
                .filter(|(_, p)| p.kind == Kind::Idle)
                .map(|(id, _)| *id)
                .collect();
            ids.sort_unstable();
            ids.into_iter()
                .filter_map(|id| state.pending.remove(&id))
                .map(|p| p.task)
                .collect()
        };

        let ran = tasks.len();
        for task in tasks {
            task.await;
        }
        ran
    }

    fn register(&self, kind: Kind, task: Task, after: Duration) -> TaskHandle {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = state.next_id;
        let due = state.now + after;
        state.pending.insert(id, Pending { kind, due, task });
        TaskHandle(id)
    }

    fn cancel(&self, kind: Kind, handle: TaskHandle) -> bool {
        let mut state = lock(&self.state);
        match state.pending.get(&handle.0) {
            Some(p) if p.kind == kind => {
                state.pending.remove(&handle.0);
                state.cancelled += 1;
                true
            }
            _ => false,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_idle(&self, task: Task, timeout: Duration) -> TaskHandle {
        self.register(Kind::Idle, task, timeout)
    }

    fn cancel_idle(&self, handle: TaskHandle) -> bool {
        self.cancel(Kind::Idle, handle)
    }

    fn schedule_delayed(&self, task: Task, delay: Duration) -> TaskHandle {
        self.register(Kind::Delayed, task, delay)
    }

    fn cancel_delayed(&self, handle: TaskHandle) -> bool {
        self.cancel(Kind::Delayed, handle)
    }
}
