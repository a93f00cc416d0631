//! FIFO work queue shared by a pool's workers.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::thread::{PoolShared, ThreadService};
use super::{PoolError, PoolResult, RunningMean, ThreadPool, WorkQueue};
use crate::task::{panic_message, Task, TaskId};

/// A task waiting in a queue.
pub(crate) struct QueuedTask {
    pub(crate) id: TaskId,
    pub(crate) task: Box<dyn Task>,
    pub(crate) enqueued_at: Instant,
}

/// What a worker should do next.
pub(crate) enum Next {
    Run(QueuedTask),
    /// The pool was terminated.
    Stop,
    /// Idle eviction released this worker's thread slot.
    Retire,
}

struct QueueState {
    pending: VecDeque<QueuedTask>,
    /// Workers blocked on `available`.
    waiting: usize,
    terminated: bool,
}

/// Production [`WorkQueue`].
///
/// The deque, the waiting-worker count and the termination flag live under
/// one mutex; every enqueue, dequeue and wake signal happens while holding it.
/// Counters are mirrored into atomics so statistics reads never take the lock.
pub struct TaskQueue {
    name: String,
    index: usize,
    state: Mutex<QueueState>,
    available: Condvar,
    total_added: AtomicU64,
    in_queue: AtomicUsize,
    wait: RunningMean,
    /// Live workers bound to this queue.
    workers: AtomicUsize,
    pool: RwLock<Weak<ThreadService>>,
}

impl TaskQueue {
    pub(crate) fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                waiting: 0,
                terminated: false,
            }),
            available: Condvar::new(),
            total_added: AtomicU64::new(0),
            in_queue: AtomicUsize::new(0),
            wait: RunningMean::default(),
            workers: AtomicUsize::new(0),
            pool: RwLock::new(Weak::new()),
        }
    }

    /// Point the queue at the pool that services it.
    ///
    /// The queue keeps a weak reference only; it never extends the pool's
    /// lifetime.
    pub fn set_thread_pool(&self, pool: &Arc<ThreadService>) {
        *self.pool.write().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(pool);
    }

    /// Position of this queue within its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.load(Ordering::Acquire)
    }

    pub(crate) fn worker_started(&self) {
        self.workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn worker_stopped(&self) {
        self.workers.fetch_sub(1, Ordering::AcqRel);
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn owner(&self) -> Option<Arc<ThreadService>> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Block until there is a task to run, the pool terminates, or (with
    /// idle eviction) this worker has idled past the timeout.
    pub(crate) fn next_task(&self, shared: &PoolShared) -> Next {
        let mut state = self.lock_state();
        let mut idle_since = Instant::now();

        loop {
            if state.terminated {
                return Next::Stop;
            }

            if let Some(item) = state.pending.pop_front() {
                self.in_queue.fetch_sub(1, Ordering::Relaxed);
                self.wait.record(item.enqueued_at.elapsed());
                if !state.pending.is_empty() && state.waiting > 0 {
                    self.available.notify_one();
                }
                return Next::Run(item);
            }

            let idle_limit = shared.idle_limit();
            state.waiting += 1;
            shared.idle_threads.fetch_add(1, Ordering::Relaxed);

            state = match idle_limit {
                Some(limit) => {
                    let remaining = limit.saturating_sub(idle_since.elapsed());
                    match self.available.wait_timeout(state, remaining) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => self
                    .available
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };

            state.waiting -= 1;
            shared.idle_threads.fetch_sub(1, Ordering::Relaxed);

            if let Some(limit) = idle_limit {
                if idle_since.elapsed() >= limit && state.pending.is_empty() && !state.terminated
                {
                    if shared.try_retire() {
                        return Next::Retire;
                    }
                    // At the minimum: keep waiting for another full period
                    idle_since = Instant::now();
                }
            }
        }
    }

    /// Mark the queue terminated, wake every waiter and hand back whatever
    /// was still pending.
    pub(crate) fn close(&self) -> Vec<QueuedTask> {
        let mut state = self.lock_state();
        state.terminated = true;
        let drained: Vec<QueuedTask> = state.pending.drain(..).collect();
        self.in_queue.store(0, Ordering::Relaxed);
        self.available.notify_all();
        drained
    }

    /// Invoke `cancel` on a task, containing any panic it raises.
    pub(crate) fn cancel_quietly(&self, id: TaskId, task: Box<dyn Task>) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.cancel())) {
            warn!(
                queue = %self.name,
                task = %id,
                error = %panic_message(payload.as_ref()),
                "task cancellation panicked"
            );
        }
    }
}

impl WorkQueue for TaskQueue {
    fn add_work(&self, task: Box<dyn Task>) -> PoolResult<TaskId> {
        let id = TaskId::next();

        let needs_thread = {
            let mut state = self.lock_state();
            if state.terminated {
                drop(state);
                debug!(queue = %self.name, task = %id, "work rejected by terminated pool");
                self.cancel_quietly(id, task);
                return Err(PoolError::PoolTerminated);
            }

            state.pending.push_back(QueuedTask {
                id,
                task,
                enqueued_at: Instant::now(),
            });
            self.total_added.fetch_add(1, Ordering::Relaxed);
            self.in_queue.fetch_add(1, Ordering::Relaxed);
            self.available.notify_one();

            state.waiting == 0
        };

        trace!(queue = %self.name, task = %id, "work added");

        if needs_thread {
            if let Some(pool) = self.owner() {
                if let Err(e) = pool.grow(self.index) {
                    warn!(queue = %self.name, error = %e, "could not add worker thread");
                }
            }
        }

        Ok(id)
    }

    fn remove_task(&self, id: TaskId) -> bool {
        let removed = {
            let mut state = self.lock_state();
            let position = state.pending.iter().position(|item| item.id == id);
            let removed = position.and_then(|pos| state.pending.remove(pos));
            if removed.is_some() {
                self.in_queue.fetch_sub(1, Ordering::Relaxed);
            }
            removed
        };

        match removed {
            Some(item) => {
                debug!(queue = %self.name, task = %id, "queued task removed");
                self.cancel_quietly(item.id, item.task);
                true
            }
            None => false,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn total_work_items_added(&self) -> u64 {
        self.total_added.load(Ordering::Relaxed)
    }

    fn work_items_in_queue(&self) -> usize {
        self.in_queue.load(Ordering::Relaxed)
    }

    fn average_time_in_queue(&self) -> Duration {
        self.wait.mean()
    }

    fn thread_pool(&self) -> Option<Arc<dyn ThreadPool>> {
        self.owner().map(|pool| pool as Arc<dyn ThreadPool>)
    }
}
