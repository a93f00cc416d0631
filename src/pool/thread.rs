//! Lazily growing thread pool implementation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::handle::{execute_on, TaskHandle};
use super::queue::TaskQueue;
use super::worker::Worker;
use super::{PoolError, PoolResult, RunningMean, ThreadPool, WorkQueue};
use crate::config::PoolConfig;
use crate::task::{Task, TaskId};

/// State shared between a pool and its workers.
///
/// Workers hold this (and their queue) rather than the pool itself, so the
/// pool is dropped, and therefore terminated, as soon as its last owner
/// lets go.
pub(crate) struct PoolShared {
    pub(crate) name: String,
    min_threads: usize,
    max_threads: usize,
    idle_timeout: Duration,
    evict_idle: bool,
    /// Raised by `terminate`; doubles as the workers' interruption hint.
    pub(crate) terminated: Arc<AtomicBool>,
    current_threads: AtomicUsize,
    pub(crate) idle_threads: AtomicUsize,
    pub(crate) completion: RunningMean,
}

impl PoolShared {
    /// Idle period after which a surplus worker exits, when eviction is on.
    pub(crate) fn idle_limit(&self) -> Option<Duration> {
        self.evict_idle.then_some(self.idle_timeout)
    }

    /// Take a thread slot, leaving `held_back` slots free for other queues.
    fn try_reserve_thread(&self, held_back: usize) -> bool {
        let max = self.max_threads;
        self.current_threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n + held_back < max).then_some(n + 1)
            })
            .is_ok()
    }

    /// Give up a thread slot if the pool stays at or above its minimum.
    pub(crate) fn try_retire(&self) -> bool {
        let min = self.min_threads;
        self.current_threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n > min).then(|| n - 1))
            .is_ok()
    }

    pub(crate) fn release_thread(&self) {
        self.current_threads.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn current_threads(&self) -> usize {
        self.current_threads.load(Ordering::Relaxed)
    }
}

/// Production [`ThreadPool`].
///
/// Threads are started one at a time, on submission, when the target queue
/// has no idle worker and the pool is below its maximum. In the default
/// configuration threads are never reclaimed until termination.
pub struct ThreadService {
    shared: Arc<PoolShared>,
    queues: Vec<Arc<TaskQueue>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_queue: AtomicUsize,
    next_worker_id: AtomicUsize,
}

impl ThreadService {
    /// Create a pool from its configuration.
    ///
    /// No thread is started until work arrives.
    pub fn new(config: PoolConfig) -> PoolResult<Arc<Self>> {
        validate(&config)?;

        let queue_count = config.queues;
        let queues = (0..queue_count)
            .map(|index| {
                let name = if queue_count == 1 {
                    config.name.clone()
                } else {
                    format!("{}-q{}", config.name, index)
                };
                Arc::new(TaskQueue::new(name, index))
            })
            .collect();

        let shared = Arc::new(PoolShared {
            name: config.name,
            min_threads: config.min_threads,
            max_threads: config.max_threads,
            idle_timeout: config.idle_timeout,
            evict_idle: config.evict_idle,
            terminated: Arc::new(AtomicBool::new(false)),
            current_threads: AtomicUsize::new(0),
            idle_threads: AtomicUsize::new(0),
            completion: RunningMean::default(),
        });

        let pool = Arc::new(Self {
            shared,
            queues,
            workers: Mutex::new(Vec::new()),
            next_queue: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
        });

        for queue in &pool.queues {
            queue.set_thread_pool(&pool);
        }

        info!(
            pool = %pool.shared.name,
            min_threads = pool.shared.min_threads,
            max_threads = pool.shared.max_threads,
            queues = queue_count,
            evict_idle = pool.shared.evict_idle,
            "thread pool created"
        );

        Ok(pool)
    }

    /// Single-queue pool whose thread ceiling equals its floor.
    pub fn with_threads(name: impl Into<String>, threads: usize) -> PoolResult<Arc<Self>> {
        Self::new(
            PoolConfig::new(name)
                .min_threads(threads)
                .max_threads(threads),
        )
    }

    /// Submit a task on a round-robin queue.
    pub fn submit(&self, task: Box<dyn Task>) -> PoolResult<TaskId> {
        self.next_task_queue().add_work(task)
    }

    /// Run a closure on the pool and get a handle to its result.
    pub fn execute<F, T>(&self, work: F) -> PoolResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        execute_on(self.next_task_queue().as_ref(), work)
    }

    /// Wait for every worker thread to exit.
    ///
    /// Only returns promptly after [`ThreadPool::terminate`]. When called from
    /// one of the pool's own workers, that worker is skipped.
    pub fn join(&self) {
        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        let me = thread::current().id();

        for handle in handles {
            if handle.thread().id() == me {
                continue;
            }
            if handle.join().is_err() {
                warn!(pool = %self.shared.name, "worker thread panicked");
            }
        }
    }

    /// Start one more worker on `queue_index` if the pool is below its
    /// maximum. Returns whether a thread was started.
    ///
    /// A queue that already has a worker may not take the slots still
    /// needed by queues that have none.
    pub(crate) fn grow(&self, queue_index: usize) -> PoolResult<bool> {
        if self.is_terminated() {
            return Ok(false);
        }
        let Some(queue) = self.queues.get(queue_index) else {
            return Err(PoolError::NoSuchWorkQueue {
                id: queue_index,
                count: self.queues.len(),
            });
        };

        let mut workers = self.lock_workers();
        // `join` may have drained the handles since the check above
        if self.is_terminated() {
            return Ok(false);
        }
        let unstaffed = self
            .queues
            .iter()
            .filter(|q| q.index() != queue_index && q.worker_count() == 0)
            .count();
        if !self.shared.try_reserve_thread(unstaffed) {
            trace!(pool = %self.shared.name, "at thread ceiling, not growing");
            return Ok(false);
        }
        workers.retain(|handle| !handle.is_finished());

        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let worker = Worker::new(id, Arc::clone(queue), Arc::clone(&self.shared));

        queue.worker_started();
        match worker.spawn() {
            Ok(handle) => {
                workers.push(handle);
                debug!(
                    pool = %self.shared.name,
                    worker = id,
                    queue = queue.name(),
                    threads = self.shared.current_threads(),
                    "worker thread started"
                );
                Ok(true)
            }
            Err(e) => {
                queue.worker_stopped();
                self.shared.release_thread();
                Err(PoolError::Spawn(e.to_string()))
            }
        }
    }

    fn next_task_queue(&self) -> &Arc<TaskQueue> {
        let index = if self.queues.len() == 1 {
            0
        } else {
            self.next_queue.fetch_add(1, Ordering::Relaxed) % self.queues.len()
        };
        &self.queues[index]
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(config: &PoolConfig) -> PoolResult<()> {
    if config.name.is_empty() {
        return Err(PoolError::InvalidArgument("pool name cannot be empty".into()));
    }
    if config.min_threads == 0 {
        return Err(PoolError::InvalidArgument(
            "minimum thread count must be positive".into(),
        ));
    }
    if config.max_threads < config.min_threads {
        return Err(PoolError::InvalidArgument(format!(
            "maximum thread count {} is below minimum {}",
            config.max_threads, config.min_threads
        )));
    }
    if config.queues == 0 {
        return Err(PoolError::InvalidArgument(
            "pool needs at least one work queue".into(),
        ));
    }
    if config.queues > config.max_threads {
        return Err(PoolError::InvalidArgument(format!(
            "{} work queues need at least as many threads, maximum is {}",
            config.queues, config.max_threads
        )));
    }
    if config.evict_idle && config.idle_timeout.is_zero() {
        return Err(PoolError::InvalidArgument(
            "idle eviction requires a non-zero idle timeout".into(),
        ));
    }
    Ok(())
}

impl ThreadPool for ThreadService {
    fn any_work_queue(&self) -> Arc<dyn WorkQueue> {
        self.next_task_queue().clone()
    }

    fn work_queue(&self, id: usize) -> PoolResult<Arc<dyn WorkQueue>> {
        self.queues
            .get(id)
            .map(|queue| queue.clone() as Arc<dyn WorkQueue>)
            .ok_or(PoolError::NoSuchWorkQueue {
                id,
                count: self.queues.len(),
            })
    }

    fn number_of_work_queues(&self) -> usize {
        self.queues.len()
    }

    fn minimum_number_of_threads(&self) -> usize {
        self.shared.min_threads
    }

    fn maximum_number_of_threads(&self) -> usize {
        self.shared.max_threads
    }

    fn idle_timeout_for_threads(&self) -> Duration {
        self.shared.idle_timeout
    }

    fn current_number_of_threads(&self) -> usize {
        self.shared.current_threads()
    }

    fn number_of_available_threads(&self) -> usize {
        self.shared.idle_threads.load(Ordering::Relaxed)
    }

    fn number_of_busy_threads(&self) -> usize {
        self.current_number_of_threads()
            .saturating_sub(self.number_of_available_threads())
    }

    fn current_processed_count(&self) -> u64 {
        self.shared.completion.samples()
    }

    fn average_work_completion_time(&self) -> Duration {
        self.shared.completion.mean()
    }

    fn name(&self) -> &str {
        &self.shared.name
    }

    fn remove_task(&self, id: TaskId) -> bool {
        self.queues.iter().any(|queue| queue.remove_task(id))
    }

    fn terminate(&self) {
        if self.shared.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        info!(pool = %self.shared.name, "terminating thread pool");

        let mut cancelled = 0usize;
        for queue in &self.queues {
            for item in queue.close() {
                queue.cancel_quietly(item.id, item.task);
                cancelled += 1;
            }
        }

        info!(
            pool = %self.shared.name,
            cancelled,
            threads = self.shared.current_threads(),
            "thread pool terminated"
        );
    }

    fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::Relaxed)
    }
}

impl Drop for ThreadService {
    fn drop(&mut self) {
        self.terminate();
    }
}
