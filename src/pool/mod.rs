//! Dynamic worker pool infrastructure.
//!
//! A pool owns one or more FIFO work queues and a bounded, lazily grown set of
//! worker threads servicing them.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      ThreadService                         │
//! ├────────────────────────────────────────────────────────────┤
//! │   add_work()        add_work()                             │
//! │       │                 │                                  │
//! │ ┌─────▼─────┐     ┌─────▼─────┐                            │
//! │ │ TaskQueue │     │ TaskQueue │  (mutex + condvar, FIFO)   │
//! │ └─────┬─────┘     └─────┬─────┘                            │
//! │       │ grow()          │ grow()    (idle < 1, cur < max)  │
//! │  ┌────┴────┐       ┌────┴────┐                             │
//! │  │ Worker1 │ ...   │ WorkerN │     (std threads)           │
//! │  └─────────┘       └─────────┘                             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Dispatch follows submission order within a queue; completion order does
//! not when more than one worker drains the same queue.
//!
//! All statistics accessors are unsynchronized snapshots of atomic counters.
//! Values may be momentarily stale relative to each other.

mod error;
mod handle;
mod queue;
mod thread;
mod worker;

pub use error::{PoolError, PoolResult};
pub use handle::{execute_on, TaskHandle};
pub use queue::TaskQueue;
pub use thread::ThreadService;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// A FIFO holding area for tasks belonging to one logical queue.
pub trait WorkQueue: Send + Sync {
    /// Append a task at the tail and wake a waiting worker.
    ///
    /// Fails with [`PoolError::PoolTerminated`] once the owning pool has been
    /// terminated; the rejected task is cancelled before returning.
    fn add_work(&self, task: Box<dyn Task>) -> PoolResult<TaskId>;

    /// Remove a task that no worker has claimed yet and cancel it.
    ///
    /// Returns `false` when the task is unknown or already dequeued.
    fn remove_task(&self, id: TaskId) -> bool;

    /// Immutable queue identifier.
    fn name(&self) -> &str;

    /// Number of tasks ever accepted.
    fn total_work_items_added(&self) -> u64;

    /// Number of tasks currently waiting.
    fn work_items_in_queue(&self) -> usize;

    /// Running mean of the time tasks spent waiting before dequeue.
    fn average_time_in_queue(&self) -> Duration;

    /// Owning pool, if it is still alive.
    fn thread_pool(&self) -> Option<Arc<dyn ThreadPool>>;

    /// Snapshot of the queue statistics.
    fn stats(&self) -> QueueStats {
        QueueStats {
            name: self.name().to_string(),
            total_added: self.total_work_items_added(),
            in_queue: self.work_items_in_queue(),
            avg_wait_us: self.average_time_in_queue().as_micros() as u64,
        }
    }
}

/// A bounded, dynamically growing set of worker threads servicing one or
/// more work queues.
pub trait ThreadPool: Send + Sync {
    /// A queue chosen round-robin (or the only one).
    fn any_work_queue(&self) -> Arc<dyn WorkQueue>;

    /// Queue at `id`, or [`PoolError::NoSuchWorkQueue`].
    fn work_queue(&self, id: usize) -> PoolResult<Arc<dyn WorkQueue>>;

    fn number_of_work_queues(&self) -> usize;

    fn minimum_number_of_threads(&self) -> usize;

    fn maximum_number_of_threads(&self) -> usize;

    /// Declared idle timeout. Only enforced when idle eviction is enabled.
    fn idle_timeout_for_threads(&self) -> Duration;

    fn current_number_of_threads(&self) -> usize;

    /// Threads currently waiting for work.
    fn number_of_available_threads(&self) -> usize;

    fn number_of_busy_threads(&self) -> usize;

    /// Tasks run to completion (successfully or not).
    fn current_processed_count(&self) -> u64;

    fn average_work_completion_time(&self) -> Duration;

    fn name(&self) -> &str;

    /// Best-effort removal of a queued task from any of the pool's queues.
    fn remove_task(&self, id: TaskId) -> bool;

    /// Stop accepting work, cancel everything still queued and let workers
    /// exit. Idempotent.
    fn terminate(&self);

    fn is_terminated(&self) -> bool;

    /// Snapshot of all statistics.
    fn stats(&self) -> PoolStats {
        let queues = (0..self.number_of_work_queues())
            .filter_map(|id| self.work_queue(id).ok())
            .map(|q| q.stats())
            .collect();

        PoolStats {
            name: self.name().to_string(),
            min_threads: self.minimum_number_of_threads(),
            max_threads: self.maximum_number_of_threads(),
            idle_timeout_ms: self.idle_timeout_for_threads().as_millis() as u64,
            current_threads: self.current_number_of_threads(),
            idle_threads: self.number_of_available_threads(),
            busy_threads: self.number_of_busy_threads(),
            processed: self.current_processed_count(),
            avg_completion_us: self.average_work_completion_time().as_micros() as u64,
            terminated: self.is_terminated(),
            queues,
        }
    }
}

/// Statistics about pool performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub name: String,
    pub min_threads: usize,
    pub max_threads: usize,
    pub idle_timeout_ms: u64,
    pub current_threads: usize,
    pub idle_threads: usize,
    pub busy_threads: usize,
    /// Total tasks processed.
    pub processed: u64,
    /// Average execution time in microseconds.
    pub avg_completion_us: u64,
    pub terminated: bool,
    pub queues: Vec<QueueStats>,
}

/// Statistics about one work queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub name: String,
    pub total_added: u64,
    pub in_queue: usize,
    /// Average queue wait time in microseconds.
    pub avg_wait_us: u64,
}

/// Running mean kept as a nanosecond sum and a sample count.
#[derive(Debug, Default)]
pub(crate) struct RunningMean {
    sum_nanos: AtomicU64,
    samples: AtomicU64,
}

impl RunningMean {
    pub(crate) fn record(&self, sample: Duration) {
        let nanos = u64::try_from(sample.as_nanos()).unwrap_or(u64::MAX);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub(crate) fn mean(&self) -> Duration {
        let samples = self.samples.load(Ordering::Relaxed);
        if samples == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.sum_nanos.load(Ordering::Relaxed) / samples)
    }
}
