//! Result handles, including over a caller-supplied queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::helpers::*;
use workpool::pool::{execute_on, PoolError, PoolResult, ThreadPool, ThreadService, WorkQueue};
use workpool::task::{Task, TaskId};

/// Queue double that runs work on the submitting thread.
#[derive(Default)]
struct InlineQueue {
    added: AtomicU64,
}

impl WorkQueue for InlineQueue {
    fn add_work(&self, task: Box<dyn Task>) -> PoolResult<TaskId> {
        self.added.fetch_add(1, Ordering::Relaxed);
        task.run().map_err(|e| PoolError::Execution(e.to_string()))?;
        Ok(TaskId::next())
    }

    fn remove_task(&self, _id: TaskId) -> bool {
        false
    }

    fn name(&self) -> &str {
        "inline"
    }

    fn total_work_items_added(&self) -> u64 {
        self.added.load(Ordering::Relaxed)
    }

    fn work_items_in_queue(&self) -> usize {
        0
    }

    fn average_time_in_queue(&self) -> Duration {
        Duration::ZERO
    }

    fn thread_pool(&self) -> Option<Arc<dyn ThreadPool>> {
        None
    }
}

#[test]
fn test_execute_on_any_queue() {
    let queue = InlineQueue::default();
    let mut handle = execute_on(&queue, || "inline result").unwrap();

    assert_eq!(handle.try_result(), Some(Ok("inline result")));
    assert_eq!(queue.stats().total_added, 1);
}

#[test]
fn test_blocking_handles_across_pool() {
    let pool = ThreadService::with_threads("handles", 4).unwrap();
    let handles: Vec<_> = (0..50u64)
        .map(|i| pool.execute(move || i * i).unwrap())
        .collect();

    let sum: u64 = handles
        .into_iter()
        .map(|h| h.wait_blocking().unwrap())
        .sum();
    assert_eq!(sum, (0..50u64).map(|i| i * i).sum::<u64>());
}

#[test]
fn test_handles_cancelled_by_terminate() {
    let pool = ThreadService::with_threads("handles-term", 1).unwrap();
    let gate = Gate::new();
    pool.submit(gate.task()).unwrap();
    gate.wait_started(1);

    let pending: Vec<_> = (0..3).map(|i| pool.execute(move || i).unwrap()).collect();
    pool.terminate();
    gate.open();

    for handle in pending {
        assert!(handle.wait_blocking().unwrap_err().is_cancelled());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_await_handles() {
    let pool = ThreadService::with_threads("handles-async", 2).unwrap();
    let first = pool.execute(|| String::from("first")).unwrap();
    let second = pool.execute(|| String::from("second")).unwrap();

    let (a, b) = tokio::join!(first.wait(), second.wait());
    assert_eq!(a.unwrap(), "first");
    assert_eq!(b.unwrap(), "second");

    let failing = pool.execute(|| -> u8 { panic!("task exploded") }).unwrap();
    let outcome = tokio::time::timeout(TIMEOUT, failing.wait())
        .await
        .expect("handle resolves");
    assert_eq!(outcome, Err(PoolError::Execution("task exploded".into())));
}
