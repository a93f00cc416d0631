//! End-to-end pool behaviour: ordering, growth, failures and lookups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::helpers::*;
use workpool::config::PoolConfig;
use workpool::pool::{PoolError, ThreadPool, ThreadService, WorkQueue};
use workpool::task;

/// A single worker runs tasks in submission order
#[test]
fn test_single_worker_order() {
    let pool = ThreadService::with_threads("scenario-a", 1).unwrap();
    let log = OrderLog::default();
    let queue = pool.any_work_queue();

    for i in 0..3 {
        queue.add_work(log.task(i)).unwrap();
    }

    eventually("three tasks", || pool.current_processed_count() == 3);
    assert_eq!(log.entries(), vec![0, 1, 2]);
}

#[test]
fn test_single_worker_order_long_run() {
    let pool = ThreadService::with_threads("fifo", 1).unwrap();
    let log = OrderLog::default();

    for i in 0..200 {
        pool.submit(log.task(i)).unwrap();
    }

    eventually("200 tasks", || pool.current_processed_count() == 200);
    assert_eq!(log.entries(), (0..200).collect::<Vec<_>>());
    assert_eq!(pool.current_number_of_threads(), 1);
}

/// Busy workers cause growth; statistics follow the work
#[test]
fn test_grows_under_load() {
    let pool = ThreadService::new(PoolConfig::new("scenario-b").min_threads(1).max_threads(4)).unwrap();
    let queue = pool.any_work_queue();
    let gate = Gate::new();

    // Keep the first worker busy so the next submissions find nobody idle
    queue.add_work(gate.task()).unwrap();
    gate.wait_started(1);

    for _ in 0..9 {
        queue
            .add_work(task::from_fn(|| thread::sleep(Duration::from_millis(10))))
            .unwrap();
    }
    gate.open();

    eventually("ten tasks", || pool.current_processed_count() == 10);
    assert!(pool.current_number_of_threads() > 1);
    assert!(pool.current_number_of_threads() <= 4);
    assert!(pool.average_work_completion_time() > Duration::ZERO);
    assert_eq!(queue.total_work_items_added(), 10);
    assert_eq!(queue.work_items_in_queue(), 0);
}

/// Unknown queue index
#[test]
fn test_no_such_work_queue() {
    let pool = ThreadService::with_threads("scenario-d", 1).unwrap();
    let err = pool.work_queue(5).err().unwrap();
    assert_eq!(err, PoolError::NoSuchWorkQueue { id: 5, count: 1 });
}

#[test]
fn test_failing_tasks_do_not_stop_worker() {
    let pool = ThreadService::with_threads("failures", 1).unwrap();
    let survived = Arc::new(AtomicBool::new(false));
    let s = survived.clone();

    pool.submit(task::from_fn(|| -> Result<(), String> { Err("boom".into()) }))
        .unwrap();
    pool.submit(task::from_fn(|| -> Result<(), String> { panic!("intentional panic") }))
        .unwrap();
    pool.submit(task::from_fn(move || s.store(true, Ordering::SeqCst)))
        .unwrap();

    eventually("three tasks", || pool.current_processed_count() == 3);
    assert!(survived.load(Ordering::SeqCst));
    assert_eq!(pool.current_number_of_threads(), 1);
}

#[test]
fn test_remove_queued_task() {
    let pool = ThreadService::with_threads("removal", 1).unwrap();
    let gate = Gate::new();
    let ledger = Ledger::new(1);

    pool.submit(gate.task()).unwrap();
    gate.wait_started(1);

    let id = pool.submit(ledger.task(0)).unwrap();
    assert!(pool.remove_task(id));
    assert!(!pool.remove_task(id));

    gate.open();
    eventually("gated task", || pool.current_processed_count() == 1);
    assert!(ledger.cancelled(0));
    assert!(!ledger.ran(0));
}

#[test]
fn test_multiple_queues() {
    let pool = ThreadService::new(PoolConfig::new("multi").max_threads(4).queues(2)).unwrap();
    let log = OrderLog::default();

    let first = pool.work_queue(0).unwrap();
    let second = pool.work_queue(1).unwrap();
    for i in 0..10 {
        first.add_work(log.task(i)).unwrap();
        second.add_work(log.task(100 + i)).unwrap();
    }

    eventually("twenty tasks", || pool.current_processed_count() == 20);
    assert_eq!(first.total_work_items_added(), 10);
    assert_eq!(second.total_work_items_added(), 10);

    // Completion order across queues is unspecified
    let mut entries = log.entries();
    entries.sort_unstable();
    let mut expected: Vec<usize> = (0..10).chain(100..110).collect();
    expected.sort_unstable();
    assert_eq!(entries, expected);

    let stats = pool.stats();
    assert_eq!(stats.queues.len(), 2);
    assert_eq!(stats.queues[1].name, "multi-q1");
}

#[test]
fn test_statistics_snapshot() {
    let pool = ThreadService::with_threads("snapshot", 2).unwrap();
    let gate = Gate::new();

    for _ in 0..5 {
        pool.submit(gate.task()).unwrap();
    }
    gate.wait_started(2);

    let stats = pool.stats();
    assert_eq!(stats.current_threads, 2);
    assert_eq!(stats.busy_threads, 2);
    assert_eq!(stats.idle_threads, 0);
    assert_eq!(stats.queues[0].total_added, 5);
    assert_eq!(stats.queues[0].in_queue, 3);

    gate.open();
    eventually("five tasks", || pool.current_processed_count() == 5);
    eventually("workers idle", || pool.number_of_available_threads() == 2);
    assert_eq!(pool.number_of_busy_threads(), 0);
    assert!(pool.any_work_queue().average_time_in_queue() > Duration::ZERO);
}
