//! Termination: exactly-once run/cancel, races and idempotence.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::helpers::*;
use workpool::config::PoolConfig;
use workpool::pool::{ThreadPool, ThreadService, WorkQueue};
use workpool::task;

/// A task still queued at termination is cancelled and never run
#[test]
fn test_terminate_cancels_queued_task() {
    let pool = ThreadService::with_threads("scenario-c", 1).unwrap();
    let gate = Gate::new();
    let ledger = Ledger::new(1);

    pool.submit(gate.task()).unwrap();
    gate.wait_started(1);
    pool.submit(ledger.task(0)).unwrap();

    pool.terminate();
    gate.open();
    pool.join();

    assert!(ledger.cancelled(0));
    assert!(!ledger.ran(0));
    assert_eq!(pool.current_processed_count(), 1);
}

#[test]
fn test_add_work_after_terminate_cancels() {
    let pool = ThreadService::with_threads("rejects", 1).unwrap();
    let queue = pool.any_work_queue();
    let ledger = Ledger::new(1);

    pool.terminate();
    let err = queue.add_work(ledger.task(0)).unwrap_err();

    assert!(err.is_terminated());
    assert!(ledger.cancelled(0));
    assert!(!ledger.ran(0));
    assert_eq!(queue.total_work_items_added(), 0);
}

#[test]
fn test_terminate_is_idempotent() {
    let pool = ThreadService::with_threads("idempotent", 2).unwrap();
    let ledger = Ledger::new(1);
    let gate = Gate::new();

    pool.submit(gate.task()).unwrap();
    gate.wait_started(1);
    pool.submit(ledger.task(0)).unwrap();

    pool.terminate();
    pool.terminate();
    gate.open();
    pool.join();
    pool.terminate();

    ledger.assert_exactly_once();
    assert!(pool.is_terminated());
}

/// Producers race terminate; every task is run or cancelled exactly once
#[test]
fn test_exactly_once_under_race() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 500;

    let pool = ThreadService::new(PoolConfig::new("race").min_threads(1).max_threads(4).queues(2)).unwrap();
    let ledger = Ledger::new(PRODUCERS * PER_PRODUCER);
    let accepted = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(PRODUCERS + 1));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let pool = pool.clone();
            let ledger = ledger.clone();
            let accepted = accepted.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for i in 0..PER_PRODUCER {
                    if pool.submit(ledger.task(p * PER_PRODUCER + i)).is_ok() {
                        accepted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    start.wait();
    eventually("some work accepted", || accepted.load(Ordering::SeqCst) > 100);
    pool.terminate();

    for producer in producers {
        producer.join().unwrap();
    }
    pool.join();

    ledger.assert_exactly_once();
    assert_eq!(ledger.runs() + ledger.cancels(), PRODUCERS * PER_PRODUCER);
    assert_eq!(ledger.runs() as u64, pool.current_processed_count());
}

/// Running tasks see the interruption hint and may stop early
#[test]
fn test_running_task_observes_interrupt() {
    let pool = ThreadService::with_threads("interrupt", 1).unwrap();
    let started = Arc::new(AtomicBool::new(false));
    let interrupted = Arc::new(AtomicBool::new(false));

    let s = started.clone();
    let i = interrupted.clone();
    pool.submit(task::from_fn(move || {
        assert!(!task::interrupted());
        s.store(true, Ordering::SeqCst);
        if wait_until(TIMEOUT, task::interrupted) {
            i.store(true, Ordering::SeqCst);
        }
    }))
    .unwrap();

    eventually("task start", || started.load(Ordering::SeqCst));
    pool.terminate();
    pool.join();

    assert!(interrupted.load(Ordering::SeqCst));
    assert!(!task::interrupted());
}

#[test]
fn test_workers_exit_after_terminate() {
    let pool = ThreadService::with_threads("exit", 3).unwrap();
    let gate = Gate::new();
    for _ in 0..3 {
        pool.submit(gate.task()).unwrap();
    }
    gate.wait_started(3);
    assert_eq!(pool.current_number_of_threads(), 3);

    pool.terminate();
    gate.open();
    pool.join();

    assert_eq!(pool.current_number_of_threads(), 0);
    assert_eq!(pool.current_processed_count(), 3);
}
