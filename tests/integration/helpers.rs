//! Test helpers and utilities

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use workpool::task::{self, Task};

/// Upper bound for anything a test waits on.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Assert `cond` becomes true within [`TIMEOUT`].
#[track_caller]
pub fn eventually(what: &str, cond: impl FnMut() -> bool) {
    assert!(wait_until(TIMEOUT, cond), "timed out waiting for {}", what);
}

/// Tasks that block until the gate opens.
///
/// Dropping the gate opens it so a failing test never leaves workers stuck.
#[derive(Clone, Default)]
pub struct Gate {
    open: Arc<(Mutex<bool>, Condvar)>,
    started: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task that records its start and then waits for [`Gate::open`].
    pub fn task(&self) -> Box<dyn Task> {
        let gate = self.clone();
        task::from_fn(move || {
            gate.started.fetch_add(1, Ordering::SeqCst);
            let (lock, cvar) = &*gate.open;
            let guard = lock.lock().unwrap();
            let _unused = cvar
                .wait_timeout_while(guard, TIMEOUT, |open| !*open)
                .unwrap();
        })
    }

    /// Number of gated tasks that have begun running.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Block until `n` gated tasks are running.
    #[track_caller]
    pub fn wait_started(&self, n: usize) {
        eventually(&format!("{} gated task(s) to start", n), || self.started() >= n);
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.open;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}

/// Per-task ledger of which of `run` / `cancel` was invoked.
#[derive(Clone)]
pub struct Ledger {
    slots: Arc<Vec<AtomicU8>>,
}

const RAN: u8 = 0b01;
const CANCELLED: u8 = 0b10;

#[allow(dead_code)]
impl Ledger {
    pub fn new(tasks: usize) -> Self {
        Self {
            slots: Arc::new((0..tasks).map(|_| AtomicU8::new(0)).collect()),
        }
    }

    /// Task number `i`, recording into its slot.
    pub fn task(&self, i: usize) -> Box<dyn Task> {
        let on_run = self.clone();
        let on_cancel = self.clone();
        task::with_cancel(
            move || {
                on_run.slots[i].fetch_or(RAN, Ordering::SeqCst);
            },
            move || {
                on_cancel.slots[i].fetch_or(CANCELLED, Ordering::SeqCst);
            },
        )
    }

    pub fn ran(&self, i: usize) -> bool {
        self.slots[i].load(Ordering::SeqCst) & RAN != 0
    }

    pub fn cancelled(&self, i: usize) -> bool {
        self.slots[i].load(Ordering::SeqCst) & CANCELLED != 0
    }

    pub fn runs(&self) -> usize {
        (0..self.slots.len()).filter(|&i| self.ran(i)).count()
    }

    pub fn cancels(&self) -> usize {
        (0..self.slots.len()).filter(|&i| self.cancelled(i)).count()
    }

    /// Assert every task saw exactly one of run or cancel.
    #[track_caller]
    pub fn assert_exactly_once(&self) {
        for (i, slot) in self.slots.iter().enumerate() {
            let state = slot.load(Ordering::SeqCst);
            assert!(
                state == RAN || state == CANCELLED,
                "task {} has state {:#04b}",
                i,
                state
            );
        }
    }
}

/// Shared ordered log of task indices.
#[derive(Clone, Default)]
pub struct OrderLog(Arc<Mutex<Vec<usize>>>);

impl OrderLog {
    pub fn task(&self, i: usize) -> Box<dyn Task> {
        let log = self.clone();
        task::from_fn(move || log.0.lock().unwrap().push(i))
    }

    pub fn entries(&self) -> Vec<usize> {
        self.0.lock().unwrap().clone()
    }
}
