//! Units of work accepted by a pool.
//!
//! A [`Task`] carries two consuming operations, `run` and `cancel`. Both take
//! `Box<Self>`, so once a pool has invoked one of them the task is gone and the
//! other can never be called.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Error raised by a task body.
pub type TaskFailure = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of [`Task::run`].
pub type TaskResult = Result<(), TaskFailure>;

/// A submitted unit of work.
///
/// For every task a pool accepts, exactly one of `run` or `cancel` is invoked.
/// `cancel` must not perform any of `run`'s side effects; it exists so waiting
/// parties can be released when the work will never execute.
pub trait Task: Send + 'static {
    /// Execute the work. Errors are logged by the worker and never stop it.
    fn run(self: Box<Self>) -> TaskResult;

    /// Release the task without executing it.
    fn cancel(self: Box<Self>);
}

/// Identity of an accepted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Conversion of a closure's return value into a [`TaskResult`].
pub trait IntoTaskResult {
    fn into_task_result(self) -> TaskResult;
}

impl IntoTaskResult for () {
    fn into_task_result(self) -> TaskResult {
        Ok(())
    }
}

impl<E> IntoTaskResult for Result<(), E>
where
    E: Into<TaskFailure>,
{
    fn into_task_result(self) -> TaskResult {
        self.map_err(Into::into)
    }
}

/// Task built from a pair of closures.
pub struct FnTask<R, C> {
    run: R,
    cancel: C,
}

impl<R, O, C> Task for FnTask<R, C>
where
    R: FnOnce() -> O + Send + 'static,
    O: IntoTaskResult,
    C: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) -> TaskResult {
        (self.run)().into_task_result()
    }

    fn cancel(self: Box<Self>) {
        (self.cancel)()
    }
}

/// Task whose cancellation does nothing.
pub fn from_fn<R, O>(run: R) -> Box<dyn Task>
where
    R: FnOnce() -> O + Send + 'static,
    O: IntoTaskResult + 'static,
{
    with_cancel(run, || {})
}

/// Task with an explicit cancellation hook.
pub fn with_cancel<R, O, C>(run: R, cancel: C) -> Box<dyn Task>
where
    R: FnOnce() -> O + Send + 'static,
    O: IntoTaskResult + 'static,
    C: FnOnce() + Send + 'static,
{
    Box::new(FnTask { run, cancel })
}

thread_local! {
    static INTERRUPT: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Attach the calling worker thread to its pool's termination flag.
pub(crate) fn bind_interrupt(flag: Arc<AtomicBool>) {
    INTERRUPT.with(|slot| *slot.borrow_mut() = Some(flag));
}

/// Whether the pool running the current task has been terminated.
///
/// Termination never stops a running task; long task bodies may poll this
/// to abort early. Always `false` outside a worker thread.
pub fn interrupted() -> bool {
    INTERRUPT.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    })
}

/// Human-readable text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
