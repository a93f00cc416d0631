//! Result handles for closures submitted with `execute`.

use std::panic::{self, AssertUnwindSafe};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::{PoolError, PoolResult, WorkQueue};
use crate::task::{panic_message, Task, TaskId, TaskResult};

/// Receiving side of a submitted closure.
///
/// Resolves to the closure's value, to [`PoolError::Cancelled`] when the task
/// was cancelled (removed or drained by termination), or to
/// [`PoolError::Execution`] when it panicked.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: TaskId,
    rx: oneshot::Receiver<PoolResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Identity of the underlying task, usable with `remove_task`.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Wait asynchronously for the outcome.
    pub async fn wait(self) -> PoolResult<T> {
        self.rx.await.unwrap_or(Err(PoolError::Cancelled))
    }

    /// Block the current thread until the outcome is known.
    ///
    /// Panics if called from within an async runtime; use [`TaskHandle::wait`]
    /// there.
    pub fn wait_blocking(self) -> PoolResult<T> {
        self.rx.blocking_recv().unwrap_or(Err(PoolError::Cancelled))
    }

    /// Outcome if already known.
    pub fn try_result(&mut self) -> Option<PoolResult<T>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(PoolError::Cancelled)),
        }
    }
}

struct ReplyTask<F, T> {
    work: F,
    reply: oneshot::Sender<PoolResult<T>>,
}

impl<F, T> Task for ReplyTask<F, T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    fn run(self: Box<Self>) -> TaskResult {
        let ReplyTask { work, reply } = *self;
        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(value) => {
                let _ = reply.send(Ok(value));
                Ok(())
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                let _ = reply.send(Err(PoolError::Execution(msg.clone())));
                Err(msg.into())
            }
        }
    }

    fn cancel(self: Box<Self>) {
        let _ = self.reply.send(Err(PoolError::Cancelled));
    }
}

/// Submit a closure to `queue` and return a handle to its result.
pub fn execute_on<F, T>(queue: &dyn WorkQueue, work: F) -> PoolResult<TaskHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (reply, rx) = oneshot::channel();
    let id = queue.add_work(Box::new(ReplyTask { work, reply }))?;
    Ok(TaskHandle { id, rx })
}
