//! Worker thread main loop.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::queue::{Next, QueuedTask, TaskQueue};
use super::thread::PoolShared;
use super::WorkQueue;
use crate::task::{self, panic_message};

/// A pool-owned thread draining one queue.
///
/// `WAITING → RUNNING → WAITING → … → STOPPED`. A failing or panicking task
/// is logged and the loop carries on with the next one.
pub(crate) struct Worker {
    id: usize,
    queue: Arc<TaskQueue>,
    shared: Arc<PoolShared>,
}

impl Worker {
    pub(crate) fn new(id: usize, queue: Arc<TaskQueue>, shared: Arc<PoolShared>) -> Self {
        Self { id, queue, shared }
    }

    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("{}-{}", self.shared.name, self.id))
            .spawn(move || self.run())
    }

    fn run(self) {
        task::bind_interrupt(Arc::clone(&self.shared.terminated));
        debug!(pool = %self.shared.name, worker = self.id, queue = self.queue.name(), "worker started");

        loop {
            match self.queue.next_task(&self.shared) {
                Next::Run(item) => self.execute(item),
                Next::Stop => {
                    self.shared.release_thread();
                    break;
                }
                Next::Retire => {
                    debug!(pool = %self.shared.name, worker = self.id, "idle worker retired");
                    break;
                }
            }
        }

        self.queue.worker_stopped();
        debug!(pool = %self.shared.name, worker = self.id, "worker stopped");
    }

    fn execute(&self, item: QueuedTask) {
        let QueuedTask { id, task, .. } = item;
        let started = Instant::now();

        match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(Ok(())) => {
                trace!(pool = %self.shared.name, worker = self.id, task = %id, "task completed");
            }
            Ok(Err(e)) => {
                warn!(
                    pool = %self.shared.name,
                    worker = self.id,
                    task = %id,
                    error = %e,
                    "task failed"
                );
            }
            Err(payload) => {
                warn!(
                    pool = %self.shared.name,
                    worker = self.id,
                    task = %id,
                    error = %panic_message(payload.as_ref()),
                    "task panicked"
                );
            }
        }

        self.shared.completion.record(started.elapsed());
    }
}
