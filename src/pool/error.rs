//! Worker pool error types.

use thiserror::Error;

/// Errors that can occur during pool and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Requested queue index is outside the pool's queue range.
    #[error("no work queue {id}: pool has {count} queue(s)")]
    NoSuchWorkQueue {
        /// Requested index.
        id: usize,
        /// Number of queues the pool manages.
        count: usize,
    },

    /// Requested pool id is not registered.
    #[error("no thread pool registered as '{0}'")]
    NoSuchThreadPool(String),

    /// A pool with the same name is already registered.
    #[error("thread pool '{0}' is already registered")]
    DuplicateThreadPool(String),

    /// A construction precondition was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Work was submitted after the pool was terminated.
    #[error("pool has been terminated")]
    PoolTerminated,

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// The task was cancelled before it ran.
    #[error("task was cancelled before it ran")]
    Cancelled,

    /// The task ran and failed.
    #[error("execution error: {0}")]
    Execution(String),
}

impl PoolError {
    /// Check if this is a termination error.
    pub fn is_terminated(&self) -> bool {
        matches!(self, PoolError::PoolTerminated)
    }

    /// Check if this is a cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PoolError::Cancelled)
    }

    /// Check if this is a failed lookup (queue or pool).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PoolError::NoSuchWorkQueue { .. } | PoolError::NoSuchThreadPool(_)
        )
    }
}

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
