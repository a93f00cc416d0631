//! workpool - Dynamic worker-pool task execution engine.
//!
//! Decouples task submission from task execution using a small, lazily
//! grown population of OS threads bounded by a configured maximum.
//!
//! # Features
//!
//! - **Lazy growth**: threads start on submission, only when no worker is idle
//! - **Multiple queues**: a pool may spread work over several FIFO queues
//! - **Exactly-once**: every accepted task is either run or cancelled
//! - **Named registry**: pools addressed by string or numeric id
//! - **Statistics**: lock-free counters, JSON snapshots, Prometheus export
//!
//! # Architecture
//!
//! - [`pool`] - `WorkQueue` / `ThreadPool` contracts and `ThreadService`
//! - [`manager`] - `ThreadPoolManager` registry and `ThreadPoolChooser` policies
//! - [`task`] - the `Task` contract and closure adapters
//!
//! # Example
//!
//! ```rust,ignore
//! use workpool::pool::{ThreadPool, ThreadService, WorkQueue};
//! use workpool::task;
//!
//! let pool = ThreadService::with_threads("io", 4)?;
//! pool.any_work_queue().add_work(task::from_fn(|| println!("ran")))?;
//!
//! let answer = pool.execute(|| 6 * 7)?.wait_blocking()?;
//! pool.terminate();
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod config;
pub mod logging;
pub mod manager;
pub mod observability;
pub mod pool;
pub mod task;

// Re-exports for convenience
pub use config::{Config, PoolConfig};
pub use manager::{RoundRobinChooser, ThreadPoolChooser, ThreadPoolManager};
pub use pool::{PoolError, PoolResult, PoolStats, TaskHandle, ThreadPool, ThreadService, WorkQueue};
pub use task::{Task, TaskId};
