//! Observability for thread pools.
//!
//! Pool statistics are snapshots; [`PoolMetrics`] copies them into
//! Prometheus gauges on demand and renders the text exposition format.
//!
//! # Usage
//!
//! ```rust,ignore
//! use workpool::observability::PoolMetrics;
//!
//! let metrics = PoolMetrics::new()?;
//! metrics.observe_all(&manager.stats());
//! println!("{}", metrics.export()?);
//! ```

pub mod metrics;

// Re-exports
pub use metrics::PoolMetrics;
