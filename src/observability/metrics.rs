//! Prometheus metrics for workpool.
//!
//! Thread gauges are labelled by `pool`, queue gauges by `pool` and `queue`.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::pool::{PoolStats, QueueStats};

const POOL_LABELS: &[&str] = &["pool"];
const QUEUE_LABELS: &[&str] = &["pool", "queue"];

/// Prometheus registry with the pool and queue gauges.
pub struct PoolMetrics {
    registry: Registry,

    // === Thread metrics ===
    /// Live worker threads
    pub threads_current: GaugeVec,

    /// Workers waiting for work
    pub threads_idle: GaugeVec,

    /// Workers running a task
    pub threads_busy: GaugeVec,

    /// Thread ceiling
    pub threads_max: GaugeVec,

    // === Task metrics ===
    /// Tasks run to completion
    pub tasks_processed: GaugeVec,

    /// Mean task run time in seconds
    pub task_completion_seconds_avg: GaugeVec,

    // === Queue metrics ===
    /// Tasks waiting in the queue
    pub queue_depth: GaugeVec,

    /// Tasks ever accepted by the queue
    pub queue_added: GaugeVec,

    /// Mean time spent queued in seconds
    pub queue_wait_seconds_avg: GaugeVec,
}

impl PoolMetrics {
    /// Create a new registry with all gauges registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let gauge = |name: &str, help: &str, labels: &[&str]| -> Result<GaugeVec, prometheus::Error> {
            let vec = GaugeVec::new(Opts::new(name, help), labels)?;
            registry.register(Box::new(vec.clone()))?;
            Ok(vec)
        };

        Ok(Self {
            threads_current: gauge(
                "workpool_threads_current",
                "Live worker threads",
                POOL_LABELS,
            )?,
            threads_idle: gauge(
                "workpool_threads_idle",
                "Worker threads waiting for work",
                POOL_LABELS,
            )?,
            threads_busy: gauge(
                "workpool_threads_busy",
                "Worker threads running a task",
                POOL_LABELS,
            )?,
            threads_max: gauge(
                "workpool_threads_max",
                "Maximum worker threads",
                POOL_LABELS,
            )?,
            tasks_processed: gauge(
                "workpool_tasks_processed",
                "Tasks run to completion",
                POOL_LABELS,
            )?,
            task_completion_seconds_avg: gauge(
                "workpool_task_completion_seconds_avg",
                "Mean task run time in seconds",
                POOL_LABELS,
            )?,
            queue_depth: gauge(
                "workpool_queue_depth",
                "Tasks waiting in the queue",
                QUEUE_LABELS,
            )?,
            queue_added: gauge(
                "workpool_queue_added",
                "Tasks ever added to the queue",
                QUEUE_LABELS,
            )?,
            queue_wait_seconds_avg: gauge(
                "workpool_queue_wait_seconds_avg",
                "Mean time tasks spent queued in seconds",
                QUEUE_LABELS,
            )?,
            registry,
        })
    }

    /// Copy one pool snapshot into the gauges.
    pub fn observe(&self, stats: &PoolStats) {
        let pool = [stats.name.as_str()];

        self.threads_current
            .with_label_values(&pool)
            .set(stats.current_threads as f64);
        self.threads_idle
            .with_label_values(&pool)
            .set(stats.idle_threads as f64);
        self.threads_busy
            .with_label_values(&pool)
            .set(stats.busy_threads as f64);
        self.threads_max
            .with_label_values(&pool)
            .set(stats.max_threads as f64);
        self.tasks_processed
            .with_label_values(&pool)
            .set(stats.processed as f64);
        self.task_completion_seconds_avg
            .with_label_values(&pool)
            .set(micros_to_secs(stats.avg_completion_us));

        for queue in &stats.queues {
            self.observe_queue(&stats.name, queue);
        }
    }

    /// Copy every snapshot into the gauges.
    pub fn observe_all(&self, stats: &[PoolStats]) {
        for pool in stats {
            self.observe(pool);
        }
    }

    fn observe_queue(&self, pool: &str, stats: &QueueStats) {
        let labels = [pool, stats.name.as_str()];

        self.queue_depth
            .with_label_values(&labels)
            .set(stats.in_queue as f64);
        self.queue_added
            .with_label_values(&labels)
            .set(stats.total_added as f64);
        self.queue_wait_seconds_avg
            .with_label_values(&labels)
            .set(micros_to_secs(stats.avg_wait_us));
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn micros_to_secs(us: u64) -> f64 {
    us as f64 / 1_000_000.0
}
