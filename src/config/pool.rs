//! Per-pool configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_or, env_parse};
use super::ConfigError;

/// Default idle timeout for worker threads.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Construction parameters for one thread pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool identifier, unique within a manager.
    pub name: String,
    /// Thread floor. Reached lazily; never evicted below.
    pub min_threads: usize,
    /// Thread ceiling.
    pub max_threads: usize,
    /// Idle period before a surplus thread may exit.
    pub idle_timeout: Duration,
    /// Number of work queues.
    pub queues: usize,
    /// Whether idle threads above the minimum are reclaimed.
    pub evict_idle: bool,
}

impl PoolConfig {
    /// Configuration with defaults: one thread floor, CPU-count ceiling,
    /// one queue, no eviction.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_threads: 1,
            max_threads: num_cpus::get().max(1),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            queues: 1,
            evict_idle: false,
        }
    }

    pub fn min_threads(mut self, n: usize) -> Self {
        self.min_threads = n;
        self
    }

    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn queues(mut self, n: usize) -> Self {
        self.queues = n;
        self
    }

    pub fn evict_idle(mut self, enabled: bool) -> Self {
        self.evict_idle = enabled;
        self
    }

    /// Load the settings of pool `name` from `WORKPOOL_<NAME>_*`.
    ///
    /// `MAX_THREADS=0` resolves to the CPU count, raised to the minimum if
    /// the minimum is larger.
    pub fn from_env(name: &str) -> Result<Self, ConfigError> {
        let min_key = env_key(name, "MIN_THREADS");
        let min_threads = non_zero(&min_key, env_parse(&min_key, 1usize)?)?;

        let max_threads = match env_parse(&env_key(name, "MAX_THREADS"), 0usize)? {
            0 => num_cpus::get().max(min_threads.get()),
            n => n,
        };
        if max_threads < min_threads.get() {
            return Err(ConfigError::Invalid {
                key: env_key(name, "MAX_THREADS"),
                message: format!(
                    "maximum {} is below minimum {}",
                    max_threads, min_threads
                ),
            });
        }

        let queues_key = env_key(name, "QUEUES");
        let queues = non_zero(&queues_key, env_parse(&queues_key, 1usize)?)?;

        let idle_timeout = env_duration(&env_key(name, "IDLE_TIMEOUT"), "120s")?;
        let evict_key = env_key(name, "EVICT_IDLE");
        let evict_idle = env_bool(&evict_key, false)?;
        if evict_idle && idle_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: evict_key,
                message: "idle eviction requires a non-zero idle timeout".into(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            min_threads: min_threads.get(),
            max_threads,
            idle_timeout,
            queues: queues.get(),
            evict_idle,
        })
    }
}

/// Pool names listed in `WORKPOOL_POOLS`, in registration order.
pub fn pool_names_from_env() -> Result<Vec<String>, ConfigError> {
    parse_pool_names(&env_or("WORKPOOL_POOLS", "default"))
}

/// Split a comma-separated pool list, rejecting empty lists and duplicates.
pub fn parse_pool_names(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut names: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if names.iter().any(|n| n == name) {
            return Err(ConfigError::Invalid {
                key: "WORKPOOL_POOLS".into(),
                message: format!("pool '{}' listed twice", name),
            });
        }
        names.push(name.to_string());
    }

    if names.is_empty() {
        return Err(ConfigError::Invalid {
            key: "WORKPOOL_POOLS".into(),
            message: "at least one pool name is required".into(),
        });
    }
    Ok(names)
}

/// `WORKPOOL_<NAME>_<SUFFIX>` with the name upper-cased and `-` as `_`.
pub fn env_key(pool: &str, suffix: &str) -> String {
    format!(
        "WORKPOOL_{}_{}",
        pool.to_uppercase().replace('-', "_"),
        suffix
    )
}

fn non_zero(key: &str, value: usize) -> Result<NonZeroUsize, ConfigError> {
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::Invalid {
        key: key.into(),
        message: "value cannot be zero".into(),
    })
}
