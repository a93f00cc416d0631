//! Configuration module for workpool.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use workpool::config::Config;
//!
//! let config = Config::from_env()?;
//! for pool in &config.pools {
//!     println!("{}: {}..={} threads", pool.name, pool.min_threads, pool.max_threads);
//! }
//! ```

mod error;
mod logging;
mod parse;
mod pool;
mod runner;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use pool::{env_key, parse_pool_names, PoolConfig, DEFAULT_IDLE_TIMEOUT};
pub use runner::RunnerConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Pools in registration order; the first is the default pool.
    pub pools: Vec<PoolConfig>,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Runner binary settings.
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pools: Self::pools_from_env()?,
            logging: LoggingConfig::from_env()?,
            runner: RunnerConfig::from_env()?,
        })
    }

    /// Configuration for the given pools with default logging and runner
    /// settings.
    pub fn with_pools(pools: Vec<PoolConfig>) -> Self {
        Self {
            pools,
            logging: LoggingConfig::default(),
            runner: RunnerConfig::default(),
        }
    }

    /// Load every pool listed in `WORKPOOL_POOLS`.
    pub fn pools_from_env() -> Result<Vec<PoolConfig>, ConfigError> {
        pool::pool_names_from_env()?
            .iter()
            .map(|name| PoolConfig::from_env(name))
            .collect()
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        for pool in &self.pools {
            info!(
                "  Pool {}: threads {}..={}, queues {}, idle timeout {:?}{}",
                pool.name,
                pool.min_threads,
                pool.max_threads,
                pool.queues,
                pool.idle_timeout,
                if pool.evict_idle { ", evicting idle" } else { "" }
            );
        }
        info!("  Log filter: {}", self.logging.filter);
        info!("  Log format: {:?}", self.logging.format);
        info!(
            "  Runner: {} task(s) per pool, {:?} each",
            self.runner.tasks, self.runner.task_time
        );
    }
}
