//! Settings for the `workpool` runner binary.

use std::time::Duration;

use super::parse::{env_duration, env_parse};
use super::ConfigError;

/// Synthetic load driven by the runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Tasks submitted to each pool.
    pub tasks: usize,
    /// How long each task sleeps.
    pub task_time: Duration,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            tasks: env_parse("WORKPOOL_DEMO_TASKS", 100usize)?,
            task_time: env_duration("WORKPOOL_DEMO_TASK_TIME", "5ms")?,
        })
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tasks: 100,
            task_time: Duration::from_millis(5),
        }
    }
}
