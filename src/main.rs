use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use tracing::{error, info, warn};

use workpool::config::Config;
use workpool::manager::ThreadPoolManager;
use workpool::observability::PoolMetrics;
use workpool::pool::{PoolError, TaskHandle, ThreadPool};

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = workpool::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Starting workpool {}", workpool::VERSION);
    config.log_summary();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "runner failed");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let manager = ThreadPoolManager::from_config(config)?;
    let metrics = PoolMetrics::new()?;
    let task_time = config.runner.task_time;
    let started = Instant::now();

    let mut handles: Vec<(String, TaskHandle<usize>)> = Vec::new();
    for pool in manager.pools() {
        for i in 0..config.runner.tasks {
            let handle = submit(pool.as_ref(), move || {
                thread::sleep(task_time);
                i
            })?;
            handles.push((pool.name().to_string(), handle));
        }
    }

    let mut completed = 0usize;
    for (pool, handle) in handles {
        match handle.wait_blocking() {
            Ok(_) => completed += 1,
            Err(e) => warn!(pool = %pool, error = %e, "demo task did not complete"),
        }
    }

    info!(
        completed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "demo load finished"
    );

    let stats = manager.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    metrics.observe_all(&stats);
    print!("{}", metrics.export()?);

    manager.close();
    Ok(())
}

/// Submit through a pool's queue and keep a handle to the result.
fn submit<F>(pool: &dyn ThreadPool, work: F) -> Result<TaskHandle<usize>, PoolError>
where
    F: FnOnce() -> usize + Send + 'static,
{
    workpool::pool::execute_on(pool.any_work_queue().as_ref(), work)
}
