//! Registry of named thread pools.
//!
//! Pools get a numeric id equal to their registration position; ids are
//! never reused because pools are never unregistered. The first pool
//! registered is the default one. Components (any caller-chosen string)
//! can be bound to a [`ThreadPoolChooser`] that routes their work.
//!
//! # Example
//!
//! ```rust,ignore
//! use workpool::config::Config;
//! use workpool::manager::ThreadPoolManager;
//!
//! let manager = ThreadPoolManager::from_config(&Config::from_env()?)?;
//! let pool = manager.get_default_thread_pool()?;
//! pool.any_work_queue().add_work(workpool::task::from_fn(|| println!("hi")))?;
//! manager.close();
//! ```

mod chooser;

pub use chooser::{RoundRobinChooser, ThreadPoolChooser};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::config::Config;
use crate::pool::{PoolError, PoolResult, PoolStats, ThreadPool, ThreadService};

#[derive(Default)]
struct Registry {
    /// Registration order; the index is the numeric id.
    pools: Vec<Arc<dyn ThreadPool>>,
    by_name: HashMap<String, usize>,
    /// Component bindings in first-set order; the index is the numeric id.
    choosers: Vec<(String, Arc<dyn ThreadPoolChooser>)>,
}

/// Process-wide pool registry, constructed once and passed to subsystems.
#[derive(Default)]
pub struct ThreadPoolManager {
    registry: RwLock<Registry>,
}

impl ThreadPoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register every pool in `config.pools`, in order.
    pub fn from_config(config: &Config) -> PoolResult<Self> {
        let manager = Self::new();
        for pool in &config.pools {
            manager.register(ThreadService::new(pool.clone())?)?;
        }
        Ok(manager)
    }

    /// Add a pool under its own name and return its numeric id.
    pub fn register(&self, pool: Arc<dyn ThreadPool>) -> PoolResult<usize> {
        let name = pool.name().to_string();
        let mut registry = self.write();

        if registry.by_name.contains_key(&name) {
            return Err(PoolError::DuplicateThreadPool(name));
        }

        let id = registry.pools.len();
        registry.pools.push(pool);
        registry.by_name.insert(name.clone(), id);

        info!(pool = %name, id, "thread pool registered");
        Ok(id)
    }

    pub fn get_thread_pool(&self, id: &str) -> PoolResult<Arc<dyn ThreadPool>> {
        let registry = self.read();
        registry
            .by_name
            .get(id)
            .map(|&n| Arc::clone(&registry.pools[n]))
            .ok_or_else(|| PoolError::NoSuchThreadPool(id.to_string()))
    }

    pub fn get_thread_pool_by_numeric_id(&self, id: usize) -> PoolResult<Arc<dyn ThreadPool>> {
        self.read()
            .pools
            .get(id)
            .cloned()
            .ok_or_else(|| PoolError::NoSuchThreadPool(id.to_string()))
    }

    /// Numeric id of the pool registered as `id`.
    pub fn get_thread_pool_numeric_id(&self, id: &str) -> PoolResult<usize> {
        self.read()
            .by_name
            .get(id)
            .copied()
            .ok_or_else(|| PoolError::NoSuchThreadPool(id.to_string()))
    }

    /// Name of the pool with numeric id `id`.
    pub fn get_thread_pool_string_id(&self, id: usize) -> PoolResult<String> {
        self.read()
            .pools
            .get(id)
            .map(|pool| pool.name().to_string())
            .ok_or_else(|| PoolError::NoSuchThreadPool(id.to_string()))
    }

    /// The first pool registered.
    pub fn get_default_thread_pool(&self) -> PoolResult<Arc<dyn ThreadPool>> {
        self.read()
            .pools
            .first()
            .cloned()
            .ok_or_else(|| PoolError::NoSuchThreadPool("default".into()))
    }

    /// Bind `component` to `chooser`, replacing any earlier binding.
    ///
    /// Returns the component's numeric id, which survives replacement.
    pub fn set_thread_pool_chooser(
        &self,
        component: &str,
        chooser: Arc<dyn ThreadPoolChooser>,
    ) -> usize {
        let mut registry = self.write();

        let index = match registry.choosers.iter().position(|(c, _)| c == component) {
            Some(index) => {
                registry.choosers[index].1 = chooser;
                index
            }
            None => {
                registry.choosers.push((component.to_string(), chooser));
                registry.choosers.len() - 1
            }
        };

        debug!(component, index, "thread pool chooser set");
        index
    }

    pub fn get_thread_pool_chooser(&self, component: &str) -> Option<Arc<dyn ThreadPoolChooser>> {
        self.read()
            .choosers
            .iter()
            .find(|(c, _)| c == component)
            .map(|(_, chooser)| Arc::clone(chooser))
    }

    pub fn get_thread_pool_chooser_by_index(
        &self,
        index: usize,
    ) -> Option<Arc<dyn ThreadPoolChooser>> {
        self.read()
            .choosers
            .get(index)
            .map(|(_, chooser)| Arc::clone(chooser))
    }

    /// Numeric id of `component`, for use with
    /// [`ThreadPoolManager::get_thread_pool_chooser_by_index`].
    pub fn get_thread_pool_chooser_numeric_id(&self, component: &str) -> Option<usize> {
        self.read().choosers.iter().position(|(c, _)| c == component)
    }

    /// Registered pools in registration order.
    pub fn pools(&self) -> Vec<Arc<dyn ThreadPool>> {
        self.read().pools.clone()
    }

    /// Statistics snapshot of every registered pool.
    pub fn stats(&self) -> Vec<PoolStats> {
        self.pools().iter().map(|pool| pool.stats()).collect()
    }

    /// Terminate every registered pool.
    pub fn close(&self) {
        for pool in self.pools() {
            pool.terminate();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}
