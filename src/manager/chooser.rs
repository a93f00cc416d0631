//! Pool selection policies.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::ThreadPoolManager;
use crate::pool::{PoolError, PoolResult, ThreadPool};

/// Picks the pool that services a logical component's tasks.
pub trait ThreadPoolChooser: Send + Sync {
    /// Pool for the next unit of work.
    fn thread_pool(&self) -> Arc<dyn ThreadPool>;

    /// Pool at position `id` among the chooser's candidates.
    fn thread_pool_by_id(&self, id: usize) -> PoolResult<Arc<dyn ThreadPool>>;

    /// Names of the candidate pools, in position order.
    fn thread_pool_ids(&self) -> Vec<String>;
}

/// Cycles through a fixed, non-empty list of pools.
pub struct RoundRobinChooser {
    pools: Vec<Arc<dyn ThreadPool>>,
    next: AtomicUsize,
}

impl RoundRobinChooser {
    pub fn new(pools: Vec<Arc<dyn ThreadPool>>) -> PoolResult<Self> {
        if pools.is_empty() {
            return Err(PoolError::InvalidArgument(
                "chooser needs at least one pool".into(),
            ));
        }
        Ok(Self {
            pools,
            next: AtomicUsize::new(0),
        })
    }

    /// Chooser over pools registered with `manager`, looked up by name.
    pub fn from_manager(manager: &ThreadPoolManager, names: &[&str]) -> PoolResult<Self> {
        let pools = names
            .iter()
            .map(|name| manager.get_thread_pool(name))
            .collect::<PoolResult<Vec<_>>>()?;
        Self::new(pools)
    }
}

impl ThreadPoolChooser for RoundRobinChooser {
    fn thread_pool(&self) -> Arc<dyn ThreadPool> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.pools.len();
        Arc::clone(&self.pools[index])
    }

    fn thread_pool_by_id(&self, id: usize) -> PoolResult<Arc<dyn ThreadPool>> {
        self.pools
            .get(id)
            .cloned()
            .ok_or_else(|| PoolError::NoSuchThreadPool(id.to_string()))
    }

    fn thread_pool_ids(&self) -> Vec<String> {
        self.pools.iter().map(|p| p.name().to_string()).collect()
    }
}
