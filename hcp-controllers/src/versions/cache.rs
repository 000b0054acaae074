//! Per-cluster update-graph clients.
//!
//! The graph service makes weighted rollout decisions per cluster identity,
//! so clients cannot be shared across clusters. They are cached bounded by
//! an LRU, with read-preferred locking and a double-checked insert.

use hcp_clients::graph::UpdateGraphClient;
use hcp_core::ClusterKey;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub const DEFAULT_CLIENT_CAPACITY: usize = 100_000;

type ClientFactory = Box<dyn Fn(&ClusterKey) -> Arc<dyn UpdateGraphClient> + Send + Sync>;

pub struct GraphClientCache {
    clients: RwLock<LruCache<ClusterKey, Arc<dyn UpdateGraphClient>>>,
    factory: ClientFactory,
}

impl GraphClientCache {
    #[must_use]
    pub fn new(factory: ClientFactory) -> Self {
        Self::with_capacity(factory, DEFAULT_CLIENT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(factory: ClientFactory, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            clients: RwLock::new(LruCache::new(capacity)),
            factory,
        }
    }

    /// The cached client for `key`, constructing it on first use.
    pub fn client_for(&self, key: &ClusterKey) -> Arc<dyn UpdateGraphClient> {
        if let Some(client) = self.clients.read().peek(key) {
            return Arc::clone(client);
        }
        let mut clients = self.clients.write();
        if let Some(client) = clients.get(key) {
            return Arc::clone(client);
        }
        let client = (self.factory)(key);
        clients.put(key.clone(), Arc::clone(&client));
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeGraph;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_cache(capacity: usize) -> (GraphClientCache, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let cache = GraphClientCache::with_capacity(
            Box::new(move |_key| {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(FakeGraph::new()) as Arc<dyn UpdateGraphClient>
            }),
            capacity,
        );
        (cache, built)
    }

    #[test]
    fn one_client_per_cluster() {
        let (cache, built) = counting_cache(10);
        let a = ClusterKey::new("sub1", "rg1", "a");
        let b = ClusterKey::new("sub1", "rg1", "b");

        let first = cache.client_for(&a);
        let again = cache.client_for(&a);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        cache.client_for(&b);
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn evicted_clients_are_rebuilt() {
        let (cache, built) = counting_cache(1);
        let a = ClusterKey::new("sub1", "rg1", "a");
        let b = ClusterKey::new("sub1", "rg1", "b");

        cache.client_for(&a);
        cache.client_for(&b);
        cache.client_for(&a);
        assert_eq!(built.load(Ordering::SeqCst), 3);
    }
}
