//! Per-key cooldown throttling.
//!
//! Cooldowns sit between event triggers and the work queue: they reject
//! enqueue attempts that arrive too soon after the previous one,
//! independently of the queue's failure backoff. Rejection never loses the
//! key, callers drop the event and rely on the next trigger.

use crate::BoxError;
use async_trait::async_trait;
use hcp_core::{ResourceId, ResourceKey};
use lru::LruCache;
use parking_lot::Mutex;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// Bound on tracked keys before least-recently-used entries are dropped.
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Default period while the key has in-flight operations.
pub const DEFAULT_ACTIVE_PERIOD: Duration = Duration::from_secs(10);
/// Default period while the key is quiescent.
pub const DEFAULT_INACTIVE_PERIOD: Duration = Duration::from_secs(300);

/// Decides whether a key is eligible to enqueue given recent activity.
#[async_trait]
pub trait Cooldown<K>: Send + Sync + 'static {
    /// True iff the key may sync now. A true result starts the next
    /// cooldown window; a false result has no side effects.
    async fn can_sync(&self, key: &K) -> bool;
}

/// Time-based cooldown: a bounded map from key to next-eligible instant.
///
/// A key is eligible iff it has no entry or `now >= next-eligible`; only the
/// eligible path writes `now + period` back.
pub struct TimeCooldown<K: Eq + Hash> {
    period: Duration,
    entries: Mutex<LruCache<K, Instant>>,
}

impl<K: Eq + Hash + Clone> TimeCooldown<K> {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self::with_capacity(period, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(period: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            period,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn check(&self, key: &K) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(next_eligible) = entries.get(key) {
            if now < *next_eligible {
                return false;
            }
        }
        entries.put(key.clone(), now + self.period);
        true
    }
}

#[async_trait]
impl<K> Cooldown<K> for TimeCooldown<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    async fn can_sync(&self, key: &K) -> bool {
        self.check(key)
    }
}

/// Reports whether a resource has asynchronous operations in flight.
#[async_trait]
pub trait ActiveOperationLister: Send + Sync + 'static {
    async fn has_active_operations(
        &self,
        subscription_id: &str,
        resource_id: &ResourceId,
    ) -> Result<bool, BoxError>;
}

/// Cooldown that reconciles busy resources on a short leash and quiescent
/// ones on a long one.
///
/// The inner cooldown is picked by asking the lister whether the key's
/// resource has in-flight operations. If the lister fails, the short
/// (active) cooldown is used: retries stay bounded without starving the
/// key. Operation keys are always treated as active and skip the lister.
pub struct OperationAwareCooldown<K: Eq + Hash> {
    active: TimeCooldown<K>,
    inactive: TimeCooldown<K>,
    lister: Arc<dyn ActiveOperationLister>,
}

impl<K: Eq + Hash + Clone> OperationAwareCooldown<K> {
    #[must_use]
    pub fn new(lister: Arc<dyn ActiveOperationLister>) -> Self {
        Self::with_periods(lister, DEFAULT_ACTIVE_PERIOD, DEFAULT_INACTIVE_PERIOD)
    }

    #[must_use]
    pub fn with_periods(
        lister: Arc<dyn ActiveOperationLister>,
        active: Duration,
        inactive: Duration,
    ) -> Self {
        Self {
            active: TimeCooldown::new(active),
            inactive: TimeCooldown::new(inactive),
            lister,
        }
    }
}

#[async_trait]
impl<K: ResourceKey> Cooldown<K> for OperationAwareCooldown<K> {
    async fn can_sync(&self, key: &K) -> bool {
        if key.always_active() {
            return self.active.check(key);
        }
        let busy = match self
            .lister
            .has_active_operations(key.subscription_id(), &key.resource_id())
            .await
        {
            Ok(busy) => busy,
            Err(error) => {
                warn!(%key, %error, "active-operation lookup failed, assuming active");
                true
            }
        };
        if busy {
            self.active.check(key)
        } else {
            self.inactive.check(key)
        }
    }
}
