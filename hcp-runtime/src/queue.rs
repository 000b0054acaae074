//! De-duplicating, rate-limited work queue.
//!
//! The delivery mechanism between triggers and workers: a bounded FIFO of
//! typed keys that never yields the same key to two workers at once, absorbs
//! duplicate adds while a key is pending or processing, and re-admits failed
//! keys after a per-key exponential backoff.

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(5);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1000);

/// Per-key exponential failure backoff with a ceiling.
struct RateLimiter<K> {
    base: Duration,
    max: Duration,
    failures: HashMap<K, u32>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }

    /// The delay before the next attempt of `key`, extending the key's
    /// failure history.
    fn next_delay(&mut self, key: &K) -> Duration {
        let failures = self.failures.entry(key.clone()).or_insert(0);
        let exponent = *failures;
        *failures = failures.saturating_add(1);
        let delay = self
            .base
            .checked_mul(1_u32.checked_shl(exponent).unwrap_or(u32::MAX))
            .unwrap_or(self.max);
        delay.min(self.max)
    }

    fn forget(&mut self, key: &K) {
        self.failures.remove(key);
    }
}

struct QueueState<K> {
    /// Keys awaiting delivery, in arrival order.
    queue: VecDeque<K>,
    /// Keys that need processing: everything queued, plus keys re-added
    /// while a worker holds them.
    dirty: HashSet<K>,
    /// Keys currently held by workers.
    processing: HashSet<K>,
    shutting_down: bool,
}

/// A typed work queue.
///
/// Invariants:
/// - a key is never yielded concurrently to two workers ([`get`](Self::get)
///   marks it processing until [`done`](Self::done));
/// - adding a key that is pending or processing collapses into a single
///   later delivery;
/// - rate-limited adds go back through [`add`](Self::add), so delayed
///   re-admission never bypasses de-duplication.
pub struct WorkQueue<K> {
    state: Mutex<QueueState<K>>,
    limiter: Mutex<RateLimiter<K>>,
    wakeup: Notify,
}

impl<K> WorkQueue<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_backoff(DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY)
    }

    #[must_use]
    pub fn with_backoff(base: Duration, max: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
            }),
            limiter: Mutex::new(RateLimiter::new(base, max)),
            wakeup: Notify::new(),
        })
    }

    /// Enqueues `key` unless it is already pending. If a worker currently
    /// holds the key it becomes eligible again after that worker calls
    /// [`done`](Self::done).
    pub fn add(&self, key: K) {
        {
            let mut state = self.state.lock();
            if state.shutting_down || state.dirty.contains(&key) {
                return;
            }
            state.dirty.insert(key.clone());
            if state.processing.contains(&key) {
                return;
            }
            state.queue.push_back(key);
        }
        self.wakeup.notify_one();
    }

    /// Schedules `key` to be added after its per-key backoff. Each call
    /// extends the backoff; [`forget`](Self::forget) clears it.
    pub fn add_rate_limited(self: &Arc<Self>, key: K) {
        let delay = self.limiter.lock().next_delay(&key);
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Waits for the next key. Returns `None` once the queue has been shut
    /// down and drained; until then, keys queued before shutdown are still
    /// delivered.
    pub async fn get(&self) -> Option<K> {
        loop {
            let wakeup = self.wakeup.notified();
            {
                let mut state = self.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            wakeup.await;
        }
    }

    /// Releases a key a worker finished with. If the key was re-added in
    /// the meantime it is queued for exactly one more delivery.
    pub fn done(&self, key: &K) {
        let readd = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.queue.push_back(key.clone());
                true
            } else {
                false
            }
        };
        if readd {
            self.wakeup.notify_one();
        }
    }

    /// Clears the key's backoff history after a successful sync.
    pub fn forget(&self, key: &K) {
        self.limiter.lock().forget(key);
    }

    /// Stops accepting new work and wakes all waiting [`get`](Self::get)
    /// calls once the backlog drains.
    pub fn shutdown(&self) {
        self.state.lock().shutting_down = true;
        self.wakeup.notify_waiters();
        // A permit for the first getter to observe the drained queue.
        self.wakeup.notify_one();
    }

    /// Keys currently awaiting delivery.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
