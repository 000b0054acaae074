//! The controller loop: informer events and periodic resyncs feed a work
//! queue through a cooldown; a pool of workers drains the queue, invokes the
//! syncer, and records the outcome as a controller condition.

use crate::cooldown::Cooldown;
use crate::informer::{EventHandler, Informer, ResourceEvent};
use crate::queue::WorkQueue;
use crate::status::{degraded_mutation, StatusWriter};
use crate::BoxError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use hcp_clients::store::StoreError;
use hcp_core::ResourceKey;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Worker-pool size used by production wiring.
pub const DEFAULT_WORKERS: usize = 20;

/// One reconciliation capability: the callable a controller invokes per key,
/// plus the cooldown that throttles how often keys are offered.
#[async_trait]
pub trait Syncer: Send + Sync + 'static {
    type Key: ResourceKey;

    /// One attempt to drive the key's resource from observed to desired
    /// state. Must be idempotent on no-change and honour `shutdown`
    /// cancellation around its I/O. All errors are treated the same by the
    /// loop: retry with backoff.
    async fn sync_once(&self, shutdown: &CancellationToken, key: &Self::Key)
        -> Result<(), BoxError>;

    fn cooldown(&self) -> Arc<dyn Cooldown<Self::Key>>;
}

/// Produces the full key population for the periodic resync walk.
#[async_trait]
pub trait KeyEnumerator<K>: Send + Sync + 'static {
    async fn keys(&self) -> Result<Vec<K>, BoxError>;
}

/// A failed reconcile attempt. The status write happens regardless of the
/// sync outcome, and a failure of either re-enqueues the key.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("sync failed: {0}")]
    Sync(#[source] BoxError),
    #[error("recording controller status failed: {0}")]
    Status(#[source] StoreError),
    #[error("sync failed: {sync}; recording controller status also failed: {status}")]
    Both { sync: BoxError, status: StoreError },
}

/// The enqueue path shared by informer handlers and the resync walk:
/// consult the cooldown, then add. A rejected key is silently dropped; the
/// next trigger picks it up.
struct Enqueuer<K: ResourceKey> {
    controller: &'static str,
    queue: Arc<WorkQueue<K>>,
    cooldown: Arc<dyn Cooldown<K>>,
}

impl<K: ResourceKey> Enqueuer<K> {
    async fn offer(&self, key: K) {
        if self.cooldown.can_sync(&key).await {
            self.queue.add(key);
        } else {
            debug!(controller = self.controller, %key, "cooling down, dropped trigger");
        }
    }
}

/// Adapts informer events into key offers.
struct TriggerHandler<T, K: ResourceKey> {
    enqueuer: Arc<Enqueuer<K>>,
    to_key: Arc<dyn Fn(&T) -> Option<K> + Send + Sync>,
}

#[async_trait]
impl<T, K> EventHandler<T> for TriggerHandler<T, K>
where
    T: Send + Sync + 'static,
    K: ResourceKey,
{
    async fn handle(&self, event: ResourceEvent<T>) {
        let item = match &event {
            ResourceEvent::Added(item)
            | ResourceEvent::Updated(item)
            | ResourceEvent::Deleted(item) => item,
        };
        if let Some(key) = (self.to_key)(item) {
            self.enqueuer.offer(key).await;
        }
    }
}

type SourceStarter<K> =
    Box<dyn FnOnce(Arc<Enqueuer<K>>, CancellationToken) -> BoxFuture<'static, ()> + Send>;

/// A reconciliation loop for one resource kind.
pub struct Controller<S: Syncer> {
    name: &'static str,
    syncer: Arc<S>,
    status: StatusWriter,
    queue: Arc<WorkQueue<S::Key>>,
    enumerator: Option<Arc<dyn KeyEnumerator<S::Key>>>,
    resync_interval: Duration,
    sources: Vec<SourceStarter<S::Key>>,
}

impl<S: Syncer> Controller<S> {
    #[must_use]
    pub fn new(name: &'static str, syncer: S, status: StatusWriter) -> Self {
        Self {
            name,
            syncer: Arc::new(syncer),
            status,
            queue: WorkQueue::new(),
            enumerator: None,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            sources: Vec::new(),
        }
    }

    /// Registers the periodic resync walk. Used when no push source exists;
    /// each walk offers every enumerated key, subject to the cooldown.
    #[must_use]
    pub fn with_enumerator(mut self, enumerator: Arc<dyn KeyEnumerator<S::Key>>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    #[must_use]
    pub fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Attaches an informer whose events are translated into keys.
    /// `to_key` returning `None` drops the event.
    #[must_use]
    pub fn with_source<T>(
        mut self,
        informer: Arc<dyn Informer<T>>,
        to_key: impl Fn(&T) -> Option<S::Key> + Send + Sync + 'static,
    ) -> Self
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let to_key: Arc<dyn Fn(&T) -> Option<S::Key> + Send + Sync> = Arc::new(to_key);
        self.sources.push(Box::new(move |enqueuer, shutdown| {
            Box::pin(async move {
                informer
                    .register(Box::new(TriggerHandler { enqueuer, to_key }))
                    .await;
                informer.run(shutdown).await;
            })
        }));
        self
    }

    /// The controller's queue, for direct triggering.
    #[must_use]
    pub fn queue(&self) -> Arc<WorkQueue<S::Key>> {
        Arc::clone(&self.queue)
    }

    /// Runs event sources, the resync coordinator, and `workers` worker
    /// tasks until `shutdown` is cancelled; then stops accepting work,
    /// shuts the queue down, and drains.
    pub async fn run(mut self, shutdown: CancellationToken, workers: usize) {
        let enqueuer = Arc::new(Enqueuer {
            controller: self.name,
            queue: Arc::clone(&self.queue),
            cooldown: self.syncer.cooldown(),
        });

        let mut tasks: JoinSet<()> = JoinSet::new();

        for starter in self.sources.drain(..) {
            tasks.spawn(starter(Arc::clone(&enqueuer), shutdown.clone()));
        }

        if let Some(enumerator) = self.enumerator.clone() {
            let enqueuer = Arc::clone(&enqueuer);
            let shutdown = shutdown.clone();
            let interval = self.resync_interval;
            let controller = self.name;
            tasks.spawn(async move {
                loop {
                    match enumerator.keys().await {
                        Ok(keys) => {
                            debug!(controller, keys = keys.len(), "resync walk");
                            for key in keys {
                                enqueuer.offer(key).await;
                            }
                        }
                        Err(error) => warn!(controller, %error, "resync enumeration failed"),
                    }
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(jittered(interval)) => {}
                    }
                }
            });
        }

        {
            let queue = Arc::clone(&self.queue);
            let shutdown = shutdown.clone();
            tasks.spawn(async move {
                shutdown.cancelled().await;
                queue.shutdown();
            });
        }

        for worker in 0..workers {
            let queue = Arc::clone(&self.queue);
            let syncer = Arc::clone(&self.syncer);
            let status = self.status.clone();
            let shutdown = shutdown.clone();
            let controller = self.name;
            tasks.spawn(async move {
                while let Some(key) = queue.get().await {
                    let span = info_span!("reconcile", controller, %key, worker);
                    async {
                        let result = syncer.sync_once(&shutdown, &key).await;
                        let failure = result.as_ref().err().map(ToString::to_string);
                        let write = status
                            .write_controller(&key, controller, vec![degraded_mutation(failure)])
                            .await;
                        match join_outcomes(result, write) {
                            Ok(()) => {
                                queue.forget(&key);
                                debug!("reconciled");
                            }
                            Err(error) => {
                                warn!(%error, "reconcile failed, requeueing with backoff");
                                queue.add_rate_limited(key.clone());
                            }
                        }
                        queue.done(&key);
                    }
                    .instrument(span)
                    .await;
                }
            });
        }

        while tasks.join_next().await.is_some() {}
    }
}

fn join_outcomes(
    sync: Result<(), BoxError>,
    status: Result<(), StoreError>,
) -> Result<(), ReconcileError> {
    match (sync, status) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(sync), Ok(())) => Err(ReconcileError::Sync(sync)),
        (Ok(()), Err(status)) => Err(ReconcileError::Status(status)),
        (Err(sync), Err(status)) => Err(ReconcileError::Both { sync, status }),
    }
}

fn jittered(interval: Duration) -> Duration {
    let factor = rand::rng().random_range(0.9..=1.1);
    interval.mul_f64(factor)
}
