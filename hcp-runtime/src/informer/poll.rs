//! Periodic-list informer.

use super::{EventHandler, Informer, InformerState, ResourceEvent};
use crate::BoxError;
use async_trait::async_trait;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Produces the full current population of one resource kind.
#[async_trait]
pub trait SnapshotLister<T>: Send + Sync + 'static {
    async fn list(&self) -> Result<Vec<T>, BoxError>;
}

/// Informer over a lister: every resync tick it takes a fresh snapshot and
/// emits the symmetric difference against the previous one.
///
/// Snapshots travel over a single-producer/single-consumer channel and are
/// diffed serially, which is what makes the handler contract hold.
pub struct PollInformer<K, T> {
    lister: Arc<dyn SnapshotLister<T>>,
    key_of: Arc<dyn Fn(&T) -> K + Send + Sync>,
    interval: Duration,
    state: Mutex<InformerState<K, T>>,
}

impl<K, T> PollInformer<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        lister: Arc<dyn SnapshotLister<T>>,
        key_of: impl Fn(&T) -> K + Send + Sync + 'static,
        interval: Duration,
    ) -> Self {
        Self {
            lister,
            key_of: Arc::new(key_of),
            interval,
            state: Mutex::new(InformerState::default()),
        }
    }

    /// Takes one snapshot and feeds it through the differ. Exposed so tests
    /// and bootstrap paths can resync without waiting for the tick.
    pub async fn resync_now(&self) -> Result<(), BoxError> {
        let snapshot = self.lister.list().await?;
        let mut state = self.state.lock().await;
        state.apply_snapshot(|item| (self.key_of)(item), snapshot).await;
        Ok(())
    }
}

#[async_trait]
impl<K, T> Informer<T> for PollInformer<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    async fn register(&self, handler: Box<dyn EventHandler<T>>) {
        let mut state = self.state.lock().await;
        for item in state.known.values() {
            handler.handle(ResourceEvent::Added(item.clone())).await;
        }
        state.handlers.push(handler);
    }

    async fn run(&self, shutdown: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<Vec<T>>(1);

        let producer = {
            let lister = Arc::clone(&self.lister);
            let shutdown = shutdown.clone();
            let interval = self.interval;
            async move {
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(interval) => {}
                    }
                    match lister.list().await {
                        Ok(snapshot) => {
                            if tx.send(snapshot).await.is_err() {
                                break;
                            }
                        }
                        Err(error) => warn!(%error, "listing snapshot failed, keeping previous view"),
                    }
                }
            }
        };

        let consumer = async {
            loop {
                let Some(snapshot) = rx.recv().await else { break };
                debug!(items = snapshot.len(), "applying snapshot");
                let mut state = self.state.lock().await;
                state.apply_snapshot(|item| (self.key_of)(item), snapshot).await;
            }
        };

        tokio::join!(producer, consumer);
    }
}
