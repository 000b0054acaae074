//! Change-feed informer.

use super::{EventHandler, Informer, InformerState, ResourceEvent};
use futures::{stream::BoxStream, StreamExt};
use async_trait::async_trait;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a list/watch source emits: individual changes while the watch is
/// healthy, and a full relist when it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent<T> {
    /// An object was created or modified.
    Applied(T),
    /// An object was removed.
    Deleted(T),
    /// The watch was restarted; the full current population follows.
    /// Previously-known objects missing from it have been deleted.
    Restarted(Vec<T>),
}

/// Informer over a change feed. Emits the same event interface as the
/// periodic-list informer; `Restarted` batches are diffed against the known
/// population exactly like a snapshot.
pub struct PushInformer<K, T> {
    source: Mutex<Option<BoxStream<'static, SourceEvent<T>>>>,
    key_of: Arc<dyn Fn(&T) -> K + Send + Sync>,
    state: Mutex<InformerState<K, T>>,
}

impl<K, T> PushInformer<K, T>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        source: BoxStream<'static, SourceEvent<T>>,
        key_of: impl Fn(&T) -> K + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Mutex::new(Some(source)),
            key_of: Arc::new(key_of),
            state: Mutex::new(InformerState::default()),
        }
    }

    async fn ingest(&self, event: SourceEvent<T>) {
        let mut state = self.state.lock().await;
        match event {
            SourceEvent::Applied(item) => {
                let key = (self.key_of)(&item);
                match state.known.get(&key) {
                    None => {
                        state.known.insert(key, item.clone());
                        state.dispatch(ResourceEvent::Added(item)).await;
                    }
                    Some(previous) if *previous != item => {
                        state.known.insert(key, item.clone());
                        state.dispatch(ResourceEvent::Updated(item)).await;
                    }
                    Some(_) => {}
                }
            }
            SourceEvent::Deleted(item) => {
                let key = (self.key_of)(&item);
                if state.known.remove(&key).is_some() {
                    state.dispatch(ResourceEvent::Deleted(item)).await;
                }
            }
            SourceEvent::Restarted(items) => {
                debug!(items = items.len(), "watch restarted, rediffing");
                state.apply_snapshot(|item| (self.key_of)(item), items).await;
            }
        }
    }
}

#[async_trait]
impl<K, T> Informer<T> for PushInformer<K, T>
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
        let Some(mut source) = self.source.lock().await.take() else {
            debug!("push informer source already consumed");
            return;
        };
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                event = source.next() => match event {
                    Some(event) => self.ingest(event).await,
                    None => break,
                },
            }
        }
    }
}
