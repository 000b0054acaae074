//! Informers: sources of Add/Update/Delete events for a typed resource.
//!
//! An informer owns the canonical in-memory view of one resource population
//! and tells its handlers how that view changes. Two implementations exist:
//! [`PollInformer`] diffs periodic list snapshots, [`PushInformer`] consumes
//! a change feed. Handlers are invoked one at a time per informer, and a
//! handler registered late is first replayed an `Added` for every item the
//! informer already knows, so it never misses state.

mod poll;
mod push;

pub use poll::{PollInformer, SnapshotLister};
pub use push::{PushInformer, SourceEvent};

use async_trait::async_trait;
use hashbrown::HashMap;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;

/// A change to one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent<T> {
    Added(T),
    Updated(T),
    Deleted(T),
}

/// Consumer of an informer's event stream.
///
/// Handlers run serially per informer and must not block beyond the work
/// queue's non-blocking `add`.
#[async_trait]
pub trait EventHandler<T>: Send + Sync + 'static {
    async fn handle(&self, event: ResourceEvent<T>);
}

#[async_trait]
pub trait Informer<T>: Send + Sync + 'static {
    /// Registers a handler, replaying `Added` for every currently-known
    /// item before it sees live events.
    async fn register(&self, handler: Box<dyn EventHandler<T>>);

    /// Consumes the source until `shutdown` is cancelled.
    async fn run(&self, shutdown: CancellationToken);
}

/// Shared informer state: the known population plus the handler list.
pub(crate) struct InformerState<K, T> {
    pub(crate) known: HashMap<K, T>,
    pub(crate) handlers: Vec<Box<dyn EventHandler<T>>>,
}

impl<K, T> Default for InformerState<K, T> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            handlers: Vec::new(),
        }
    }
}

impl<K, T> InformerState<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + PartialEq + 'static,
{
    pub(crate) async fn dispatch(&self, event: ResourceEvent<T>) {
        for handler in &self.handlers {
            handler.handle(event.clone()).await;
        }
    }

    /// Replaces the known population with `snapshot`, emitting the
    /// symmetric difference: `Added` for newcomers, `Updated` for
    /// key-matches with a different payload, `Deleted` for disappearances.
    pub(crate) async fn apply_snapshot(
        &mut self,
        key_of: impl Fn(&T) -> K,
        snapshot: Vec<T>,
    ) {
        let mut fresh: HashMap<K, T> = HashMap::with_capacity(snapshot.len());
        for item in snapshot {
            fresh.insert(key_of(&item), item);
        }

        let mut events = Vec::new();
        for (key, item) in &fresh {
            match self.known.get(key) {
                None => events.push(ResourceEvent::Added(item.clone())),
                Some(previous) if previous != item => {
                    events.push(ResourceEvent::Updated(item.clone()));
                }
                Some(_) => {}
            }
        }
        for (key, item) in &self.known {
            if !fresh.contains_key(key) {
                events.push(ResourceEvent::Deleted(item.clone()));
            }
        }

        self.known = fresh;
        for event in events {
            self.dispatch(event).await;
        }
    }
}
