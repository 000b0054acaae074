//! Sweeping controller records whose parent resource is gone.
//!
//! The status reporter deliberately never retries a conflicted write, and
//! reconcilers keep recording status right up until the moment the parent
//! disappears. This sweep is the counterpart: it bounds the lifetime of any
//! record left behind.

use async_trait::async_trait;
use futures::TryStreamExt;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::ControllerDocument;
use hcp_core::{ResourceKey, SubscriptionKey};
use hcp_runtime::{BoxError, Cooldown, Syncer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Per-subscription sweep deleting controller records under deleted
/// resources.
pub struct OrphanControllerSweep {
    backend: Arc<dyn StoreBackend>,
    records: Docs<ControllerDocument>,
    cooldown: Arc<dyn Cooldown<SubscriptionKey>>,
}

impl OrphanControllerSweep {
    #[must_use]
    pub fn new(backend: Arc<dyn StoreBackend>, cooldown: Arc<dyn Cooldown<SubscriptionKey>>) -> Self {
        Self {
            records: Docs::new(Arc::clone(&backend)),
            backend,
            cooldown,
        }
    }
}

#[async_trait]
impl Syncer for OrphanControllerSweep {
    type Key = SubscriptionKey;

    async fn sync_once(
        &self,
        _shutdown: &CancellationToken,
        key: &SubscriptionKey,
    ) -> Result<(), BoxError> {
        let records: Vec<ControllerDocument> =
            self.records.list(Some(&key.resource_id())).try_collect().await?;

        for record in records {
            let Some(parent) = record.parent_resource() else {
                warn!(id = %record.id, "controller record with no parent id");
                continue;
            };
            match self.backend.get(&parent).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {
                    info!(id = %record.id, %parent, "parent resource is gone, deleting controller record");
                    match self.records.delete(&record.id).await {
                        Ok(()) => {}
                        Err(err) if err.is_not_found() => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn cooldown(&self) -> Arc<dyn Cooldown<SubscriptionKey>> {
        Arc::clone(&self.cooldown)
    }
}
