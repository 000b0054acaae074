//! Parent-check drift for clusters.

use crate::billing;
use crate::gc;
use async_trait::async_trait;
use hcp_clients::ocm::ClusterService;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{BillingDocument, ClusterDocument};
use hcp_core::{ClusterKey, ResourceKey};
use hcp_runtime::{BoxError, Clock, Cooldown, Syncer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Confirms a cluster's remote counterpart still exists; when the cluster
/// service reports not-found, stamps the billing document and cascade-deletes
/// the local hierarchy. The stamp happens first so a crashed run leaves the
/// teardown restartable.
pub struct ClusterDriftSyncer {
    backend: Arc<dyn StoreBackend>,
    clusters: Docs<ClusterDocument>,
    billing: Docs<BillingDocument>,
    cluster_service: Arc<dyn ClusterService>,
    clock: Arc<dyn Clock>,
    cooldown: Arc<dyn Cooldown<ClusterKey>>,
}

impl ClusterDriftSyncer {
    #[must_use]
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
        clock: Arc<dyn Clock>,
        cooldown: Arc<dyn Cooldown<ClusterKey>>,
    ) -> Self {
        Self {
            clusters: Docs::new(Arc::clone(&backend)),
            billing: Docs::new(Arc::clone(&backend)),
            backend,
            cluster_service,
            clock,
            cooldown,
        }
    }
}

#[async_trait]
impl Syncer for ClusterDriftSyncer {
    type Key = ClusterKey;

    async fn sync_once(
        &self,
        _shutdown: &CancellationToken,
        key: &ClusterKey,
    ) -> Result<(), BoxError> {
        let Some(cluster) = self.clusters.try_get(&key.resource_id()).await? else {
            return Ok(());
        };
        let Some(internal_id) = &cluster.internal_id else {
            debug!(%key, "cluster not yet created remotely, nothing to compare");
            return Ok(());
        };

        match self.cluster_service.get_cluster(internal_id).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => {
                info!(%key, "remote cluster is gone, finalising local hierarchy");
                billing::stamp_deletion(&self.billing, key, self.clock.now()).await?;
                gc::delete_recursively(&self.backend, &key.resource_id()).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn cooldown(&self) -> Arc<dyn Cooldown<ClusterKey>> {
        Arc::clone(&self.cooldown)
    }
}
