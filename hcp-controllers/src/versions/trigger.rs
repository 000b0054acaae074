//! Actuates persisted upgrade decisions through upgrade policies.

use async_trait::async_trait;
use hcp_clients::ocm::ClusterService;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{ClusterDocument, ServiceProviderClusterDocument};
use hcp_core::{ClusterKey, ResourceKey};
use hcp_runtime::{BoxError, Cooldown, Syncer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cluster syncer that creates a remote upgrade policy when the desired
/// version has moved past the latest active one and no existing policy
/// already targets it.
pub struct UpgradePolicySyncer {
    clusters: Docs<ClusterDocument>,
    provider_state: Docs<ServiceProviderClusterDocument>,
    cluster_service: Arc<dyn ClusterService>,
    cooldown: Arc<dyn Cooldown<ClusterKey>>,
}

impl UpgradePolicySyncer {
    #[must_use]
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
        cooldown: Arc<dyn Cooldown<ClusterKey>>,
    ) -> Self {
        Self {
            clusters: Docs::new(Arc::clone(&backend)),
            provider_state: Docs::new(backend),
            cluster_service,
            cooldown,
        }
    }
}

#[async_trait]
impl Syncer for UpgradePolicySyncer {
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
            return Ok(());
        };
        let Some(state) = self.provider_state.try_get(&key.provider_state_id()).await? else {
            return Ok(());
        };
        let (Some(desired), Some(latest_active)) =
            (&state.desired_version, state.latest_active())
        else {
            return Ok(());
        };
        if desired == latest_active {
            return Ok(());
        }

        let mut policies = self.cluster_service.list_upgrade_policies(internal_id).await?;
        policies.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
        if policies.first().map(|policy| &policy.version) == Some(desired) {
            debug!(%key, %desired, "upgrade policy already in place");
            return Ok(());
        }

        info!(%key, %desired, "creating upgrade policy");
        self.cluster_service
            .create_upgrade_policy(internal_id, desired)
            .await?;
        Ok(())
    }

    fn cooldown(&self) -> Arc<dyn Cooldown<ClusterKey>> {
        Arc::clone(&self.cooldown)
    }
}
