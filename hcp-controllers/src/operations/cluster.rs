//! Cluster operation synchronisers.

use super::{
    complete_deletion, update_resource_state, wants, OperationContext, OperationSyncer, Outcome,
    OCM_CODE_INFLIGHT_CHECKS,
};
use crate::billing;
use async_trait::async_trait;
use hcp_clients::ocm::{ClusterService, CsCluster, CsClusterState};
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{BillingDocument, ClusterDocument, OperationDocument};
use hcp_core::keys::TYPE_CLUSTERS;
use hcp_core::{CloudError, ClusterKey, OperationRequest, ProvisioningState};
use hcp_runtime::BoxError;
use std::sync::Arc;

/// The cluster state table shared by create/update and delete handling.
/// `None` means "leave the operation as it is".
fn translate_cluster_state(
    remote: &CsCluster,
    current: ProvisioningState,
    deleting: bool,
) -> Result<Option<Outcome>, BoxError> {
    match &remote.state {
        CsClusterState::Error => Ok(Some(Outcome::failed(provision_failure(remote)))),
        CsClusterState::Installing => Ok(Some(Outcome::to(ProvisioningState::Provisioning))),
        CsClusterState::Updating => Ok(Some(Outcome::to(ProvisioningState::Updating))),
        // During a delete the cluster is Ready until uninstall kicks in;
        // the operation keeps its current state.
        CsClusterState::Ready if deleting => Ok(None),
        CsClusterState::Ready => Ok(Some(Outcome::to(ProvisioningState::Succeeded))),
        CsClusterState::Uninstalling => Ok(Some(Outcome::to(ProvisioningState::Deleting))),
        CsClusterState::Pending | CsClusterState::Validating => {
            if current == ProvisioningState::Accepted {
                Ok(None)
            } else {
                Err(format!(
                    "cluster is {:?} but the operation has already progressed to {current}",
                    remote.state
                )
                .into())
            }
        }
        CsClusterState::Other(state) => Err(format!("unhandled cluster state {state:?}").into()),
    }
}

fn provision_failure(remote: &CsCluster) -> CloudError {
    match &remote.provision_error {
        Some(err) if err.code == OCM_CODE_INFLIGHT_CHECKS && !remote.inflight_checks.is_empty() => {
            CloudError::multiple(
                remote
                    .inflight_checks
                    .iter()
                    .map(|check| {
                        CloudError::new(
                            "InflightCheckFailed",
                            format!("{}: {}", check.name, check.details),
                        )
                    })
                    .collect(),
            )
        }
        Some(err) => CloudError::new(&*err.code, &*err.message),
        None => CloudError::internal_server_error(),
    }
}

/// Progresses cluster create and update operations.
pub struct ClusterOperationSyncer {
    ctx: Arc<OperationContext>,
    clusters: Docs<ClusterDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl ClusterOperationSyncer {
    #[must_use]
    pub fn new(
        ctx: Arc<OperationContext>,
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
    ) -> Self {
        Self {
            ctx,
            clusters: Docs::new(backend),
            cluster_service,
        }
    }
}

#[async_trait]
impl OperationSyncer for ClusterOperationSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(
            op,
            &[OperationRequest::Create, OperationRequest::Update],
            TYPE_CLUSTERS,
        )
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            update_resource_state(&self.clusters, op).await?;
            return self.ctx.notify_if_pending(op).await;
        }
        let Some(internal_id) = &op.internal_id else {
            return Err(format!("operation {} has no cluster-service id", op.id).into());
        };
        let remote = self.cluster_service.get_cluster(internal_id).await?;
        let Some(outcome) = translate_cluster_state(&remote, op.state, false)? else {
            return Ok(());
        };
        let op = self.ctx.apply_outcome(op, outcome).await?;
        update_resource_state(&self.clusters, &op).await?;
        self.ctx.notify_if_pending(&op).await
    }
}

/// Progresses cluster delete operations, completing the teardown when the
/// remote side reports not-found.
pub struct ClusterDeletionSyncer {
    ctx: Arc<OperationContext>,
    backend: Arc<dyn StoreBackend>,
    clusters: Docs<ClusterDocument>,
    billing: Docs<BillingDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl ClusterDeletionSyncer {
    #[must_use]
    pub fn new(
        ctx: Arc<OperationContext>,
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
    ) -> Self {
        Self {
            ctx,
            clusters: Docs::new(Arc::clone(&backend)),
            billing: Docs::new(Arc::clone(&backend)),
            backend,
            cluster_service,
        }
    }
}

#[async_trait]
impl OperationSyncer for ClusterDeletionSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(op, &[OperationRequest::Delete], TYPE_CLUSTERS)
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            update_resource_state(&self.clusters, op).await?;
            return self.ctx.notify_if_pending(op).await;
        }
        let Some(internal_id) = &op.internal_id else {
            return Err(format!("operation {} has no cluster-service id", op.id).into());
        };
        match self.cluster_service.get_cluster(internal_id).await {
            Err(err) if err.is_not_found() => {
                let Some(key) = ClusterKey::from_resource_id(&op.external_id) else {
                    return Err(
                        format!("operation {} does not target a cluster", op.id).into()
                    );
                };
                // Billing is stamped before anything is removed so a crash
                // mid-teardown stays restartable.
                billing::stamp_deletion(&self.billing, &key, self.ctx.clock.now()).await?;
                complete_deletion(&self.ctx, &self.backend, op).await
            }
            Ok(remote) => {
                let Some(outcome) = translate_cluster_state(&remote, op.state, true)? else {
                    return Ok(());
                };
                let op = self.ctx.apply_outcome(op, outcome).await?;
                update_resource_state(&self.clusters, &op).await?;
                self.ctx.notify_if_pending(&op).await
            }
            Err(err) => Err(err.into()),
        }
    }
}
