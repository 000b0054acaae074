//! Node-pool operation synchronisers.

use super::{
    complete_deletion, update_resource_state, wants, OperationContext, OperationSyncer, Outcome,
};
use async_trait::async_trait;
use hcp_clients::ocm::{ClusterService, CsNodePoolState};
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{NodePoolDocument, OperationDocument};
use hcp_core::keys::TYPE_NODE_POOLS;
use hcp_core::{CloudError, OperationRequest, ProvisioningState};
use hcp_runtime::BoxError;
use std::sync::Arc;

/// The node-pool state table. `None` leaves the operation as it is.
fn translate_node_pool_state(
    state: &CsNodePoolState,
    current: ProvisioningState,
    deleting: bool,
) -> Result<Option<Outcome>, BoxError> {
    match state {
        CsNodePoolState::Validating | CsNodePoolState::Pending => {
            if current == ProvisioningState::Accepted {
                Ok(None)
            } else {
                Err(format!(
                    "node pool is {state:?} but the operation has already progressed to {current}"
                )
                .into())
            }
        }
        CsNodePoolState::Installing => Ok(Some(Outcome::to(ProvisioningState::Provisioning))),
        CsNodePoolState::Ready if deleting => Ok(None),
        CsNodePoolState::Ready => Ok(Some(Outcome::to(ProvisioningState::Succeeded))),
        CsNodePoolState::Updating => Ok(Some(Outcome::to(ProvisioningState::Updating))),
        CsNodePoolState::Uninstalling => Ok(Some(Outcome::to(ProvisioningState::Deleting))),
        CsNodePoolState::RecoverableError | CsNodePoolState::Error => {
            Ok(Some(Outcome::failed(CloudError::internal_server_error())))
        }
        CsNodePoolState::Other(state) => Err(format!("unhandled node pool state {state:?}").into()),
    }
}

/// Progresses node-pool create and update operations.
pub struct NodePoolOperationSyncer {
    ctx: Arc<OperationContext>,
    node_pools: Docs<NodePoolDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl NodePoolOperationSyncer {
    #[must_use]
    pub fn new(
        ctx: Arc<OperationContext>,
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
    ) -> Self {
        Self {
            ctx,
            node_pools: Docs::new(backend),
            cluster_service,
        }
    }
}

#[async_trait]
impl OperationSyncer for NodePoolOperationSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(
            op,
            &[OperationRequest::Create, OperationRequest::Update],
            TYPE_NODE_POOLS,
        )
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            update_resource_state(&self.node_pools, op).await?;
            return self.ctx.notify_if_pending(op).await;
        }
        let Some(internal_id) = &op.internal_id else {
            return Err(format!("operation {} has no cluster-service id", op.id).into());
        };
        let remote = self.cluster_service.get_node_pool(internal_id).await?;
        let Some(outcome) = translate_node_pool_state(&remote.state, op.state, false)? else {
            return Ok(());
        };
        let op = self.ctx.apply_outcome(op, outcome).await?;
        update_resource_state(&self.node_pools, &op).await?;
        self.ctx.notify_if_pending(&op).await
    }
}

/// Progresses node-pool delete operations.
pub struct NodePoolDeletionSyncer {
    ctx: Arc<OperationContext>,
    backend: Arc<dyn StoreBackend>,
    node_pools: Docs<NodePoolDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl NodePoolDeletionSyncer {
    #[must_use]
    pub fn new(
        ctx: Arc<OperationContext>,
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
    ) -> Self {
        Self {
            ctx,
            node_pools: Docs::new(Arc::clone(&backend)),
            backend,
            cluster_service,
        }
    }
}

#[async_trait]
impl OperationSyncer for NodePoolDeletionSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(op, &[OperationRequest::Delete], TYPE_NODE_POOLS)
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            update_resource_state(&self.node_pools, op).await?;
            return self.ctx.notify_if_pending(op).await;
        }
        let Some(internal_id) = &op.internal_id else {
            return Err(format!("operation {} has no cluster-service id", op.id).into());
        };
        match self.cluster_service.get_node_pool(internal_id).await {
            Err(err) if err.is_not_found() => {
                complete_deletion(&self.ctx, &self.backend, op).await
            }
            Ok(remote) => {
                let Some(outcome) = translate_node_pool_state(&remote.state, op.state, true)?
                else {
                    return Ok(());
                };
                let op = self.ctx.apply_outcome(op, outcome).await?;
                update_resource_state(&self.node_pools, &op).await?;
                self.ctx.notify_if_pending(&op).await
            }
            Err(err) => Err(err.into()),
        }
    }
}
