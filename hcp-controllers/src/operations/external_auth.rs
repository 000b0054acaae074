//! External-auth operation synchroniser.
//!
//! External auths have no remote state machine: existence is the signal.
//! Create and update complete once the object is visible; delete completes
//! once it is gone.

use super::{
    complete_deletion, update_resource_state, wants, OperationContext, OperationSyncer, Outcome,
};
use async_trait::async_trait;
use hcp_clients::ocm::ClusterService;
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{ExternalAuthDocument, OperationDocument};
use hcp_core::keys::TYPE_EXTERNAL_AUTHS;
use hcp_core::{OperationRequest, ProvisioningState};
use hcp_runtime::BoxError;
use std::sync::Arc;

pub struct ExternalAuthOperationSyncer {
    ctx: Arc<OperationContext>,
    backend: Arc<dyn StoreBackend>,
    external_auths: Docs<ExternalAuthDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl ExternalAuthOperationSyncer {
    #[must_use]
    pub fn new(
        ctx: Arc<OperationContext>,
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
    ) -> Self {
        Self {
            ctx,
            external_auths: Docs::new(Arc::clone(&backend)),
            backend,
            cluster_service,
        }
    }
}

#[async_trait]
impl OperationSyncer for ExternalAuthOperationSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(
            op,
            &[
                OperationRequest::Create,
                OperationRequest::Update,
                OperationRequest::Delete,
            ],
            TYPE_EXTERNAL_AUTHS,
        )
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            update_resource_state(&self.external_auths, op).await?;
            return self.ctx.notify_if_pending(op).await;
        }
        let Some(internal_id) = &op.internal_id else {
            return Err(format!("operation {} has no cluster-service id", op.id).into());
        };
        match self.cluster_service.get_external_auth(internal_id).await {
            Ok(_) => {
                let outcome = match op.request {
                    OperationRequest::Delete => Outcome::to(ProvisioningState::Deleting),
                    _ => Outcome::to(ProvisioningState::Succeeded),
                };
                let op = self.ctx.apply_outcome(op, outcome).await?;
                update_resource_state(&self.external_auths, &op).await?;
                self.ctx.notify_if_pending(&op).await
            }
            Err(err) if err.is_not_found() => match op.request {
                OperationRequest::Delete => {
                    complete_deletion(&self.ctx, &self.backend, op).await
                }
                _ => Err(err.into()),
            },
            Err(err) => Err(err.into()),
        }
    }
}
