//! Progression of asynchronous operations.
//!
//! One syncer exists per (request kind × resource kind) pair; all of them
//! share the same skeleton: fetch the operation, query the remote system,
//! translate its state into an ARM provisioning state, patch the operation
//! document only when something changed, update the external resource behind
//! the active-operation-id precondition, and deliver the terminal
//! notification exactly once.

mod cluster;
mod credentials;
mod external_auth;
mod node_pool;

pub use cluster::{ClusterDeletionSyncer, ClusterOperationSyncer};
pub use credentials::{RequestCredentialSyncer, RevokeCredentialsSyncer};
pub use external_auth::ExternalAuthOperationSyncer;
pub use node_pool::{NodePoolDeletionSyncer, NodePoolOperationSyncer};

use crate::gc;
use async_trait::async_trait;
use hcp_clients::notify::{NotificationClient, NotificationPayload};
use hcp_clients::ocm::ClusterService;
use hcp_clients::store::{Docs, StoreBackend, StoreError};
use hcp_core::documents::{OperationDocument, ProvisionedResource};
use hcp_core::{CloudError, OperationKey, OperationRequest, ProvisioningState, ResourceKey};
use hcp_runtime::{BoxError, Clock, Cooldown, Syncer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Provision-error code the cluster service uses for failed in-flight
/// checks; expanded into a multi-error body.
pub(crate) const OCM_CODE_INFLIGHT_CHECKS: &str = "OCM4001";

/// The translated result of one remote status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub state: ProvisioningState,
    pub error: Option<CloudError>,
}

impl Outcome {
    pub(crate) fn to(state: ProvisioningState) -> Self {
        Self { state, error: None }
    }

    pub(crate) fn failed(error: CloudError) -> Self {
        Self {
            state: ProvisioningState::Failed,
            error: Some(error),
        }
    }
}

/// Shared plumbing for the concrete operation syncers.
pub(crate) struct OperationContext {
    pub operations: Docs<OperationDocument>,
    pub notifier: Arc<dyn NotificationClient>,
    pub clock: Arc<dyn Clock>,
}

impl OperationContext {
    /// Patches the operation document to `outcome` if anything changed.
    /// Terminal states are sticky: once reached, the only further mutation
    /// is clearing the notification URI in [`Self::notify_if_pending`].
    pub(crate) async fn apply_outcome(
        &self,
        op: &OperationDocument,
        outcome: Outcome,
    ) -> Result<OperationDocument, StoreError> {
        if op.is_terminal() {
            return Ok(op.clone());
        }
        if op.state == outcome.state && op.error == outcome.error {
            return Ok(op.clone());
        }
        let now = self.clock.now();
        info!(id = %op.id, from = %op.state, to = %outcome.state, "operation state change");
        self.operations
            .patch(&op.id, move |doc| {
                if doc.state != outcome.state {
                    doc.last_transition_time = now;
                }
                doc.state = outcome.state;
                doc.error = outcome.error;
            })
            .await
    }

    /// Delivers the terminal notification, clearing the URI on acceptance so
    /// no later reconcile re-notifies. A rejected delivery leaves the URI in
    /// place and surfaces the error for the queue to retry.
    pub(crate) async fn notify_if_pending(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if !op.notification_pending() {
            return Ok(());
        }
        let Some(uri) = &op.notification_uri else {
            return Ok(());
        };
        self.notifier
            .notify(uri, &NotificationPayload::for_operation(op))
            .await?;
        self.operations
            .patch(&op.id, |doc| doc.notification_uri = None)
            .await?;
        Ok(())
    }
}

/// Updates the external resource's provisioning state to match the
/// operation, guarded by the active-operation-id precondition so a stale
/// reconcile never stomps on a newer operation. Terminal states clear the
/// active-operation id.
pub(crate) async fn update_resource_state<D: ProvisionedResource>(
    docs: &Docs<D>,
    op: &OperationDocument,
) -> Result<(), StoreError> {
    let Some(resource) = docs.try_get(&op.external_id).await? else {
        return Ok(());
    };
    if resource.active_operation_id() != Some(&op.id) {
        debug!(id = %op.id, resource = %op.external_id, "not the active operation, leaving resource untouched");
        return Ok(());
    }
    if resource.provisioning_state() == op.state && !op.state.is_terminal() {
        return Ok(());
    }
    let state = op.state;
    docs.patch(&op.external_id, move |doc| {
        doc.set_provisioning_state(state);
        if state.is_terminal() {
            doc.set_active_operation_id(None);
        }
    })
    .await?;
    Ok(())
}

/// Finishes a delete operation whose remote object is gone: the resource
/// document and its non-controller descendants are removed (controller
/// records stay for the orphan sweep), then the operation is marked
/// Succeeded and the notification delivered.
pub(crate) async fn complete_deletion(
    ctx: &OperationContext,
    backend: &Arc<dyn StoreBackend>,
    op: &OperationDocument,
) -> Result<(), BoxError> {
    info!(id = %op.id, resource = %op.external_id, "remote object gone, completing deletion");
    match backend.delete(&op.external_id).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => return Err(err.into()),
    }
    gc::delete_descendants_matching(backend, &op.external_id, |id| !gc::is_controller_record(id))
        .await?;
    let op = ctx.apply_outcome(op, Outcome::to(ProvisioningState::Succeeded)).await?;
    ctx.notify_if_pending(&op).await
}

/// The common `ShouldProcess` shape: matching request kind and resource
/// type, and still in need of work — non-terminal, or terminal with an
/// undelivered notification.
pub(crate) fn wants(
    op: &OperationDocument,
    requests: &[OperationRequest],
    resource_type: &str,
) -> bool {
    requests.contains(&op.request)
        && op.external_id.resource_type().eq_ignore_ascii_case(resource_type)
        && (!op.is_terminal() || op.notification_pending())
}

/// One synchroniser per (request kind × resource kind) pair.
#[async_trait]
pub trait OperationSyncer: Send + Sync + 'static {
    /// Cheap predicate deciding whether this syncer progresses `op`.
    fn should_process(&self, op: &OperationDocument) -> bool;

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError>;
}

/// The controller-facing syncer: routes each operation to the first
/// registered synchroniser that wants it.
pub struct OperationsSyncer {
    operations: Docs<OperationDocument>,
    syncers: Vec<Arc<dyn OperationSyncer>>,
    cooldown: Arc<dyn Cooldown<OperationKey>>,
}

impl OperationsSyncer {
    /// Wires up the full synchroniser set over one store backend and
    /// cluster service.
    #[must_use]
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
        notifier: Arc<dyn NotificationClient>,
        clock: Arc<dyn Clock>,
        cooldown: Arc<dyn Cooldown<OperationKey>>,
    ) -> Self {
        let ctx = Arc::new(OperationContext {
            operations: Docs::new(Arc::clone(&backend)),
            notifier,
            clock,
        });
        let syncers: Vec<Arc<dyn OperationSyncer>> = vec![
            Arc::new(ClusterOperationSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                Arc::clone(&cluster_service),
            )),
            Arc::new(ClusterDeletionSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                Arc::clone(&cluster_service),
            )),
            Arc::new(NodePoolOperationSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                Arc::clone(&cluster_service),
            )),
            Arc::new(NodePoolDeletionSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                Arc::clone(&cluster_service),
            )),
            Arc::new(ExternalAuthOperationSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                Arc::clone(&cluster_service),
            )),
            Arc::new(RequestCredentialSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                Arc::clone(&cluster_service),
            )),
            Arc::new(RevokeCredentialsSyncer::new(
                Arc::clone(&ctx),
                Arc::clone(&backend),
                cluster_service,
            )),
        ];
        Self {
            operations: Docs::new(backend),
            syncers,
            cooldown,
        }
    }
}

#[async_trait]
impl Syncer for OperationsSyncer {
    type Key = OperationKey;

    async fn sync_once(
        &self,
        _shutdown: &CancellationToken,
        key: &OperationKey,
    ) -> Result<(), BoxError> {
        let Some(op) = self.operations.try_get(&key.resource_id()).await? else {
            return Ok(());
        };
        for syncer in &self.syncers {
            if syncer.should_process(&op) {
                return syncer.synchronize(&op).await;
            }
        }
        debug!(id = %op.id, state = %op.state, "no synchroniser wants this operation");
        Ok(())
    }

    fn cooldown(&self) -> Arc<dyn Cooldown<OperationKey>> {
        Arc::clone(&self.cooldown)
    }
}
