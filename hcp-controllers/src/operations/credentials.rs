//! Break-glass credential operation synchronisers.
//!
//! Credential operations target the cluster resource but do not drive its
//! provisioning state; only the operation document progresses.

use super::{wants, OperationContext, OperationSyncer, Outcome};
use async_trait::async_trait;
use hcp_clients::ocm::{ClusterService, CredentialStatus};
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{ClusterDocument, OperationDocument};
use hcp_core::keys::TYPE_CLUSTERS;
use hcp_core::{CloudError, OperationRequest, ProvisioningState};
use hcp_runtime::BoxError;
use std::sync::Arc;

async fn cluster_internal_id(
    clusters: &Docs<ClusterDocument>,
    op: &OperationDocument,
) -> Result<String, BoxError> {
    let Some(cluster) = clusters.try_get(&op.external_id).await? else {
        return Err(format!("cluster {} is gone under operation {}", op.external_id, op.id).into());
    };
    cluster
        .internal_id
        .ok_or_else(|| format!("cluster {} has no cluster-service id", op.external_id).into())
}

/// Progresses a single break-glass credential issuance.
pub struct RequestCredentialSyncer {
    ctx: Arc<OperationContext>,
    clusters: Docs<ClusterDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl RequestCredentialSyncer {
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
impl OperationSyncer for RequestCredentialSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(op, &[OperationRequest::RequestCredential], TYPE_CLUSTERS)
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            return self.ctx.notify_if_pending(op).await;
        }
        let Some(credential_id) = &op.internal_id else {
            return Err(format!("operation {} has no credential id", op.id).into());
        };
        let cluster_id = cluster_internal_id(&self.clusters, op).await?;
        let credential = self
            .cluster_service
            .get_break_glass_credential(&cluster_id, credential_id)
            .await?;

        let outcome = match credential.status {
            CredentialStatus::Created => Outcome::to(ProvisioningState::Provisioning),
            CredentialStatus::Issued => Outcome::to(ProvisioningState::Succeeded),
            CredentialStatus::Failed => Outcome::failed(CloudError::internal_server_error()),
            status @ (CredentialStatus::AwaitingRevocation | CredentialStatus::Revoked) => {
                return Err(format!(
                    "credential {credential_id} is {status:?} while issuance is still in flight"
                )
                .into());
            }
        };
        let op = self.ctx.apply_outcome(op, outcome).await?;
        self.ctx.notify_if_pending(&op).await
    }
}

/// Progresses a bulk revocation across a cluster's credentials.
pub struct RevokeCredentialsSyncer {
    ctx: Arc<OperationContext>,
    clusters: Docs<ClusterDocument>,
    cluster_service: Arc<dyn ClusterService>,
}

impl RevokeCredentialsSyncer {
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
impl OperationSyncer for RevokeCredentialsSyncer {
    fn should_process(&self, op: &OperationDocument) -> bool {
        wants(op, &[OperationRequest::RevokeCredentials], TYPE_CLUSTERS)
    }

    async fn synchronize(&self, op: &OperationDocument) -> Result<(), BoxError> {
        if op.is_terminal() {
            return self.ctx.notify_if_pending(op).await;
        }
        let cluster_id = cluster_internal_id(&self.clusters, op).await?;
        let credentials = self
            .cluster_service
            .list_break_glass_credentials(&cluster_id)
            .await?;

        // Expired credentials no longer matter; revocation is done when no
        // live credential is still awaiting it.
        let now = self.ctx.clock.now();
        let live: Vec<_> = credentials
            .iter()
            .filter(|credential| !credential.is_expired(now))
            .collect();

        let outcome = if live
            .iter()
            .any(|credential| credential.status == CredentialStatus::AwaitingRevocation)
        {
            Outcome::to(ProvisioningState::Deleting)
        } else if live
            .iter()
            .any(|credential| credential.status == CredentialStatus::Failed)
        {
            Outcome::failed(CloudError::internal_server_error())
        } else {
            Outcome::to(ProvisioningState::Succeeded)
        };

        let op = self.ctx.apply_outcome(op, outcome).await?;
        self.ctx.notify_if_pending(&op).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::optest::OpFixture;
    use super::*;
    use crate::testutil::ts;
    use chrono::{DateTime, Utc};
    use hcp_clients::ocm::BreakGlassCredential;
    use hcp_core::{ClusterKey, ResourceKey};

    fn cluster_key() -> ClusterKey {
        ClusterKey::new("sub1", "rg1", "c1")
    }

    async fn seed_cluster(fixture: &OpFixture) {
        let mut cluster = ClusterDocument::new(cluster_key().resource_id());
        cluster.internal_id = Some("cs-c1".into());
        Docs::new(Arc::clone(&fixture.backend)).create(&cluster).await.unwrap();
    }

    fn put_credential(fixture: &OpFixture, id: &str, status: CredentialStatus, expiration: DateTime<Utc>) {
        fixture
            .cluster_service
            .credentials
            .lock()
            .entry("cs-c1".into())
            .or_default()
            .push(BreakGlassCredential {
                id: id.to_owned(),
                status,
                expiration,
            });
    }

    fn far_future() -> DateTime<Utc> {
        ts("2027-01-01T00:00:00Z")
    }

    fn request_syncer(fixture: &OpFixture) -> RequestCredentialSyncer {
        RequestCredentialSyncer::new(
            fixture.ctx(),
            Arc::clone(&fixture.backend),
            Arc::clone(&fixture.cluster_service) as Arc<dyn ClusterService>,
        )
    }

    fn revoke_syncer(fixture: &OpFixture) -> RevokeCredentialsSyncer {
        RevokeCredentialsSyncer::new(
            fixture.ctx(),
            Arc::clone(&fixture.backend),
            Arc::clone(&fixture.cluster_service) as Arc<dyn ClusterService>,
        )
    }

    #[tokio::test]
    async fn issuance_follows_the_credential_status() {
        for (status, expected) in [
            (CredentialStatus::Created, ProvisioningState::Provisioning),
            (CredentialStatus::Issued, ProvisioningState::Succeeded),
            (CredentialStatus::Failed, ProvisioningState::Failed),
        ] {
            let fixture = OpFixture::new();
            seed_cluster(&fixture).await;
            let mut op = fixture
                .put_operation("op1", cluster_key().resource_id(), OperationRequest::RequestCredential)
                .await;
            op.internal_id = Some("cred-1".into());
            Docs::new(Arc::clone(&fixture.backend)).replace(&op).await.unwrap();
            put_credential(&fixture, "cred-1", status, far_future());

            request_syncer(&fixture).synchronize(&op).await.unwrap();
            let stored = fixture.operation(&op).await;
            assert_eq!(stored.state, expected, "{status:?}");
            if expected == ProvisioningState::Failed {
                assert_eq!(stored.error.unwrap().code, "InternalServerError");
            }
        }
    }

    #[tokio::test]
    async fn revocation_waits_for_awaiting_credentials() {
        let fixture = OpFixture::new();
        seed_cluster(&fixture).await;
        let op = fixture
            .put_operation("op1", cluster_key().resource_id(), OperationRequest::RevokeCredentials)
            .await;
        put_credential(&fixture, "a", CredentialStatus::Revoked, far_future());
        put_credential(&fixture, "b", CredentialStatus::AwaitingRevocation, far_future());

        revoke_syncer(&fixture).synchronize(&op).await.unwrap();
        assert_eq!(fixture.operation(&op).await.state, ProvisioningState::Deleting);
    }

    #[tokio::test]
    async fn revocation_fails_on_a_failed_credential() {
        let fixture = OpFixture::new();
        seed_cluster(&fixture).await;
        let op = fixture
            .put_operation("op1", cluster_key().resource_id(), OperationRequest::RevokeCredentials)
            .await;
        put_credential(&fixture, "a", CredentialStatus::Revoked, far_future());
        put_credential(&fixture, "b", CredentialStatus::Failed, far_future());

        revoke_syncer(&fixture).synchronize(&op).await.unwrap();
        assert_eq!(fixture.operation(&op).await.state, ProvisioningState::Failed);
    }

    #[tokio::test]
    async fn expired_credentials_do_not_block_revocation() {
        let fixture = OpFixture::new();
        seed_cluster(&fixture).await;
        let op = fixture
            .put_operation("op1", cluster_key().resource_id(), OperationRequest::RevokeCredentials)
            .await;
        // Expired long before the fixture clock's "now".
        put_credential(
            &fixture,
            "stale",
            CredentialStatus::AwaitingRevocation,
            ts("2026-01-01T00:00:00Z"),
        );
        put_credential(&fixture, "done", CredentialStatus::Revoked, far_future());

        revoke_syncer(&fixture).synchronize(&op).await.unwrap();
        assert_eq!(fixture.operation(&op).await.state, ProvisioningState::Succeeded);
    }

    #[tokio::test]
    async fn revocation_with_no_credentials_succeeds() {
        let fixture = OpFixture::new();
        seed_cluster(&fixture).await;
        let op = fixture
            .put_operation("op1", cluster_key().resource_id(), OperationRequest::RevokeCredentials)
            .await;

        revoke_syncer(&fixture).synchronize(&op).await.unwrap();
        assert_eq!(fixture.operation(&op).await.state, ProvisioningState::Succeeded);
    }
}
