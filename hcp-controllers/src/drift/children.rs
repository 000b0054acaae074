//! List-and-diff drift for a cluster's children.
//!
//! Both populations are keyed by the cluster-service href recorded on the
//! local document. Local children the remote side no longer has are
//! cascade-deleted; remote children with no document are reported only.

use crate::gc;
use async_trait::async_trait;
use futures::TryStreamExt;
use hashbrown::{HashMap, HashSet};
use hcp_clients::ocm::{ClusterService, OcmError};
use hcp_clients::store::{Docs, StoreBackend};
use hcp_core::documents::{ClusterDocument, Document, ExternalAuthDocument, NodePoolDocument};
use hcp_core::{ClusterKey, ResourceKey};
use hcp_runtime::{BoxError, Cooldown, Syncer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A document kind mirroring a cluster-service child object.
#[async_trait]
pub trait RemoteChild: Document {
    fn internal_id(&self) -> Option<&str>;

    /// The remote population under a cluster, as (href, name) pairs.
    async fn list_remote(
        cluster_service: &dyn ClusterService,
        cluster_internal_id: &str,
    ) -> Result<Vec<(String, String)>, OcmError>;
}

#[async_trait]
impl RemoteChild for NodePoolDocument {
    fn internal_id(&self) -> Option<&str> {
        self.internal_id.as_deref()
    }

    async fn list_remote(
        cluster_service: &dyn ClusterService,
        cluster_internal_id: &str,
    ) -> Result<Vec<(String, String)>, OcmError> {
        Ok(cluster_service
            .list_node_pools(cluster_internal_id)
            .await?
            .into_iter()
            .map(|pool| (pool.id, pool.name))
            .collect())
    }
}

#[async_trait]
impl RemoteChild for ExternalAuthDocument {
    fn internal_id(&self) -> Option<&str> {
        self.internal_id.as_deref()
    }

    async fn list_remote(
        cluster_service: &dyn ClusterService,
        cluster_internal_id: &str,
    ) -> Result<Vec<(String, String)>, OcmError> {
        Ok(cluster_service
            .list_external_auths(cluster_internal_id)
            .await?
            .into_iter()
            .map(|auth| (auth.id, auth.name))
            .collect())
    }
}

/// Per-cluster list-and-diff of one child kind.
pub struct ChildDriftSyncer<D: RemoteChild> {
    backend: Arc<dyn StoreBackend>,
    clusters: Docs<ClusterDocument>,
    children: Docs<D>,
    cluster_service: Arc<dyn ClusterService>,
    cooldown: Arc<dyn Cooldown<ClusterKey>>,
}

pub type NodePoolDriftSyncer = ChildDriftSyncer<NodePoolDocument>;
pub type ExternalAuthDriftSyncer = ChildDriftSyncer<ExternalAuthDocument>;

impl<D: RemoteChild> ChildDriftSyncer<D> {
    #[must_use]
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<dyn ClusterService>,
        cooldown: Arc<dyn Cooldown<ClusterKey>>,
    ) -> Self {
        Self {
            clusters: Docs::new(Arc::clone(&backend)),
            children: Docs::new(Arc::clone(&backend)),
            backend,
            cluster_service,
            cooldown,
        }
    }
}

#[async_trait]
impl<D: RemoteChild> Syncer for ChildDriftSyncer<D> {
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

        let remote: HashMap<String, String> =
            match D::list_remote(self.cluster_service.as_ref(), internal_id).await {
                Ok(children) => children.into_iter().collect(),
                // The whole cluster is gone; the parent-check reconciler
                // owns that cascade.
                Err(err) if err.is_not_found() => return Ok(()),
                Err(err) => return Err(err.into()),
            };

        let local: Vec<D> = self.children.list(Some(&key.resource_id())).try_collect().await?;

        let mut local_hrefs: HashSet<&str> = HashSet::new();
        for doc in &local {
            let Some(href) = doc.internal_id() else {
                debug!(id = %doc.id(), "child has no remote identity yet, skipping");
                continue;
            };
            local_hrefs.insert(href);
            if !remote.contains_key(href) {
                info!(id = %doc.id(), href, "remote child is gone, deleting local hierarchy");
                gc::delete_recursively(&self.backend, doc.id()).await?;
            }
        }

        for (href, name) in &remote {
            if !local_hrefs.contains(href.as_str()) {
                // Creation is the frontend's job, not this reconciler's.
                warn!(%key, href = href.as_str(), name = name.as_str(), "remote child has no document");
            }
        }
        Ok(())
    }

    fn cooldown(&self) -> Arc<dyn Cooldown<ClusterKey>> {
        Arc::clone(&self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeClusterService;
    use hcp_clients::ocm::{CsClusterState, CsNodePool, CsNodePoolState};
    use hcp_clients::store::MemoryStore;
    use hcp_core::NodePoolKey;
    use hcp_runtime::TimeCooldown;
    use std::time::Duration;

    struct Fixture {
        backend: Arc<dyn StoreBackend>,
        cluster_service: Arc<FakeClusterService>,
        key: ClusterKey,
    }

    impl Fixture {
        async fn new() -> Self {
            let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
            let cluster_service = Arc::new(FakeClusterService::new());
            let key = ClusterKey::new("sub1", "rg1", "c1");
            cluster_service.put_cluster("cs-c1", CsClusterState::Ready);

            let mut cluster = ClusterDocument::new(key.resource_id());
            cluster.internal_id = Some("cs-c1".into());
            Docs::new(Arc::clone(&backend)).create(&cluster).await.unwrap();

            Self {
                backend,
                cluster_service,
                key,
            }
        }

        async fn add_local_pool(&self, name: &str, href: Option<&str>) -> NodePoolKey {
            let pool_key = NodePoolKey::new(self.key.clone(), name);
            let mut doc = NodePoolDocument::new(pool_key.resource_id());
            doc.internal_id = href.map(str::to_owned);
            Docs::new(Arc::clone(&self.backend)).create(&doc).await.unwrap();
            pool_key
        }

        fn add_remote_pool(&self, href: &str, name: &str) {
            self.cluster_service
                .node_pools
                .lock()
                .entry("cs-c1".into())
                .or_default()
                .push(CsNodePool {
                    id: href.to_owned(),
                    name: name.to_owned(),
                    state: CsNodePoolState::Ready,
                });
        }

        fn syncer(&self) -> NodePoolDriftSyncer {
            NodePoolDriftSyncer::new(
                Arc::clone(&self.backend),
                Arc::clone(&self.cluster_service) as Arc<dyn ClusterService>,
                Arc::new(TimeCooldown::new(Duration::ZERO)),
            )
        }
    }

    #[tokio::test]
    async fn matching_populations_are_left_alone() {
        let fixture = Fixture::new().await;
        let pool = fixture.add_local_pool("p1", Some("cs-p1")).await;
        fixture.add_remote_pool("cs-p1", "p1");

        fixture
            .syncer()
            .sync_once(&CancellationToken::new(), &fixture.key)
            .await
            .unwrap();
        assert!(fixture.backend.get(&pool.resource_id()).await.is_ok());
    }

    #[tokio::test]
    async fn local_orphan_is_cascade_deleted() {
        let fixture = Fixture::new().await;
        let kept = fixture.add_local_pool("p1", Some("cs-p1")).await;
        let orphan = fixture.add_local_pool("p2", Some("cs-p2")).await;
        fixture.add_remote_pool("cs-p1", "p1");

        fixture
            .syncer()
            .sync_once(&CancellationToken::new(), &fixture.key)
            .await
            .unwrap();

        assert!(fixture.backend.get(&kept.resource_id()).await.is_ok());
        assert!(fixture
            .backend
            .get(&orphan.resource_id())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn unlinked_local_child_is_not_deleted() {
        let fixture = Fixture::new().await;
        // No href yet: the frontend created the document but the remote
        // creation has not completed.
        let fresh = fixture.add_local_pool("p1", None).await;

        fixture
            .syncer()
            .sync_once(&CancellationToken::new(), &fixture.key)
            .await
            .unwrap();
        assert!(fixture.backend.get(&fresh.resource_id()).await.is_ok());
    }

    #[tokio::test]
    async fn remote_only_child_is_only_reported() {
        let fixture = Fixture::new().await;
        fixture.add_remote_pool("cs-p9", "p9");

        fixture
            .syncer()
            .sync_once(&CancellationToken::new(), &fixture.key)
            .await
            .unwrap();
        // No document was created for it.
        let pools: Vec<NodePoolDocument> = Docs::new(Arc::clone(&fixture.backend))
            .list(Some(&fixture.key.resource_id()))
            .try_collect()
            .await
            .unwrap();
        assert!(pools.is_empty());
    }

    #[tokio::test]
    async fn missing_cluster_document_short_circuits() {
        let fixture = Fixture::new().await;
        let ghost = ClusterKey::new("sub1", "rg1", "ghost");
        fixture
            .syncer()
            .sync_once(&CancellationToken::new(), &ghost)
            .await
            .unwrap();
    }
}
